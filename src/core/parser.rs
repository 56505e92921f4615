use crate::core::literal::{parse_literal, Literal};
use crate::domain::model::{Agent, ItemId, Valuation, ValuationTable};
use crate::utils::error::{DemoError, Result};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseLimits {
    pub max_payload_bytes: usize,
    pub max_items: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_payload_bytes: 64 * 1024,
            max_items: 256,
        }
    }
}

/// Turns the raw utilities text of a submission into a `ValuationTable`.
#[derive(Debug, Clone, Default)]
pub struct ValuationParser {
    limits: ParseLimits,
}

impl ValuationParser {
    pub fn new(limits: ParseLimits) -> Self {
        Self { limits }
    }

    pub fn parse(&self, raw: &str) -> Result<ValuationTable> {
        if raw.trim().is_empty() {
            return Err(DemoError::malformed("utilities payload is empty"));
        }
        if raw.len() > self.limits.max_payload_bytes {
            return Err(DemoError::malformed(format!(
                "utilities payload is {} bytes, the limit is {}",
                raw.len(),
                self.limits.max_payload_bytes
            )));
        }

        let decoded = decode(raw)?;
        let agents = coerce_table(decoded)?;

        let found: Vec<i64> = agents.keys().copied().collect();
        let mut slots: [Option<Valuation>; 2] = [None, None];
        for (label, valuation) in agents {
            match Agent::from_label(label) {
                Some(agent) => slots[agent.index()] = Some(valuation),
                None => {
                    tracing::debug!("rejecting agent set {:?}", found);
                    return Err(DemoError::InvalidAgentSet { found });
                }
            }
        }
        let [Some(agent0), Some(agent1)] = slots else {
            tracing::debug!("rejecting agent set {:?}", found);
            return Err(DemoError::InvalidAgentSet { found });
        };

        for (agent, valuation) in [(Agent::Zero, &agent0), (Agent::One, &agent1)] {
            if valuation.len() > self.limits.max_items {
                return Err(DemoError::malformed(format!(
                    "agent {} values {} items, the limit is {}",
                    agent,
                    valuation.len(),
                    self.limits.max_items
                )));
            }
        }

        Ok(ValuationTable::new(agent0, agent1))
    }
}

/// Parses with default limits.
pub fn parse_valuations(raw: &str) -> Result<ValuationTable> {
    ValuationParser::default().parse(raw)
}

fn decode(raw: &str) -> Result<Literal> {
    // 先嚴格 JSON，失敗再退回受限的字面值解析
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) => {
            tracing::debug!("utilities decoded as JSON");
            Ok(Literal::from(value))
        }
        Err(json_err) => match parse_literal(raw) {
            Ok(literal) => {
                tracing::debug!("utilities decoded as literal (JSON failed: {})", json_err);
                Ok(literal)
            }
            Err(literal_err) => Err(DemoError::malformed(format!(
                "utilities are neither JSON ({}) nor a dict literal ({})",
                json_err, literal_err
            ))),
        },
    }
}

fn coerce_table(decoded: Literal) -> Result<BTreeMap<i64, Valuation>> {
    let entries = match decoded {
        Literal::Map(entries) => entries,
        other => {
            return Err(DemoError::malformed(format!(
                "utilities must be a mapping of agents, got a {}",
                other.kind()
            )))
        }
    };

    let mut agents = BTreeMap::new();
    for (label, items) in entries {
        let agent = coerce_label(&label, "agent")?;
        let items = match items {
            Literal::Map(items) => items,
            other => {
                return Err(DemoError::malformed(format!(
                    "valuations of agent {} must be a mapping, got a {}",
                    agent,
                    other.kind()
                )))
            }
        };

        let mut valuation = Valuation::new();
        for (item_label, value) in items {
            let item: ItemId = coerce_label(&item_label, "item")?;
            valuation.insert(item, coerce_value(&value, agent, item)?);
        }
        agents.insert(agent, valuation);
    }
    Ok(agents)
}

fn coerce_label(label: &Literal, what: &str) -> Result<i64> {
    let parsed = match label {
        Literal::Int(i) => Some(*i),
        Literal::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 => {
            Some(*f as i64)
        }
        Literal::Str(s) => s.trim().replace('_', "").parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        DemoError::malformed(format!("{} label {} is not an integer", what, describe(label)))
    })
}

fn coerce_value(value: &Literal, agent: i64, item: ItemId) -> Result<f64> {
    let parsed = match value {
        Literal::Int(i) => Some(*i as f64),
        Literal::Float(f) => Some(*f),
        Literal::Str(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(DemoError::malformed(format!(
            "value of item {} for agent {} is not a finite number: {}",
            item,
            agent,
            describe(value)
        ))),
    }
}

fn describe(lit: &Literal) -> String {
    match lit {
        Literal::Int(i) => i.to_string(),
        Literal::Float(f) => f.to_string(),
        Literal::Str(s) => format!("{:?}", s),
        other => format!("<{}>", other.kind()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_payload() {
        let table = parse_valuations(r#"{"0": {"0": 5, "1": 3}, "1": {"0": 2, "1": 6.5}}"#).unwrap();
        assert_eq!(table.value(Agent::Zero, 0), Some(5.0));
        assert_eq!(table.value(Agent::One, 1), Some(6.5));
    }

    #[test]
    fn test_literal_fallback() {
        let table = parse_valuations("{0: {0: 11, 1: 22,}, 1: {0: '11', 1: 22.0}}").unwrap();
        assert_eq!(table.value(Agent::One, 0), Some(11.0));
        assert_eq!(table.items().len(), 2);
    }

    #[test]
    fn test_integral_float_labels() {
        let table = parse_valuations("{0.0: {3.0: 1}, 1: {3: 2}}").unwrap();
        assert_eq!(table.value(Agent::Zero, 3), Some(1.0));
    }

    #[test]
    fn test_agent_set_must_be_zero_and_one() {
        for raw in [
            r#"{}"#,
            r#"{"0": {"0": 1}}"#,
            r#"{"0": {}, "1": {}, "2": {}}"#,
            r#"{"1": {}, "2": {}}"#,
            r#"{"-1": {}, "0": {}, "1": {}}"#,
        ] {
            match parse_valuations(raw) {
                Err(DemoError::InvalidAgentSet { .. }) => {}
                other => panic!("{raw}: expected InvalidAgentSet, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_agent_labels_map_to_agents() {
        let table = parse_valuations("{1: {0: 4}, 0.0: {0: 9}}").unwrap();
        assert_eq!(table.value(Agent::Zero, 0), Some(9.0));
        assert_eq!(table.value(Agent::One, 0), Some(4.0));

        match parse_valuations(r#"{"0": {}, "7": {}}"#) {
            Err(DemoError::InvalidAgentSet { found }) => assert_eq!(found, vec![0, 7]),
            other => panic!("expected InvalidAgentSet, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_payloads() {
        for raw in [
            "",
            "not a dict",
            "[1, 2]",
            r#"{"a": {"0": 1}, "1": {}}"#,
            r#"{"0": {"x": 1}, "1": {}}"#,
            r#"{"0": {"0": "lots"}, "1": {}}"#,
            r#"{"0": {"0": 1.5e400}, "1": {}}"#,
            r#"{"0": [1, 2], "1": {}}"#,
            r#"{"0": {"0.5": 1}, "1": {}}"#,
            "{0: {0: nan}, 1: {}}",
        ] {
            match parse_valuations(raw) {
                Err(DemoError::MalformedInput { .. }) => {}
                other => panic!("{raw:?}: expected MalformedInput, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_limits() {
        let parser = ValuationParser::new(ParseLimits {
            max_payload_bytes: 64,
            max_items: 1,
        });
        assert!(parser.parse(r#"{"0": {"0": 1}, "1": {"0": 1}}"#).is_ok());
        assert!(matches!(
            parser.parse(r#"{"0": {"0": 1, "1": 1}, "1": {"0": 1}}"#),
            Err(DemoError::MalformedInput { .. })
        ));
        let padded = format!(r#"{{"0": {{"0": 1}}, "1": {{"0": 1}}}}{}"#, " ".repeat(40));
        assert!(matches!(
            parser.parse(&padded),
            Err(DemoError::MalformedInput { .. })
        ));
    }

    #[test]
    fn test_duplicate_labels_last_wins() {
        let table = parse_valuations("{0: {1: 1, 1: 7}, 1: {1: 2}, 0: {1: 9}}").unwrap();
        assert_eq!(table.value(Agent::Zero, 1), Some(9.0));
    }

    #[test]
    fn test_negative_and_zero_values_allowed() {
        let table = parse_valuations(r#"{"0": {"0": -4, "1": 0}, "1": {"0": -1, "1": 0}}"#).unwrap();
        assert_eq!(table.value(Agent::Zero, 0), Some(-4.0));
    }
}
