use crate::core::summary::totals_per_agent;
use crate::domain::model::{Agent, DemoPayload, ItemId};
use crate::domain::ports::Presenter;
use crate::utils::error::{DemoError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

impl OutputFormat {
    pub fn presenter(self) -> Box<dyn Presenter> {
        match self {
            OutputFormat::Text => Box::new(TextPresenter),
            OutputFormat::Json => Box::new(JsonPresenter),
            OutputFormat::Csv => Box::new(CsvPresenter),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPresenter;

impl Presenter for JsonPresenter {
    fn render(&self, payload: &DemoPayload) -> Result<String> {
        Ok(serde_json::to_string_pretty(payload)?)
    }
}

/// One row per round and agent.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvPresenter;

impl Presenter for CsvPresenter {
    fn render(&self, payload: &DemoPayload) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["round", "agent", "bundle", "own", "other", "fair"])?;

        for (idx, (round, vals)) in payload.rounds.iter().zip(&payload.vals).enumerate() {
            for agent in Agent::BOTH {
                let v = vals.of(agent);
                writer.write_record([
                    (idx + 1).to_string(),
                    agent.to_string(),
                    join_items(round.bundle(agent), " "),
                    v.own.to_string(),
                    v.other.to_string(),
                    payload.checks[idx][agent.index()].to_string(),
                ])?;
            }
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| DemoError::IoError(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Plain-text tables for a terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextPresenter;

impl Presenter for TextPresenter {
    fn render(&self, payload: &DemoPayload) -> Result<String> {
        let mut out = String::new();
        // 寫入 String 不會失敗
        let _ = render_text(payload, &mut out);
        Ok(out)
    }
}

fn render_text(payload: &DemoPayload, out: &mut String) -> std::fmt::Result {
    writeln!(
        out,
        "{} (k = {}, fairness: {})",
        payload.algorithm, payload.k, payload.fairness
    )?;
    writeln!(out)?;
    writeln!(out, "Utilities")?;
    for agent in Agent::BOTH {
        let items: Vec<String> = payload
            .utils
            .of(agent)
            .iter()
            .map(|(item, value)| format!("{}: {}", item, value))
            .collect();
        writeln!(out, "  agent {}: {{{}}}", agent, items.join(", "))?;
    }
    writeln!(out)?;

    let fair = payload.fairness;
    writeln!(
        out,
        "{:<6} {:<16} {:<16} {:>14} {:>14} {:>9} {:>9}",
        "round", "agent 0", "agent 1", "a0 own/other", "a1 own/other",
        format!("a0 {}", fair), format!("a1 {}", fair)
    )?;
    for (idx, round) in payload.rounds.iter().enumerate() {
        let vals = payload.vals[idx];
        let checks = payload.checks[idx];
        writeln!(
            out,
            "{:<6} {:<16} {:<16} {:>14} {:>14} {:>9} {:>9}",
            idx + 1,
            format!("{{{}}}", join_items(round.bundle(Agent::Zero), ", ")),
            format!("{{{}}}", join_items(round.bundle(Agent::One), ", ")),
            format!("{}/{}", vals.of(Agent::Zero).own, vals.of(Agent::Zero).other),
            format!("{}/{}", vals.of(Agent::One).own, vals.of(Agent::One).other),
            mark(checks[0]),
            mark(checks[1]),
        )?;
    }

    let totals = totals_per_agent(&payload.vals);
    writeln!(out)?;
    for agent in Agent::BOTH {
        let t = totals[agent.index()];
        writeln!(
            out,
            "agent {} over all rounds: own {}, other {}",
            agent, t.own, t.other
        )?;
    }

    if !payload.log_txt.is_empty() {
        writeln!(out)?;
        writeln!(out, "Diagnostics")?;
        out.push_str(&payload.log_txt);
    }
    Ok(())
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "yes"
    } else {
        "NO"
    }
}

fn join_items(items: &BTreeSet<ItemId>, sep: &str) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}
