use crate::domain::model::{
    Agent, AgentValuation, AllocationRound, ItemId, RoundValuation, ValuationTable,
};
use crate::utils::error::{DemoError, Result};
use std::collections::BTreeSet;

/// Own/other totals for every round, in round order. Each round stands on
/// its own; nothing is carried across rounds.
pub fn summarize(rounds: &[AllocationRound], utils: &ValuationTable) -> Result<Vec<RoundValuation>> {
    rounds
        .iter()
        .enumerate()
        .map(|(idx, round)| {
            let a0 = agent_valuation(idx, round, Agent::Zero, utils)?;
            let a1 = agent_valuation(idx, round, Agent::One, utils)?;
            Ok(RoundValuation::new(a0, a1))
        })
        .collect()
}

fn agent_valuation(
    round_idx: usize,
    round: &AllocationRound,
    agent: Agent,
    utils: &ValuationTable,
) -> Result<AgentValuation> {
    Ok(AgentValuation {
        own: priced_sum(round_idx, agent, round.bundle(agent), utils)?,
        other: priced_sum(round_idx, agent, round.bundle(agent.other()), utils)?,
    })
}

fn priced_sum(
    round_idx: usize,
    agent: Agent,
    bundle: &BTreeSet<ItemId>,
    utils: &ValuationTable,
) -> Result<f64> {
    bundle.iter().try_fold(0.0, |acc, item| {
        utils
            .value(agent, *item)
            .map(|v| acc + v)
            .ok_or(DemoError::MissingValuation {
                round: round_idx,
                agent: agent.index(),
                item: *item,
            })
    })
}

/// Own/other summed over all rounds, per agent. Display only.
pub fn totals_per_agent(vals: &[RoundValuation]) -> [AgentValuation; 2] {
    let mut totals = [AgentValuation::default(); 2];
    for round in vals {
        for agent in Agent::BOTH {
            let v = round.of(agent);
            totals[agent.index()].own += v.own;
            totals[agent.index()].other += v.other;
        }
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn utils() -> ValuationTable {
        ValuationTable::new(
            BTreeMap::from([(0, 5.0), (1, 3.0), (2, -1.0)]),
            BTreeMap::from([(0, 2.0), (1, 6.0), (2, 4.0)]),
        )
    }

    #[test]
    fn test_own_and_other_per_round() {
        let rounds = vec![
            AllocationRound::from_items([0], [1, 2]),
            AllocationRound::from_items([1, 2], [0]),
        ];
        let vals = summarize(&rounds, &utils()).unwrap();
        assert_eq!(vals.len(), 2);
        assert_eq!(vals[0].of(Agent::Zero), AgentValuation { own: 5.0, other: 2.0 });
        assert_eq!(vals[0].of(Agent::One), AgentValuation { own: 10.0, other: 2.0 });
        assert_eq!(vals[1].of(Agent::Zero), AgentValuation { own: 2.0, other: 5.0 });
        assert_eq!(vals[1].of(Agent::One), AgentValuation { own: 2.0, other: 10.0 });
    }

    #[test]
    fn test_missing_valuation_is_an_error() {
        let rounds = vec![
            AllocationRound::from_items([0], [1]),
            AllocationRound::from_items([0], [7]),
        ];
        match summarize(&rounds, &utils()) {
            Err(DemoError::MissingValuation { round, agent, item }) => {
                assert_eq!((round, agent, item), (1, 0, 7));
            }
            other => panic!("expected MissingValuation, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_bundles_sum_to_zero() {
        let vals = summarize(&[AllocationRound::default()], &utils()).unwrap();
        assert_eq!(vals[0].of(Agent::One), AgentValuation::default());
    }

    #[test]
    fn test_totals_per_agent() {
        let rounds = vec![
            AllocationRound::from_items([0], [1, 2]),
            AllocationRound::from_items([1, 2], [0]),
        ];
        let totals = totals_per_agent(&summarize(&rounds, &utils()).unwrap());
        assert_eq!(totals[0], AgentValuation { own: 7.0, other: 7.0 });
        assert_eq!(totals[1], AgentValuation { own: 12.0, other: 12.0 });
    }
}
