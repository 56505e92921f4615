use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

pub type ItemId = i64;

/// One of the two agents taking part in the repeated allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Agent {
    Zero,
    One,
}

impl Agent {
    pub const BOTH: [Agent; 2] = [Agent::Zero, Agent::One];

    pub fn index(self) -> usize {
        match self {
            Agent::Zero => 0,
            Agent::One => 1,
        }
    }

    pub fn other(self) -> Agent {
        match self {
            Agent::Zero => Agent::One,
            Agent::One => Agent::Zero,
        }
    }

    pub fn from_label(label: i64) -> Option<Agent> {
        match label {
            0 => Some(Agent::Zero),
            1 => Some(Agent::One),
            _ => None,
        }
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

impl Serialize for Agent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.index() as u8)
    }
}

pub type Valuation = BTreeMap<ItemId, f64>;

/// Valuations of exactly two agents. The agent set is fixed by construction,
/// so holding a `ValuationTable` means it was validated.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuationTable {
    agents: [Valuation; 2],
}

impl ValuationTable {
    pub fn new(agent0: Valuation, agent1: Valuation) -> Self {
        Self {
            agents: [agent0, agent1],
        }
    }

    pub fn of(&self, agent: Agent) -> &Valuation {
        &self.agents[agent.index()]
    }

    pub fn value(&self, agent: Agent, item: ItemId) -> Option<f64> {
        self.of(agent).get(&item).copied()
    }

    /// Sum of `agent`'s values over `items`, skipping unpriced items.
    pub fn bundle_value(&self, agent: Agent, items: &BTreeSet<ItemId>) -> f64 {
        items
            .iter()
            .filter_map(|item| self.value(agent, *item))
            .sum()
    }

    /// Items priced by agent 0. Equal to agent 1's once the orchestrator has
    /// checked the universe.
    pub fn items(&self) -> BTreeSet<ItemId> {
        self.agents[0].keys().copied().collect()
    }

    pub fn item_universe_diff(&self) -> (Vec<ItemId>, Vec<ItemId>) {
        let a0: BTreeSet<ItemId> = self.agents[0].keys().copied().collect();
        let a1: BTreeSet<ItemId> = self.agents[1].keys().copied().collect();
        (
            a0.difference(&a1).copied().collect(),
            a1.difference(&a0).copied().collect(),
        )
    }
}

impl Serialize for ValuationTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        for agent in Agent::BOTH {
            map.serialize_entry(&agent.index(), self.of(agent))?;
        }
        map.end()
    }
}

/// Bundles given to agent 0 and agent 1 in one round.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AllocationRound {
    bundles: [BTreeSet<ItemId>; 2],
}

impl AllocationRound {
    pub fn new(agent0: BTreeSet<ItemId>, agent1: BTreeSet<ItemId>) -> Self {
        Self {
            bundles: [agent0, agent1],
        }
    }

    pub fn from_items<A, B>(agent0: A, agent1: B) -> Self
    where
        A: IntoIterator<Item = ItemId>,
        B: IntoIterator<Item = ItemId>,
    {
        Self::new(agent0.into_iter().collect(), agent1.into_iter().collect())
    }

    pub fn bundle(&self, agent: Agent) -> &BTreeSet<ItemId> {
        &self.bundles[agent.index()]
    }

    /// Same bundles with the agents swapped.
    pub fn mirrored(&self) -> Self {
        Self::new(self.bundles[1].clone(), self.bundles[0].clone())
    }

    pub fn overlap(&self) -> BTreeSet<ItemId> {
        self.bundles[0]
            .intersection(&self.bundles[1])
            .copied()
            .collect()
    }

    pub fn union(&self) -> BTreeSet<ItemId> {
        self.bundles[0].union(&self.bundles[1]).copied().collect()
    }
}

impl Serialize for AllocationRound {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(2))?;
        for bundle in &self.bundles {
            seq.serialize_element(bundle)?;
        }
        seq.end()
    }
}

pub type AllocationSequence = Vec<AllocationRound>;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AgentValuation {
    pub own: f64,
    pub other: f64,
}

/// Own/other totals of both agents in a single round.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RoundValuation {
    agents: [AgentValuation; 2],
}

impl RoundValuation {
    pub fn new(agent0: AgentValuation, agent1: AgentValuation) -> Self {
        Self {
            agents: [agent0, agent1],
        }
    }

    pub fn of(&self, agent: Agent) -> AgentValuation {
        self.agents[agent.index()]
    }
}

impl Serialize for RoundValuation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        for agent in Agent::BOTH {
            map.serialize_entry(&agent.index(), &self.of(agent))?;
        }
        map.end()
    }
}

/// Per-agent fairness booleans for one round, indexed by agent.
pub type FairnessVerdict = [bool; 2];

/// The two allocation strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Exactly two rounds, checked against EF1.
    TwoRound,
    /// Any even number of rounds, checked against weak EF1.
    GeneralEven,
}

impl Algorithm {
    /// `"1"` selects the two-round algorithm; anything else the general one.
    pub fn from_selector(token: &str) -> Self {
        if token.trim() == "1" {
            Algorithm::TwoRound
        } else {
            Algorithm::GeneralEven
        }
    }

    pub fn selector(self) -> &'static str {
        match self {
            Algorithm::TwoRound => "1",
            Algorithm::GeneralEven => "2",
        }
    }

    pub fn fairness_name(self) -> &'static str {
        match self {
            Algorithm::TwoRound => "EF1",
            Algorithm::GeneralEven => "weak EF1",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Algorithm {}", self.selector())
    }
}

/// What the presentation layer receives.
#[derive(Debug, Clone, Serialize)]
pub struct DemoPayload {
    pub algorithm: Algorithm,
    pub fairness: &'static str,
    pub utils: ValuationTable,
    pub rounds: AllocationSequence,
    pub checks: Vec<FairnessVerdict>,
    pub vals: Vec<RoundValuation>,
    pub k: usize,
    pub log_txt: String,
}

/// Shared in-memory sink for both log events and console lines.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl CaptureBuffer {
    pub fn contents(&self) -> String {
        let bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Stand-in for stdout/stderr handed to an allocation engine. Both streams
/// land in the same buffer as the log lines, in emission order.
#[derive(Debug, Clone)]
pub struct Console {
    buffer: CaptureBuffer,
}

impl Console {
    pub fn new(buffer: CaptureBuffer) -> Self {
        Self { buffer }
    }

    /// A console whose output is discarded once dropped.
    pub fn detached() -> Self {
        Self::new(CaptureBuffer::default())
    }

    pub fn println(&self, line: impl fmt::Display) {
        self.write_line(line);
    }

    pub fn eprintln(&self, line: impl fmt::Display) {
        self.write_line(line);
    }

    fn write_line(&self, line: impl fmt::Display) {
        let mut buffer = self.buffer.clone();
        // 寫入記憶體緩衝區不會失敗
        let _ = writeln!(buffer, "{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ValuationTable {
        ValuationTable::new(
            BTreeMap::from([(0, 5.0), (1, 3.0)]),
            BTreeMap::from([(0, 2.0), (1, 6.0)]),
        )
    }

    #[test]
    fn test_agent_other() {
        assert_eq!(Agent::Zero.other(), Agent::One);
        assert_eq!(Agent::One.other(), Agent::Zero);
        assert_eq!(Agent::from_label(2), None);
    }

    #[test]
    fn test_table_serializes_with_string_keys() {
        let json = serde_json::to_value(table()).unwrap();
        assert_eq!(json["0"]["1"], 3.0);
        assert_eq!(json["1"]["0"], 2.0);
    }

    #[test]
    fn test_round_serializes_as_pair_of_lists() {
        let round = AllocationRound::from_items([1, 0], [2]);
        let json = serde_json::to_value(&round).unwrap();
        assert_eq!(json, serde_json::json!([[0, 1], [2]]));
        assert_eq!(round.mirrored().bundle(Agent::Zero).len(), 1);
    }

    #[test]
    fn test_console_shares_its_buffer() {
        let buffer = CaptureBuffer::default();
        let console = Console::new(buffer.clone());
        console.println("Round 1");
        console.eprintln(Algorithm::GeneralEven);
        assert_eq!(buffer.contents(), "Round 1\nAlgorithm 2\n");
    }

    #[test]
    fn test_item_universe_diff() {
        let t = ValuationTable::new(
            BTreeMap::from([(0, 1.0), (1, 1.0)]),
            BTreeMap::from([(1, 1.0), (2, 1.0)]),
        );
        assert_eq!(t.item_universe_diff(), (vec![0], vec![2]));
        assert_eq!(table().item_universe_diff(), (vec![], vec![]));
    }
}
