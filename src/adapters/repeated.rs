use crate::domain::model::{Agent, AllocationRound, AllocationSequence, Console, ItemId, ValuationTable};
use crate::domain::ports::AllocationEngine;
use crate::utils::error::AllocationError;
use std::collections::BTreeSet;

const EPS: f64 = 1e-9;

/// Largest item count searched split by split (2^16 candidates).
const EXHAUSTIVE_LIMIT: usize = 16;

/// Built-in two-agent repeated allocation.
///
/// Both variants rest on one split of the items: agent 0 gets one side in the
/// first round and the other side in the second, so across a pair of rounds
/// every agent receives every item exactly once.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepeatedAllocation;

impl RepeatedAllocation {
    pub fn new() -> Self {
        Self
    }

    /// Split that is EF1 for both agents in the round and in its mirror.
    ///
    /// The transfer walk is tried first. When it misses, every split is
    /// searched for up to `EXHAUSTIVE_LIMIT` items, so a fair pair is found
    /// whenever one exists; larger inputs go through a local search.
    fn balanced_split(&self, utils: &ValuationTable) -> AllocationRound {
        let closest = match self.transfer_walk(utils) {
            Walk::Fair(round) => return round,
            Walk::Closest(round) => round,
        };

        let search = SplitSearch::new(utils);
        let found = if search.len() <= EXHAUSTIVE_LIMIT {
            tracing::debug!("transfer walk missed, searching all {} splits", 1u64 << search.len());
            search.exhaustive()
        } else {
            tracing::debug!("transfer walk missed, local search over {} items", search.len());
            search.local()
        };

        match found {
            Some(sides) => search.round(&sides),
            None => {
                tracing::warn!("no split is EF1 in both rounds, falling back to the most balanced one");
                closest
            }
        }
    }

    /// Moves items from agent 0 to agent 1 in ascending `u0 - u1` order.
    fn transfer_walk(&self, utils: &ValuationTable) -> Walk {
        let items = utils.items();
        let diff = |item: &ItemId| {
            utils.value(Agent::Zero, *item).unwrap_or(0.0) - utils.value(Agent::One, *item).unwrap_or(0.0)
        };

        // agent 0 相對最不在意的物品先移給 agent 1
        let mut order: Vec<ItemId> = items.iter().copied().collect();
        order.sort_by(|a, b| diff(a).total_cmp(&diff(b)).then(a.cmp(b)));

        let mut first: BTreeSet<ItemId> = items;
        let mut second: BTreeSet<ItemId> = BTreeSet::new();
        let mut best: Option<(f64, AllocationRound)> = None;

        for step in 0..=order.len() {
            let round = AllocationRound::new(first.clone(), second.clone());
            if self.pair_is_ef1(&round, utils) {
                tracing::debug!("EF1 split found after {} transfers", step);
                return Walk::Fair(round);
            }

            let gap = imbalance(&round, utils);
            if best.as_ref().map_or(true, |(g, _)| gap < *g) {
                best = Some((gap, round));
            }

            if let Some(&item) = order.get(step) {
                tracing::debug!(
                    "moving item {} to agent 1 in round 1 (u0 = {}, u1 = {})",
                    item,
                    utils.value(Agent::Zero, item).unwrap_or(0.0),
                    utils.value(Agent::One, item).unwrap_or(0.0)
                );
                first.remove(&item);
                second.insert(item);
            }
        }

        Walk::Closest(best.map(|(_, round)| round).unwrap_or_default())
    }

    fn pair_is_ef1(&self, round: &AllocationRound, utils: &ValuationTable) -> bool {
        let mirrored = round.mirrored();
        Agent::BOTH
            .iter()
            .all(|agent| ef1(round, *agent, utils) && ef1(&mirrored, *agent, utils))
    }

    fn report(&self, rounds: &AllocationSequence, console: &Console) {
        for (idx, round) in rounds.iter().enumerate() {
            console.println(format!(
                "Round {}: agent 0 <- {:?}, agent 1 <- {:?}",
                idx + 1,
                round.bundle(Agent::Zero),
                round.bundle(Agent::One)
            ));
        }
    }
}

impl AllocationEngine for RepeatedAllocation {
    fn two_round(
        &self,
        utils: &ValuationTable,
        console: &Console,
    ) -> Result<AllocationSequence, AllocationError> {
        tracing::info!("Algorithm 1: two rounds over {} items", utils.items().len());
        let round = self.balanced_split(utils);
        let rounds = vec![round.clone(), round.mirrored()];
        self.report(&rounds, console);
        Ok(rounds)
    }

    fn general_even(
        &self,
        k: usize,
        utils: &ValuationTable,
        console: &Console,
    ) -> Result<AllocationSequence, AllocationError> {
        if k < 2 || k % 2 != 0 {
            return Err(AllocationError::Precondition {
                message: format!("k must be even and at least 2, got {}", k),
            });
        }
        tracing::info!(
            "Algorithm 2: {} rounds over {} items",
            k,
            utils.items().len()
        );

        let round = self.balanced_split(utils);
        let mirrored = round.mirrored();
        let mut rounds = Vec::with_capacity(k);
        for pair in 0..k / 2 {
            if pair % 2 == 0 {
                rounds.push(round.clone());
                rounds.push(mirrored.clone());
            } else {
                tracing::debug!("pair {} starts with the mirrored split", pair + 1);
                rounds.push(mirrored.clone());
                rounds.push(round.clone());
            }
        }
        self.report(&rounds, console);
        Ok(rounds)
    }

    fn ef1_holds(&self, round: &AllocationRound, agent: Agent, utils: &ValuationTable) -> bool {
        ef1(round, agent, utils)
    }

    fn weak_ef1_holds(&self, round: &AllocationRound, agent: Agent, utils: &ValuationTable) -> bool {
        weak_ef1(round, agent, utils)
    }
}

enum Walk {
    Fair(AllocationRound),
    Closest(AllocationRound),
}

/// Sum and extreme values of one bundle, from one agent's point of view.
#[derive(Debug, Clone, Copy)]
struct BundleStats {
    sum: f64,
    best: Option<f64>,
    worst: Option<f64>,
}

impl BundleStats {
    fn of(values: &[f64], sides: &[bool], side: bool) -> Self {
        values
            .iter()
            .zip(sides)
            .filter(|(_, s)| **s == side)
            .fold(
                BundleStats {
                    sum: 0.0,
                    best: None,
                    worst: None,
                },
                |acc, (v, _)| BundleStats {
                    sum: acc.sum + v,
                    best: Some(acc.best.map_or(*v, |b| b.max(*v))),
                    worst: Some(acc.worst.map_or(*v, |w| w.min(*v))),
                },
            )
    }
}

/// Envy left after the best single-item removal, zero when EF1 holds.
fn ef1_deficit(own: BundleStats, other: BundleStats) -> f64 {
    let envy = other.sum - own.sum;
    if envy <= EPS {
        return 0.0;
    }
    let mut remaining = envy;
    if let Some(g) = other.best {
        remaining = remaining.min(envy - g);
    }
    if let Some(c) = own.worst {
        remaining = remaining.min(envy + c);
    }
    remaining.max(0.0)
}

/// Dense view of the table for split searches. `sides[pos]` is true when
/// `items[pos]` goes to agent 0 in the first round (and to agent 1 in the
/// mirrored one).
struct SplitSearch {
    items: Vec<ItemId>,
    values: [Vec<f64>; 2],
}

impl SplitSearch {
    fn new(utils: &ValuationTable) -> Self {
        let items: Vec<ItemId> = utils.items().into_iter().collect();
        let values = Agent::BOTH.map(|agent| {
            items
                .iter()
                .map(|item| utils.value(agent, *item).unwrap_or(0.0))
                .collect()
        });
        Self { items, values }
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    /// One deficit per agent and orientation. Each agent sees both bundles
    /// as its own once across the pair.
    fn deficits(&self, sides: &[bool]) -> [f64; 4] {
        let [zero, one] = &self.values;
        let (a, b) = (BundleStats::of(zero, sides, true), BundleStats::of(zero, sides, false));
        let (c, d) = (BundleStats::of(one, sides, false), BundleStats::of(one, sides, true));
        [ef1_deficit(a, b), ef1_deficit(b, a), ef1_deficit(c, d), ef1_deficit(d, c)]
    }

    fn is_fair(&self, sides: &[bool]) -> bool {
        self.deficits(sides).iter().all(|d| *d <= EPS)
    }

    fn total_deficit(&self, sides: &[bool]) -> f64 {
        self.deficits(sides).iter().sum()
    }

    fn exhaustive(&self) -> Option<Vec<bool>> {
        (0u32..1 << self.len())
            .map(|mask| (0..self.len()).map(|pos| mask >> pos & 1 == 1).collect::<Vec<_>>())
            .find(|sides| self.is_fair(sides))
    }

    /// Starts from alternating sides in descending joint value, then applies
    /// the single flip or opposite-side swap that lowers the total deficit
    /// most, until the split is fair or nothing improves.
    fn local(&self) -> Option<Vec<bool>> {
        let n = self.len();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|a, b| {
            let joint = |pos: &usize| self.values[0][*pos] + self.values[1][*pos];
            joint(b).total_cmp(&joint(a)).then(a.cmp(b))
        });
        let mut sides = vec![false; n];
        for (rank, pos) in order.into_iter().enumerate() {
            sides[pos] = rank % 2 == 0;
        }

        let mut current = self.total_deficit(&sides);
        loop {
            if self.is_fair(&sides) {
                return Some(sides);
            }

            let mut best: Option<(f64, usize, Option<usize>)> = None;
            let mut consider = |candidate: &[bool], i: usize, j: Option<usize>| {
                let score = self.total_deficit(candidate);
                if score < current - EPS && best.map_or(true, |(b, _, _)| score < b) {
                    best = Some((score, i, j));
                }
            };

            let mut candidate = sides.clone();
            for i in 0..n {
                candidate[i] = !candidate[i];
                consider(&candidate, i, None);
                candidate[i] = !candidate[i];
            }
            for i in 0..n {
                for j in i + 1..n {
                    if sides[i] == sides[j] {
                        continue;
                    }
                    candidate[i] = !candidate[i];
                    candidate[j] = !candidate[j];
                    consider(&candidate, i, Some(j));
                    candidate[i] = !candidate[i];
                    candidate[j] = !candidate[j];
                }
            }

            let (score, i, j) = best?;
            sides[i] = !sides[i];
            if let Some(j) = j {
                sides[j] = !sides[j];
            }
            current = score;
        }
    }

    fn round(&self, sides: &[bool]) -> AllocationRound {
        let (first, second): (Vec<(ItemId, bool)>, Vec<(ItemId, bool)>) = self
            .items
            .iter()
            .copied()
            .zip(sides.iter().copied())
            .partition(|(_, side)| *side);
        AllocationRound::from_items(
            first.into_iter().map(|(item, _)| item),
            second.into_iter().map(|(item, _)| item),
        )
    }
}

struct EnvyView {
    own: f64,
    other: f64,
    /// Most valuable item in the other bundle, if any.
    best_other: Option<f64>,
    /// Least valuable item in the own bundle, if any.
    worst_own: Option<f64>,
}

fn envy_view(round: &AllocationRound, agent: Agent, utils: &ValuationTable) -> EnvyView {
    let own_bundle = round.bundle(agent);
    let other_bundle = round.bundle(agent.other());
    let values = |bundle: &BTreeSet<ItemId>| -> Vec<f64> {
        bundle.iter().filter_map(|item| utils.value(agent, *item)).collect()
    };
    let other_values = values(other_bundle);
    let own_values = values(own_bundle);

    EnvyView {
        own: own_values.iter().sum(),
        other: other_values.iter().sum(),
        best_other: other_values.iter().copied().reduce(f64::max),
        worst_own: own_values.iter().copied().reduce(f64::min),
    }
}

/// Envy-free up to one item, goods and chores alike: no envy, or dropping a
/// single item from either bundle removes it.
pub fn ef1(round: &AllocationRound, agent: Agent, utils: &ValuationTable) -> bool {
    let v = envy_view(round, agent, utils);
    if v.own + EPS >= v.other {
        return true;
    }
    v.best_other.is_some_and(|g| v.own + EPS >= v.other - g)
        || v.worst_own.is_some_and(|c| v.own - c + EPS >= v.other)
}

/// EF1, or handing a single item from one bundle to the other removes the envy.
pub fn weak_ef1(round: &AllocationRound, agent: Agent, utils: &ValuationTable) -> bool {
    if ef1(round, agent, utils) {
        return true;
    }
    let v = envy_view(round, agent, utils);
    v.best_other.is_some_and(|g| v.own + g + EPS >= v.other - g)
        || v.worst_own.is_some_and(|c| v.own - c + EPS >= v.other + c)
}

fn imbalance(round: &AllocationRound, utils: &ValuationTable) -> f64 {
    Agent::BOTH
        .iter()
        .map(|agent| {
            let own = utils.bundle_value(*agent, round.bundle(*agent));
            let other = utils.bundle_value(*agent, round.bundle(agent.other()));
            (own - other).abs()
        })
        .sum()
}
