use crate::domain::model::{
    Agent, AllocationRound, AllocationSequence, Console, DemoPayload, ValuationTable,
};
use crate::utils::error::{AllocationError, Result};

/// The allocation / fairness collaborator the orchestrator drives.
///
/// Engines report their reasoning through `tracing` events and the supplied
/// `Console`; both end up in the request's captured diagnostics.
pub trait AllocationEngine: Send + Sync {
    /// Exactly two rounds.
    fn two_round(
        &self,
        utils: &ValuationTable,
        console: &Console,
    ) -> std::result::Result<AllocationSequence, AllocationError>;

    /// `k` rounds, `k` even.
    fn general_even(
        &self,
        k: usize,
        utils: &ValuationTable,
        console: &Console,
    ) -> std::result::Result<AllocationSequence, AllocationError>;

    fn ef1_holds(&self, round: &AllocationRound, agent: Agent, utils: &ValuationTable) -> bool;

    fn weak_ef1_holds(&self, round: &AllocationRound, agent: Agent, utils: &ValuationTable)
        -> bool;
}

/// Turns a finished request into something a user can look at.
pub trait Presenter: Send + Sync {
    fn render(&self, payload: &DemoPayload) -> Result<String>;
}
