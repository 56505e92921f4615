pub mod capture;
pub mod literal;
pub mod orchestrator;
pub mod parser;
pub mod summary;

pub use crate::domain::model::{AllocationRound, AllocationSequence, RoundValuation, ValuationTable};
pub use crate::domain::ports::{AllocationEngine, Presenter};
pub use crate::utils::error::Result;
