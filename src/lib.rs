pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;

pub use crate::adapters::repeated::RepeatedAllocation;
pub use crate::app::render::{CsvPresenter, JsonPresenter, OutputFormat, TextPresenter};
pub use crate::config::toml_config::DemoConfig;
pub use crate::core::capture::run_captured;
pub use crate::core::orchestrator::{DemoRequest, RequestOrchestrator};
pub use crate::core::parser::{parse_valuations, ValuationParser};
pub use crate::core::summary::summarize;
pub use crate::domain::model::{
    Agent, Algorithm, AllocationRound, Console, DemoPayload, RoundValuation, ValuationTable,
};
pub use crate::domain::ports::{AllocationEngine, Presenter};
pub use crate::utils::error::{AllocationError, DemoError, Result};
