use crate::config::toml_config::DefaultsConfig;
use crate::core::orchestrator::{DemoRequest, RequestOrchestrator};
use crate::domain::ports::{AllocationEngine, Presenter};
use crate::utils::error::{AllocationError, DemoError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// `[[requests]]` entries of a batch file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFile {
    pub requests: Vec<BatchEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEntry {
    pub name: Option<String>,
    pub utilities: String,
    pub k: Option<i64>,
    pub algo: Option<String>,
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub name: String,
    pub result: Result<String>,
}

impl BatchFile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| DemoError::ConfigError {
            message: format!("batch file parsing error: {}", e),
        })
    }

    /// Fills missing `k` / `algo` from the configured defaults.
    pub fn into_requests(self, defaults: &DefaultsConfig) -> Vec<(String, DemoRequest)> {
        self.requests
            .into_iter()
            .enumerate()
            .map(|(idx, entry)| {
                let name = entry.name.unwrap_or_else(|| format!("request-{}", idx + 1));
                let request = DemoRequest::new(
                    entry.utilities,
                    entry.k.unwrap_or(defaults.k),
                    entry.algo.unwrap_or_else(|| defaults.algo.clone()),
                );
                (name, request)
            })
            .collect()
    }
}

/// Handles every request on the blocking pool at once and returns the
/// outcomes in input order. A failed request does not stop the others.
pub async fn run_batch<E>(
    orchestrator: Arc<RequestOrchestrator<E>>,
    presenter: Arc<dyn Presenter>,
    requests: Vec<(String, DemoRequest)>,
) -> Vec<BatchOutcome>
where
    E: AllocationEngine + 'static,
{
    tracing::info!("📦 Running {} requests concurrently", requests.len());

    let handles: Vec<_> = requests
        .into_iter()
        .map(|(name, request)| {
            let orchestrator = Arc::clone(&orchestrator);
            let presenter = Arc::clone(&presenter);
            let handle = tokio::task::spawn_blocking(move || {
                orchestrator.handle(&request, presenter.as_ref())
            });
            (name, handle)
        })
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for (name, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(join_err) => {
                tracing::error!("❌ request {} did not finish: {}", name, join_err);
                Err(DemoError::Allocation(AllocationError::Failed {
                    message: format!("request task did not finish: {}", join_err),
                }))
            }
        };
        outcomes.push(BatchOutcome { name, result });
    }
    outcomes
}
