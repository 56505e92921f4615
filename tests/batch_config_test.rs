use anyhow::Result;
use rfa_demo::app::batch::{run_batch, BatchFile};
use rfa_demo::utils::validation::Validate;
use rfa_demo::{DemoConfig, DemoError, JsonPresenter, Presenter, RepeatedAllocation, RequestOrchestrator};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_batch_runs_all_requests_in_order() -> Result<()> {
    let batch = BatchFile::from_toml_str(
        r#"
[[requests]]
name = "scenario-a"
utilities = '{"0": {"0": 5, "1": 3}, "1": {"0": 2, "1": 6}}'
k = 2
algo = "1"

[[requests]]
name = "odd-k"
utilities = '{"0": {"0": 5}, "1": {"0": 2}}'
k = 3
algo = "2"

[[requests]]
name = "four-rounds"
utilities = "{0: {0: 1, 1: 2, 2: 3}, 1: {0: 3, 1: 2, 2: 1}}"
k = 4
algo = "2"
"#,
    )?;

    let config = DemoConfig::default();
    let orchestrator = Arc::new(RequestOrchestrator::new(RepeatedAllocation::new()));
    let presenter: Arc<dyn Presenter> = Arc::new(JsonPresenter);

    let outcomes = run_batch(orchestrator, presenter, batch.into_requests(&config.defaults)).await;

    let names: Vec<&str> = outcomes.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, ["scenario-a", "odd-k", "four-rounds"]);

    let first: serde_json::Value = serde_json::from_str(outcomes[0].result.as_ref().unwrap())?;
    assert_eq!(first["rounds"].as_array().unwrap().len(), 2);

    assert!(matches!(
        outcomes[1].result,
        Err(DemoError::InvalidRoundCount { .. })
    ));

    let third: serde_json::Value = serde_json::from_str(outcomes[2].result.as_ref().unwrap())?;
    assert_eq!(third["k"], 4);
    Ok(())
}

#[test]
fn test_config_file_limits_applied() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("rfa-demo.toml");
    std::fs::write(
        &config_path,
        r#"
[defaults]
k = 4
algo = "2"

[limits]
max_items = 2
max_rounds = 8
"#,
    )?;

    let config = DemoConfig::from_file(&config_path)?;
    config.validate()?;

    let orchestrator = RequestOrchestrator::new(RepeatedAllocation::new())
        .with_limits(config.limits.parse_limits(), config.limits.max_rounds);

    let too_many_items = rfa_demo::DemoRequest::new(
        "{0: {0: 1, 1: 1, 2: 1}, 1: {0: 1, 1: 1, 2: 1}}",
        config.defaults.k,
        config.defaults.algo.clone(),
    );
    assert!(matches!(
        orchestrator.prepare(&too_many_items),
        Err(DemoError::MalformedInput { .. })
    ));

    let too_many_rounds = rfa_demo::DemoRequest::new("{0: {0: 1}, 1: {0: 1}}", 10, "2");
    assert!(matches!(
        orchestrator.prepare(&too_many_rounds),
        Err(DemoError::InvalidRoundCount { .. })
    ));
    Ok(())
}

#[test]
fn test_missing_config_file_is_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let err = DemoConfig::from_file(temp_dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, DemoError::IoError(_)));
}
