use clap::Parser;
use rfa_demo::app::batch::{run_batch, BatchFile};
use rfa_demo::utils::error::ErrorClass;
use rfa_demo::utils::{logger, validation::Validate};
use rfa_demo::{CliConfig, DemoConfig, DemoError, RepeatedAllocation, RequestOrchestrator};
use std::sync::Arc;

fn exit_code(e: &DemoError) -> i32 {
    match e.class() {
        ErrorClass::ClientInput => 2,
        ErrorClass::Internal => 1,
    }
}

fn report(e: &DemoError) {
    if e.is_client_error() {
        tracing::warn!("❌ Request rejected: {}", e);
    } else {
        tracing::error!("❌ Request failed: {} (HTTP {})", e, e.http_status());
    }
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // 載入 TOML 配置（可選）
    let config = match &cli.config {
        Some(path) => match DemoConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ Failed to load config file '{}': {}", path.display(), e);
                eprintln!("💡 Make sure the file exists and is valid TOML format");
                std::process::exit(2);
            }
        },
        None => DemoConfig::default(),
    };

    // 初始化日誌
    let verbose = cli.verbose || config.logging.verbose;
    if cli.log_json || config.logging.json {
        logger::init_json_logger(verbose);
    } else {
        logger::init_cli_logger(verbose);
    }

    tracing::info!("Starting rfa-demo");
    if verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // 驗證配置
    if let Err(e) = config.validate().and_then(|_| cli.validate()) {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(2);
    }

    let orchestrator = RequestOrchestrator::new(RepeatedAllocation::new())
        .with_limits(config.limits.parse_limits(), config.limits.max_rounds);

    if let Some(path) = &cli.batch {
        let batch = match BatchFile::from_file(path) {
            Ok(batch) => batch,
            Err(e) => {
                eprintln!("❌ Failed to load batch file '{}': {}", path.display(), e);
                std::process::exit(2);
            }
        };

        let requests = batch.into_requests(&config.defaults);
        let outcomes = run_batch(
            Arc::new(orchestrator),
            Arc::from(cli.format.presenter()),
            requests,
        )
        .await;

        let mut worst = 0;
        for outcome in outcomes {
            println!("=== {}", outcome.name);
            match outcome.result {
                Ok(rendered) => println!("{}", rendered),
                Err(e) => {
                    report(&e);
                    println!("error: {}", e.user_friendly_message());
                    // 內部錯誤 (1) 優先於輸入錯誤 (2)
                    let code = exit_code(&e);
                    if worst == 0 || code < worst {
                        worst = code;
                    }
                }
            }
        }
        tracing::info!("✅ Batch finished");
        if worst != 0 {
            std::process::exit(worst);
        }
        return Ok(());
    }

    let request = match cli.request(&config.defaults) {
        Ok(request) => request,
        Err(e) => {
            report(&e);
            std::process::exit(exit_code(&e));
        }
    };

    let presenter = cli.format.presenter();
    match orchestrator.handle(&request, presenter.as_ref()) {
        Ok(rendered) => {
            println!("{}", rendered);
            tracing::info!("✅ Allocation computed");
        }
        Err(e) => {
            report(&e);
            std::process::exit(exit_code(&e));
        }
    }

    Ok(())
}
