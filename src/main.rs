use clap::Parser;
use github_csv_etl::domain::model::FileState;
use github_csv_etl::utils::logger::{self, TracingObserver};
use github_csv_etl::{Cli, EtlConfig, EtlEngine, RunSummary};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logger::init_cli_logger(cli.verbose);
    tracing::info!("Starting github-csv-etl");

    let mut config = match EtlConfig::from_file_or_default(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", cli.config, e);
            std::process::exit(1);
        }
    };
    cli.apply_overrides(&mut config);
    if cli.verbose {
        tracing::debug!("Effective config: {:?}", config);
    }

    let engine = match EtlEngine::from_config(&config, Arc::new(TracingObserver)) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            eprintln!("❌ {}", e);
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    match engine.execute(cli.command.into()).await {
        Ok(summary) => print_summary(&summary),
        Err(e) => {
            tracing::error!(
                "❌ Batch failed: {} (Severity: {:?})",
                e,
                e.severity()
            );
            eprintln!("❌ {}", e);
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = e.severity().exit_code();
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }
}

fn print_summary(summary: &RunSummary) {
    match summary {
        RunSummary::Listed(files) => {
            for file in files {
                println!("{}", file.name);
            }
        }
        RunSummary::Fetched(report) | RunSummary::Loaded(report) => {
            for outcome in &report.outcomes {
                match &outcome.state {
                    FileState::Failed { stage, reason } => {
                        println!("❌ {} failed at {}: {}", outcome.name, stage, reason)
                    }
                    FileState::Uploaded { blob } => {
                        println!("✅ {} -> {}", outcome.name, blob.location)
                    }
                    state => println!("✅ {} {:?}", outcome.name, state),
                }
            }
            println!(
                "📁 {} succeeded, {} failed",
                report.outcomes.len() - report.failures().count(),
                report.failures().count()
            );
        }
    }
}
