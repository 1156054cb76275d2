use newsflow::api::NewsApiClient;
use newsflow::config::Config;
use newsflow::db::Repository;
use newsflow::error::{AppError, Result};
use newsflow::scheduler;
use newsflow::services::WebhookNotifier;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let run_once = args.len() >= 2 && args[1] == "--once";
    let monitor_once = args.len() >= 2 && args[1] == "--monitor";
    if args.len() >= 2 && !run_once && !monitor_once {
        return Err(anyhow::anyhow!("Unknown argument: {} (expected --once or --monitor)", args[1]).into());
    }

    let config = Config::load()?;

    let api_key = config
        .api_key
        .clone()
        .ok_or_else(|| AppError::Config("No API key configured; set NEWSFLOW_API_KEY".into()))?;

    let repository = Repository::new(&config.db_path).await?;
    let client = NewsApiClient::new(api_key);
    let notifier = config.alert_webhook_url.clone().map(WebhookNotifier::new);

    if monitor_once {
        let alerted = scheduler::run_monitor_once(&repository, notifier.as_ref()).await?;
        if alerted {
            println!("Failure report generated");
        } else {
            println!("No failures in the last hour");
        }
        return Ok(());
    }

    if run_once {
        let summary = scheduler::run_pipeline_once(&repository, &client, &config).await?;
        println!(
            "Fetched {} articles, {} accumulated, {} filtered",
            summary.fetched, summary.accumulated, summary.filtered_total
        );
        return Ok(());
    }

    scheduler::run(&repository, &client, &config, notifier.as_ref()).await
}
