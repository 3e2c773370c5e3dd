use dealscout::pipeline::DealPipeline;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();
    if let Err(err) = run().await {
        error!(target = "dealscout.cli", "run failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut args = std::env::args().skip(1);
    let keyword = args
        .next()
        .unwrap_or_else(|| "computer parts".to_string());
    let limit: u32 = args.next().and_then(|v| v.parse().ok()).unwrap_or(50);

    let pipeline = DealPipeline::from_env()?;
    let deals = pipeline.evaluate_all(&keyword, limit).await?;
    info!(
        target = "dealscout.cli",
        keyword,
        count = deals.len(),
        "evaluation complete"
    );
    for deal in &deals {
        println!("{}", serde_json::to_string(deal)?);
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
