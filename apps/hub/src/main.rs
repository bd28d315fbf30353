use tracing_subscriber::EnvFilter;
use road_hub::HubConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cfg = HubConfig::from_env()?;
    road_hub::serve(cfg).await
}
