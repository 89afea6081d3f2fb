use tracing_subscriber::EnvFilter;

use tender_review::{api, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the process environment is used as-is.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tender_review=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    api::serve(config).await
}
