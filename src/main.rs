use palisade::{
    api::start_api_server,
    config::AppConfig,
    observability::{init_logging, log_config_info},
    Result, APP_NAME, VERSION,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (optional - won't fail if missing)
    // This must happen before any config is read from environment
    if let Err(e) = dotenvy::dotenv() {
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    init_logging()?;
    info!(app_name = APP_NAME, version = VERSION, "Starting Palisade certificate authority");

    let config = AppConfig::from_env()?;
    log_config_info(&config);

    start_api_server(config).await
}
