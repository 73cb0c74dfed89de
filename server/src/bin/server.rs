use parley_core::AppConfig;
use parley_server::start_server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Logging / tracing
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,parley_core=info,parley_server=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let config = AppConfig::load();
    if let Err(e) = config.validate() {
        tracing::error!(target: "server", error = %e, "Invalid configuration");
        return Err(e.into());
    }

    start_server(config).await.map_err(|e| e.into())
}
