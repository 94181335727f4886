use dotenv::dotenv;
use product_scanner::{
    api::{self, AppState},
    config::Config,
};
use std::net::SocketAddr;
use std::str::FromStr;
use tokio::net::TcpListener;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Main entry point for the product scanner service.
///
/// This function:
/// 1. Loads environment variables from .env file
/// 2. Builds the outbound clients and the API router
/// 3. Starts the HTTP server on the configured address
#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv().ok();

    FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false)
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .pretty()
        .init();

    info!("Starting product scanner service");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    let state = match AppState::from_config(&config) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "Failed to build HTTP clients");
            std::process::exit(1);
        }
    };
    let app = api::create_router(state, &config.static_dir);

    let addr = SocketAddr::from_str(&config.bind_address()).expect("Invalid address format");
    let listener = TcpListener::bind(addr).await.expect("Failed to bind address");

    info!("Server listening on {}", addr);
    axum::serve(listener, app).await.unwrap();
}
