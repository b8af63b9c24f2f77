//! `relay serve`: load configuration from the environment and run the HTTP
//! surface until a shutdown signal arrives.

use config::AppConfig;
use server::AppState;

pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    server::logger::init(&config.log_level, config.log_file.as_deref());

    let listen_address = config.listen_address;
    let state = AppState::new(config);
    server::serve(listen_address, state).await
}
