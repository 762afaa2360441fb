use gatekeeper::{config::GatekeeperConfig, init_gatekeeper, init_tracing};
use std::env;
use std::process;

#[tokio::main]
async fn main() {
    init_tracing();

    // Config file path from command line or default
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "config/gatekeeper.yaml".to_string());

    let config = match GatekeeperConfig::from_file(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from {}: {}", config_path, e);
            eprintln!("Usage: gatekeeper [config_file]");
            process::exit(1);
        }
    };

    if let Err(e) = init_gatekeeper(config).await {
        eprintln!("Gatekeeper error: {}", e);
        process::exit(1);
    }
}
