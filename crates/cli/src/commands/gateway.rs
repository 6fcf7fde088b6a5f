//! `chatptk gateway` — Start the HTTP API server.

use chatptk_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("📚 ChatPTK Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {} via {}", config.model, config.provider);

    chatptk_gateway::start(config).await?;

    Ok(())
}
