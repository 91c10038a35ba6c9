//! `medtriage serve`: start the HTTP API server.

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("🩺 MedTriage Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Store:     {} ({})", config.store.backend, config.store.resolved_path().display());
    println!("   Provider:  {}", config.default_provider);

    medtriage_gateway::start(config).await?;

    Ok(())
}
