//! `medtriage report`: synthesize a SOAP report.

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let service = super::open_service(&config).await?;

    let report = service.generate_report().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
