//! `medtriage note`: record a history note.

pub async fn run(text: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let service = super::open_service(&config).await?;

    let event = service.add_history(text).await?;
    println!("✅ Recorded history note #{}", event.id);

    Ok(())
}
