//! `medtriage triage`: run the text pipeline once and print the result.

pub async fn run(text: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let service = super::open_service(&config).await?;

    let result = service.process_text(text).await?;

    println!("🩺 Triage");
    println!("=========");
    println!("  Understood:   {}", result.extraction.transcription_en);
    if !result.extraction.symptoms.is_empty() {
        println!("  Symptoms:     {}", result.extraction.symptoms.join(", "));
    }
    println!("  Suggestion:   {}", result.extraction.specific_suggestion);
    println!();
    println!("  Specialist:   {}", result.triage.specialist);
    println!("  Priority:     {}", result.triage.priority);
    println!("  Reason:       {}", result.triage.reason);
    println!("\n  Recorded as event #{}", result.event.id);

    Ok(())
}
