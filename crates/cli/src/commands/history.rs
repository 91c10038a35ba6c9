//! `medtriage history`: print the event log.

use medtriage_core::event::{Event, EventKind};
use medtriage_core::store::select_events;

pub async fn run(kinds: &[EventKind], limit: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let store = medtriage_store::open_store(&config.store).await?;

    let log = store.all().await?;
    let events = select_events(&log, kinds, limit.unwrap_or(usize::MAX));
    if events.is_empty() {
        println!("   No events recorded.");
        return Ok(());
    }

    for event in &events {
        println!("{}", render(event));
    }
    println!("\n   {} event(s)", events.len());

    Ok(())
}

fn render(event: &Event) -> String {
    let mut line = format!(
        "  #{:<4} {}  {:<14} {}",
        event.id,
        event.timestamp_iso(),
        event.kind().as_str(),
        event.text
    );
    if let Some(triage) = event.triage() {
        line.push_str(&format!(
            "\n         → {} [{}] {}",
            triage.specialist, triage.priority, triage.reason
        ));
    }
    line
}
