//! `medtriage delete`: remove one event.

use medtriage_core::event::EventId;

pub async fn run(id: EventId) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let store = medtriage_store::open_store(&config.store).await?;

    match store.delete(id).await? {
        0 => println!("   No event #{id}; nothing deleted."),
        n => println!("✅ Deleted {n} event(s) with id #{id}"),
    }

    Ok(())
}
