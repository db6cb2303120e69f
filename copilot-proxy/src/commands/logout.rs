//! `logout`: deletes the persisted long-lived token.

use config::Config;

pub async fn run(config: &Config) -> anyhow::Result<()> {
    let store = config.credentials.build_store()?;
    store.erase()?;
    println!("Removed the stored token.");
    Ok(())
}
