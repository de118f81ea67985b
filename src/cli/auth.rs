use crate::config::Config;
use crate::error::Result;
use crate::sheets::{SheetsClient, clear_tokens};
use tracing::info;

pub async fn execute(reset: bool) -> Result<()> {
    if reset {
        clear_tokens()?;
    }

    let config = Config::load()?;
    let _client = SheetsClient::new(&config.google).await?;

    info!("Google authentication verified");

    Ok(())
}
