pub mod client;
pub mod cmd;
pub mod ui;

use anyhow::Result;
use phoenix::utils::tracing::init_tracing;
use tracing::Level;

use crate::ui::message::message_error;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(Level::WARN);

    if let Err(e) = cmd::run_cli().await {
        message_error(e.to_string());
        std::process::exit(1);
    }

    Ok(())
}
