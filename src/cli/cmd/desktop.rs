use anyhow::Result;
use clap::Args;
use tokio::sync::broadcast::error::RecvError;

use crate::{
    client::Context,
    ui::message::{message_info, message_state, message_success, message_warn},
};

#[derive(Clone, Debug, Args)]
pub struct DesktopArgs {
    /// Keep watching the VM and report when the connection goes stale
    #[arg(long = "watch", short = 'w')]
    watch: bool,
}

pub async fn run_desktop(ctx: &Context, args: DesktopArgs) -> Result<()> {
    let session = ctx.session();
    let desktop = ctx.desktop(session.clone());

    session.poll_once().await;
    let url = desktop.connect().await?;
    message_success(format!("Remote desktop available at {}", url));

    if !args.watch {
        return Ok(());
    }

    let mut rx = session.subscribe();
    session.start_polling().await;
    message_info("Watching VM state (Ctrl-C to disconnect)");

    loop {
        tokio::select! {
            state = rx.recv() => match state {
                Ok(state) => {
                    message_state(state);
                    if desktop.is_stale().await {
                        message_warn("The VM is no longer running; the desktop session is stale");
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.stop_polling().await;
    desktop.disconnect().await;

    Ok(())
}
