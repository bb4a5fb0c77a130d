use anyhow::{Result, bail};
use clap::Args;
use phoenix::settings::normalize_base_url;

use crate::{
    client::Context,
    ui::{
        message::{message_info, message_success, message_warn},
        summary::Summary,
    },
};

#[derive(Clone, Debug, Args)]
pub struct SetUrlArgs {
    /// Save without checking that the server answers
    #[arg(long = "skip-test")]
    skip_test: bool,

    /// Control-plane address, eg. http://192.168.1.20:5000
    url: String,
}

#[derive(Clone, Debug, Args)]
pub struct SetArgs {
    /// Refresh status automatically in interactive views
    #[arg(long = "auto-refresh")]
    auto_refresh: Option<bool>,

    /// Auto-refresh period in seconds
    #[arg(long = "refresh-interval")]
    refresh_interval: Option<u32>,

    /// Keep the display awake while connected
    #[arg(long = "keep-awake")]
    keep_awake: Option<bool>,
}

#[derive(Clone, Debug, Args)]
pub struct TestArgs {
    /// Address to test instead of the stored one
    url: Option<String>,
}

pub async fn run_settings_show(ctx: &Context) -> Result<()> {
    let preferences = ctx.endpoint.load().await;

    Summary::new()
        .important("server url", preferences.base_url)
        .row("auto refresh", preferences.auto_refresh_enabled)
        .row(
            "refresh interval",
            format!("{}s", preferences.refresh_interval_seconds),
        )
        .row("keep display awake", preferences.keep_display_awake)
        .row("config file", ctx.config.config_path.display())
        .row("store", ctx.config.store_path.display())
        .print();

    Ok(())
}

pub async fn run_settings_set_url(ctx: &Context, args: SetUrlArgs) -> Result<()> {
    let url = normalize_base_url(&args.url)?;

    if !args.skip_test {
        if let Err(e) = ctx.client.probe(&url).await {
            bail!(
                "Could not reach {}: {} (use --skip-test to save anyway)",
                url,
                e
            );
        }
    }

    ctx.endpoint.set_base_url(&url).await?;
    message_success(format!("Server url set to {}", url));

    Ok(())
}

pub async fn run_settings_set(ctx: &Context, args: SetArgs) -> Result<()> {
    if args.auto_refresh.is_none() && args.refresh_interval.is_none() && args.keep_awake.is_none()
    {
        message_warn("Nothing to change; see --help for the available settings");
        return Ok(());
    }

    if let Some(enabled) = args.auto_refresh {
        ctx.endpoint.set_auto_refresh_enabled(enabled).await?;
    }
    if let Some(secs) = args.refresh_interval {
        ctx.endpoint.set_refresh_interval_seconds(secs).await?;
    }
    if let Some(awake) = args.keep_awake {
        ctx.endpoint.set_keep_display_awake(awake).await?;
    }

    message_success("Settings saved");

    Ok(())
}

pub async fn run_settings_reset(ctx: &Context) -> Result<()> {
    ctx.endpoint.reset().await?;
    message_success("Settings reset to defaults");

    Ok(())
}

pub async fn run_settings_test(ctx: &Context, args: TestArgs) -> Result<()> {
    let url = match args.url {
        Some(url) => normalize_base_url(&url)?,
        None => ctx.endpoint.base_url().await,
    };

    message_info(format!("Testing {}", url));
    match ctx.client.probe(&url).await {
        Ok(status) => {
            let state = if status.running { "running" } else { "stopped" };
            message_success(format!("Server reachable, VM is {}", state));
            Ok(())
        }
        Err(e) => bail!("Could not reach {}: {}", url, e),
    }
}
