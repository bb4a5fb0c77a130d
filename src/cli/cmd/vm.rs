use std::time::Duration;

use anyhow::Result;
use clap::Args;
use phoenix::{
    client::ControlPlane,
    resources::vm::{RunState, VmConfig, VmField},
    session::VmSession,
};
use tokio::{
    sync::broadcast::{self, error::RecvError},
    time::timeout,
};

use crate::{
    client::Context,
    cmd::WaitArgs,
    ui::{
        message::{
            message_info, message_log, message_state, message_success, message_warn, state_style,
        },
        summary::{Summary, SummaryCellStyle},
    },
};

const REPOLL_GRACE: Duration = Duration::from_secs(3);

#[derive(Clone, Debug, Args)]
pub struct StatusArgs {
    /// Also query the server health endpoint
    #[arg(long = "health")]
    health: bool,
}

#[derive(Clone, Debug, Args)]
pub struct StartArgs {
    /// Memory in MiB
    #[arg(long = "ram")]
    ram_mb: Option<String>,

    /// Number of CPU cores
    #[arg(long = "cores")]
    cores: Option<String>,

    /// CPU model (max, qemu64, host, Haswell-v4, Skylake-Client-v4)
    #[arg(long = "cpu")]
    cpu_model: Option<String>,

    /// Path of the primary disk image on the server
    #[arg(long = "disk")]
    primary_disk_path: Option<String>,

    /// Path of an ISO to attach as cdrom
    #[arg(long = "cdrom")]
    cdrom_path: Option<String>,

    /// Path of an extra data disk
    #[arg(long = "data-disk")]
    data_disk_path: Option<String>,

    /// Network device (virtio-net-pci, e1000, rtl8139)
    #[arg(long = "net")]
    net_device: Option<String>,

    /// Display adapter (virtio, std, qxl, vmware, cirrus)
    #[arg(long = "vga")]
    vga_model: Option<String>,

    /// Boot order (c, d, n, cd, dc, ncd, dnc)
    #[arg(long = "boot")]
    boot_order: Option<String>,

    /// Start from built-in defaults instead of asking the server
    #[arg(long = "no-defaults")]
    no_defaults: bool,

    #[command(flatten)]
    wait: WaitArgs,
}

impl StartArgs {
    fn edits(&self) -> Vec<(VmField, String)> {
        [
            (VmField::RamMb, &self.ram_mb),
            (VmField::Cores, &self.cores),
            (VmField::CpuModel, &self.cpu_model),
            (VmField::PrimaryDiskPath, &self.primary_disk_path),
            (VmField::CdromPath, &self.cdrom_path),
            (VmField::DataDiskPath, &self.data_disk_path),
            (VmField::NetDevice, &self.net_device),
            (VmField::VgaModel, &self.vga_model),
            (VmField::BootOrder, &self.boot_order),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.clone().map(|value| (field, value)))
        .collect()
    }
}

pub fn config_summary(config: &VmConfig) -> Summary {
    Summary::new()
        .row("memory", format!("{} MiB", config.ram_mb))
        .row("cores", config.cores)
        .important("cpu model", config.cpu_model)
        .row("primary disk", display_path(&config.primary_disk_path))
        .optional_row("cdrom", config.cdrom_path.as_deref())
        .optional_row("data disk", config.data_disk_path.as_deref())
        .important("network", config.net_device)
        .important("display", config.vga_model)
        .row("boot order", config.boot_order)
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { "-" } else { path }
}

pub async fn run_status(ctx: &Context, args: StatusArgs) -> Result<()> {
    let session = ctx.session();
    let state = session.poll_once().await;

    let mut summary = Summary::new()
        .row("server", ctx.endpoint.base_url().await)
        .styled_row("state", SummaryCellStyle::Custom(state_style(state)), state);

    if args.health {
        summary = match ctx.client.health().await {
            Ok(health) => summary
                .important("health", health.status)
                .row("vm running", health.vm_running),
            Err(e) => summary.row("health", format!("unavailable ({})", e)),
        };
    }

    summary.print();

    Ok(())
}

pub async fn run_watch(ctx: &Context) -> Result<()> {
    let session = ctx.session();
    let mut rx = session.subscribe();

    message_info(format!(
        "Watching {} every {} (Ctrl-C to stop)",
        ctx.endpoint.base_url().await,
        humantime::format_duration(ctx.config.status_poll_interval)
    ));
    session.start_polling().await;

    loop {
        tokio::select! {
            state = rx.recv() => match state {
                Ok(state) => message_state(state),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.stop_polling().await;

    Ok(())
}

pub async fn run_defaults(ctx: &Context) -> Result<()> {
    let defaults = ctx.client.get_defaults().await?;
    config_summary(&defaults).print();

    Ok(())
}

pub async fn run_start(ctx: &Context, args: StartArgs) -> Result<()> {
    let session = ctx.session();

    if !args.no_defaults {
        if let Err(e) = session.load_defaults().await {
            message_warn(format!(
                "Could not load server defaults, using built-in ones: {}",
                e
            ));
        }
    }

    let edits = args.edits();
    session
        .edit_draft(|draft| {
            for (field, value) in &edits {
                draft.set(*field, value)?;
            }
            Ok(())
        })
        .await?;

    let config = session.draft().await;
    config.validate()?;

    session.poll_once().await;
    let mut rx = session.subscribe();

    message_info("Starting VM with:");
    config_summary(&config).print();

    let message = session.start(&config).await?;
    message_success(message);

    if args.wait.wait {
        wait_for_repoll(&session, &mut rx, ctx.config.start_repoll_delay).await;
    }

    Ok(())
}

pub async fn run_stop(ctx: &Context, args: WaitArgs) -> Result<()> {
    let session = ctx.session();
    session.poll_once().await;
    let mut rx = session.subscribe();

    let message = session.stop().await?;
    message_success(message);

    if args.wait {
        wait_for_repoll(&session, &mut rx, ctx.config.stop_repoll_delay).await;
    }

    Ok(())
}

async fn wait_for_repoll(
    session: &VmSession,
    rx: &mut broadcast::Receiver<RunState>,
    delay: Duration,
) {
    // the re-poll only broadcasts if the state actually changed
    let _ = timeout(delay + REPOLL_GRACE, rx.recv()).await;
    message_state(session.state().await);
}

pub async fn run_logs(ctx: &Context) -> Result<()> {
    let logs = ctx.session().qemu_logs().await?;

    if logs.is_empty() {
        message_info("No recent logs available");
        return Ok(());
    }

    for line in logs {
        message_log(line);
    }

    Ok(())
}
