pub mod desktop;
pub mod settings;
pub mod terminal;
pub mod vm;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::client::get_context;

#[derive(Parser)]
#[command(name = "phoenix")]
#[command(about = "Remote control for a QEMU virtual machine", long_about = None)]
pub struct Cli {
    /// Keep settings in memory for this invocation only
    #[arg(long, global = true)]
    pub ephemeral: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the VM run-state and server health
    Status(vm::StatusArgs),

    /// Follow VM run-state changes until interrupted
    Watch,

    /// Show the VM configuration the server suggests
    Defaults,

    /// Start the VM
    Start(vm::StartArgs),

    /// Stop the VM
    Stop(WaitArgs),

    /// Run a single command in the VM shell and print its output
    Exec(terminal::ExecArgs),

    /// Interactive shell session (short: sh)
    #[command(alias = "sh")]
    Terminal,

    /// Show recent hypervisor logs
    Logs,

    /// Resolve the remote desktop viewer address
    Desktop(desktop::DesktopArgs),

    /// Server address and preferences
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Subcommand)]
pub enum SettingsCommand {
    /// Show the stored settings
    Show,

    /// Change the control-plane address
    SetUrl(settings::SetUrlArgs),

    /// Change preferences
    Set(settings::SetArgs),

    /// Restore every setting to its default
    Reset,

    /// Check that a server answers, without saving anything
    Test(settings::TestArgs),
}

#[derive(Clone, Debug, Args)]
pub struct WaitArgs {
    /// Wait for the follow-up status check and print the resulting state
    #[arg(long = "wait", short = 'w')]
    pub wait: bool,
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    let ctx = get_context(cli.ephemeral).await?;

    match cli.command {
        Command::Status(args) => vm::run_status(&ctx, args).await,
        Command::Watch => vm::run_watch(&ctx).await,
        Command::Defaults => vm::run_defaults(&ctx).await,
        Command::Start(args) => vm::run_start(&ctx, args).await,
        Command::Stop(args) => vm::run_stop(&ctx, args).await,
        Command::Exec(args) => terminal::run_exec(&ctx, args).await,
        Command::Terminal => terminal::run_terminal(&ctx).await,
        Command::Logs => vm::run_logs(&ctx).await,
        Command::Desktop(args) => desktop::run_desktop(&ctx, args).await,
        Command::Settings(cmd) => match cmd {
            SettingsCommand::Show => settings::run_settings_show(&ctx).await,
            SettingsCommand::SetUrl(args) => settings::run_settings_set_url(&ctx, args).await,
            SettingsCommand::Set(args) => settings::run_settings_set(&ctx, args).await,
            SettingsCommand::Reset => settings::run_settings_reset(&ctx).await,
            SettingsCommand::Test(args) => settings::run_settings_test(&ctx, args).await,
        },
    }
}
