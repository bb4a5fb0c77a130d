use std::time::Duration;

use anyhow::Result;
use clap::Args;
use phoenix::{
    Error,
    constants::QUICK_COMMANDS,
    resources::terminal::TerminalLine,
    terminal::TerminalChannel,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader, stdin},
    sync::broadcast::{Receiver, error::RecvError},
    task::JoinHandle,
    time::sleep,
};

use crate::{
    client::Context,
    ui::message::{message_info, message_terminal_line, message_warn},
};

#[derive(Clone, Debug, Args)]
pub struct ExecArgs {
    /// How long to keep collecting output after the command is accepted (eg. 3s, 500ms)
    #[arg(long = "follow", short = 'f', default_value = "3s")]
    follow: String,

    /// Command to run in the VM shell
    #[arg(required = true, trailing_var_arg = true)]
    command: Vec<String>,
}

fn spawn_printer(mut rx: Receiver<TerminalLine>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(line) => message_terminal_line(&line),
                Err(RecvError::Lagged(skipped)) => {
                    message_warn(format!("{} terminal lines skipped", skipped))
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

pub async fn run_exec(ctx: &Context, args: ExecArgs) -> Result<()> {
    let follow = humantime::parse_duration(&args.follow)?;
    let terminal = ctx.terminal();

    // drain whatever the server buffered before this command
    terminal.poll_output_once().await;

    let printer = spawn_printer(terminal.subscribe());
    let message = terminal.submit(&args.command.join(" ")).await?;
    message_info(message);

    terminal.start_polling().await;
    sleep(follow).await;
    terminal.stop_polling().await;
    terminal.poll_output_once().await;

    // let the printer flush what is already queued
    sleep(Duration::from_millis(50)).await;
    printer.abort();

    Ok(())
}

fn print_help() {
    message_info("Type a command and press enter to run it in the VM shell.");
    message_info(":clear  clear the local output log");
    message_info(":quick  list quick commands, :1 .. :5 runs one");
    message_info(":quit   leave the terminal");
}

pub async fn run_terminal(ctx: &Context) -> Result<()> {
    let terminal = ctx.terminal();
    let printer = spawn_printer(terminal.subscribe());
    terminal.start_polling().await;

    message_info(format!("Connected to {}", ctx.endpoint.base_url().await));
    print_help();

    let mut lines = BufReader::new(stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        let input = line.trim();
        let command = match input {
            "" => continue,
            ":quit" | ":q" | "exit" => break,
            ":help" => {
                print_help();
                continue;
            }
            ":clear" => {
                terminal.clear().await;
                message_info("Output cleared");
                continue;
            }
            ":quick" => {
                for (i, command) in QUICK_COMMANDS.iter().enumerate() {
                    message_info(format!(":{}  {}", i + 1, command));
                }
                continue;
            }
            other => match quick_command(other) {
                Some(command) => command.to_string(),
                None => other.to_string(),
            },
        };

        submit_in_background(&terminal, &command);
    }

    terminal.stop_polling().await;
    printer.abort();

    Ok(())
}

fn quick_command(input: &str) -> Option<&'static str> {
    let index: usize = input.strip_prefix(':')?.parse().ok()?;
    QUICK_COMMANDS.get(index.checked_sub(1)?).copied()
}

/// Keeps the prompt responsive; a second command while one is in flight is refused.
fn submit_in_background(terminal: &TerminalChannel, command: &str) {
    let submission = terminal.submit(command);
    tokio::spawn(async move {
        match submission.await {
            Ok(_) => {}
            Err(Error::Busy) => message_warn("Previous command is still being sent, try again"),
            Err(e) => message_warn(format!("Failed to send command: {}", e)),
        }
    });
}
