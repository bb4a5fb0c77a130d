use ansi_term::{Color, Style};
use phoenix::resources::{
    terminal::{LineKind, TerminalLine},
    vm::RunState,
};

use crate::ui::{LOG_PADDING, MESSAGE_PADDING};

pub fn message_info(message: impl AsRef<str>) {
    let padding = "█".repeat(MESSAGE_PADDING) + " ";
    print!("{}", Style::new().fg(Color::Blue).bold().paint(padding));
    println!("{}", message.as_ref())
}

pub fn message_success(message: impl AsRef<str>) {
    let padding = "█".repeat(MESSAGE_PADDING) + " ";
    print!("{}", Style::new().fg(Color::Green).bold().paint(padding));
    println!("{}", message.as_ref())
}

pub fn message_error(message: impl AsRef<str>) {
    let padding = "error: ";
    eprint!("{}", Style::new().fg(Color::Red).bold().paint(padding));
    eprintln!("{}", message.as_ref())
}

pub fn message_warn(message: impl AsRef<str>) {
    let padding = "warning: ";
    print!("{}", Style::new().fg(Color::Yellow).bold().paint(padding));
    println!("{}", message.as_ref())
}

pub fn state_style(state: RunState) -> Style {
    match state {
        RunState::Running => Style::new().fg(Color::Green).bold(),
        RunState::Stopped => Style::new().fg(Color::Red).bold(),
        RunState::Unreachable | RunState::Unknown => Style::new().fg(Color::Yellow).bold(),
    }
}

pub fn message_state(state: RunState) {
    let padding = "█".repeat(MESSAGE_PADDING) + " ";
    print!("{}", state_style(state).paint(padding));
    println!("VM is {}", state_style(state).paint(state.to_string()))
}

pub fn message_terminal_line(line: &TerminalLine) {
    let style = match line.kind {
        LineKind::Command => Style::new().fg(Color::Cyan).bold(),
        LineKind::Error => Style::new().fg(Color::Red),
        LineKind::Success => Style::new().fg(Color::Green),
        LineKind::Info => Style::new().fg(Color::Blue),
        LineKind::Output => Style::new(),
    };

    let padding = "█".repeat(LOG_PADDING) + " ";
    print!("{}", style.paint(padding));
    println!("{}", style.paint(&line.text))
}

pub fn message_log(message: impl AsRef<str>) {
    let padding = "█".repeat(LOG_PADDING) + " ";
    print!("{}", Style::new().fg(Color::Purple).bold().paint(padding));
    println!("{}", message.as_ref())
}
