//! Stopwatch commands
//!
//! `timer run` is a small readline loop around a [`LiveStopwatch`]; the
//! stopwatch keeps ticking in the background while the prompt waits.

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::error::Result;
use crate::timer::{format_elapsed, LiveStopwatch, TimerState};

/// Input understood by the interactive stopwatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerInput {
    Start,
    Pause,
    Toggle,
    Reset,
    Status,
    Help,
    Quit,
}

/// Parse one line of stopwatch input. Blank input toggles.
pub fn parse_timer_input(line: &str) -> Option<TimerInput> {
    match line.trim().to_lowercase().as_str() {
        "" | "t" | "toggle" => Some(TimerInput::Toggle),
        "s" | "start" => Some(TimerInput::Start),
        "p" | "pause" | "stop" => Some(TimerInput::Pause),
        "r" | "reset" => Some(TimerInput::Reset),
        "status" | "show" => Some(TimerInput::Status),
        "h" | "help" | "?" => Some(TimerInput::Help),
        "q" | "quit" | "exit" => Some(TimerInput::Quit),
        _ => None,
    }
}

fn print_help() {
    println!(
        "\n  {}  start    {}  pause    {}  toggle (or Enter)\n  {}  reset    {}  status   {}  quit\n",
        "s".bold(),
        "p".bold(),
        "t".bold(),
        "r".bold(),
        "status".bold(),
        "q".bold()
    );
}

fn print_status(stopwatch: &LiveStopwatch) {
    let state = match stopwatch.state() {
        TimerState::Running => stopwatch.state().to_string().green(),
        TimerState::Idle => stopwatch.state().to_string().yellow(),
    };
    println!("{}  {}", stopwatch.format().bold(), state);
}

/// Run the interactive stopwatch until `quit`, Ctrl-C or Ctrl-D
pub async fn run_timer() -> Result<()> {
    let mut stopwatch = LiveStopwatch::new();
    let mut rl = DefaultEditor::new()?;

    println!("{}", "Study timer".bold());
    print_help();

    loop {
        let prompt = format!("[{}] > ", stopwatch.format());
        match rl.readline(&prompt) {
            Ok(line) => {
                let Some(input) = parse_timer_input(&line) else {
                    println!("Unknown command: {} (type `help`)", line.trim());
                    continue;
                };
                if !line.trim().is_empty() {
                    let _ = rl.add_history_entry(line.trim());
                }

                match input {
                    TimerInput::Start => stopwatch.start(),
                    TimerInput::Pause => stopwatch.pause(),
                    TimerInput::Toggle => {
                        stopwatch.toggle();
                    }
                    TimerInput::Reset => stopwatch.reset(),
                    TimerInput::Status => {}
                    TimerInput::Help => {
                        print_help();
                        continue;
                    }
                    TimerInput::Quit => break,
                }
                print_status(&stopwatch);
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                tracing::error!("Readline error: {:?}", err);
                break;
            }
        }
    }

    println!("Studied {}", stopwatch.format());
    Ok(())
}

/// Print `seconds` as `HH:MM:SS`
pub fn print_formatted(seconds: u64) {
    println!("{}", format_elapsed(seconds));
}
