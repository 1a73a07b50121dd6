// Output formatting and display for CLI

use crate::ipc::ResponseData;
use crate::metrics::MetricsPoint;
use crate::process::{ActionOutcome, LifecycleState, UnitStatus};
use chrono::{DateTime, Local};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

/// Print a successful daemon response to stdout
pub fn print_response(data: &ResponseData) {
    match data {
        ResponseData::Action(outcome) => print_outcome(outcome),

        ResponseData::Status(units) => print_status_table(units),

        ResponseData::Logs { unit, log, lines } => print_logs(unit, log.as_deref(), lines),

        ResponseData::Metrics(points) => {
            if points.is_empty() {
                println!("{}", "No samples collected yet".yellow());
            } else {
                print_metrics_table(points);
            }
        }

        ResponseData::Pong { uptime, units } => {
            println!("{}", "✓ Daemon is running".green().bold());
            println!("  {}: {}", "Uptime".bold(), format_duration(uptime));
            println!("  {}: {}", "Units".bold(), units);
        }
    }
}

/// Print the operator-facing message of a control action
fn print_outcome(outcome: &ActionOutcome) {
    match outcome {
        ActionOutcome::Started { pid, .. } => {
            println!("{} {}", "✓".green().bold(), outcome);
            println!("  {}: {}", "PID".bold(), pid);
        }
        ActionOutcome::Stopped { forced: true, .. } => {
            println!(
                "{} {} {}",
                "✓".green().bold(),
                outcome,
                "(killed after stop timeout)".yellow()
            );
        }
        ActionOutcome::AlreadyRunning { .. } | ActionOutcome::NotRunning { .. } => {
            println!("{} {}", "ℹ".blue().bold(), outcome);
        }
        _ => println!("{} {}", "✓".green().bold(), outcome),
    }
}

/// Print an error message to stderr
pub fn print_error(error: &str) {
    eprintln!("{} {}", "✗ Error:".red().bold(), error);
}

/// Print a formatted table of units
pub fn print_status_table(units: &[UnitStatus]) {
    #[derive(Tabled)]
    struct UnitRow {
        #[tabled(rename = "Unit")]
        name: String,
        #[tabled(rename = "Kind")]
        kind: String,
        #[tabled(rename = "State")]
        state: String,
        #[tabled(rename = "PID")]
        pid: String,
        #[tabled(rename = "Uptime")]
        uptime: String,
        #[tabled(rename = "Log")]
        log: String,
    }

    let rows: Vec<UnitRow> = units
        .iter()
        .map(|u| UnitRow {
            name: truncate(&u.name, 24),
            kind: u.kind.to_string(),
            state: format_state_colored(u),
            pid: u
                .pid
                .map(|pid| pid.to_string())
                .unwrap_or_else(|| "-".to_string()),
            uptime: format_uptime_cell(u.uptime.as_ref()),
            log: format_log_cell(u.log.as_ref()),
        })
        .collect();

    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));

    println!("\n{}\n", table);

    let running = units
        .iter()
        .filter(|u| u.state == LifecycleState::Running)
        .count();
    println!(
        "{}",
        format!("Total: {} unit(s), {} running", units.len(), running)
            .dimmed()
            .italic()
    );
}

/// Print recent host samples, oldest first
fn print_metrics_table(points: &[MetricsPoint]) {
    #[derive(Tabled)]
    struct MetricsRow {
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "CPU")]
        cpu: String,
        #[tabled(rename = "Sent")]
        sent: String,
        #[tabled(rename = "Received")]
        received: String,
    }

    let rows: Vec<MetricsRow> = points
        .iter()
        .map(|p| {
            let at: DateTime<Local> = p.at.into();
            MetricsRow {
                time: at.format("%H:%M:%S").to_string(),
                cpu: format!("{:.1}%", p.cpu_percent),
                sent: format_delta(p.sent_delta),
                received: format_delta(p.received_delta),
            }
        })
        .collect();

    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));

    println!("\n{}\n", table);
}

/// Print the tail of a unit's log
fn print_logs(unit: &str, log: Option<&Path>, lines: &[String]) {
    let Some(log) = log else {
        println!("{}", format!("{} has never been started", unit).yellow());
        return;
    };

    println!("\n{} {}", "Logs".bold().underline(), log.display().to_string().dimmed());
    println!();

    if lines.is_empty() {
        println!("{}", "Log is empty".yellow());
    }
    for line in lines {
        println!("{}", line);
    }

    println!();
}

/// Clear the terminal before redrawing a watched view
pub fn clear_screen() {
    print!("\x1B[2J\x1B[H");
}

/// Format a unit's state with color coding
fn format_state_colored(unit: &UnitStatus) -> String {
    let state = unit.state;
    match state {
        LifecycleState::Running => state.to_string().green().to_string(),
        LifecycleState::Stopped => state.to_string().bright_black().to_string(),
        LifecycleState::NeverStarted => state.to_string().dimmed().to_string(),
        LifecycleState::Crashed => match unit.exit_code {
            Some(code) => format!("{} (exit {})", state, code).red().bold().to_string(),
            None => state.to_string().red().bold().to_string(),
        },
        LifecycleState::Beating => match unit.heartbeats {
            Some(count) => format!("{} ({})", state, count).cyan().to_string(),
            None => state.to_string().cyan().to_string(),
        },
    }
}

/// Show only the artifact's file name; the directory is the same for every unit
fn format_log_cell(log: Option<&PathBuf>) -> String {
    log.and_then(|path| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "-".to_string())
}

fn format_uptime_cell(uptime: Option<&Duration>) -> String {
    uptime.map(format_duration).unwrap_or_else(|| "-".to_string())
}

/// Format a duration in human-readable format
fn format_duration(duration: &Duration) -> String {
    let secs = duration.as_secs();

    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        let mins = secs / 60;
        let secs = secs % 60;
        if secs > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}m", mins)
        }
    } else if secs < 86400 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        if mins > 0 {
            format!("{}h {}m", hours, mins)
        } else {
            format!("{}h", hours)
        }
    } else {
        let days = secs / 86400;
        let hours = (secs % 86400) / 3600;
        if hours > 0 {
            format!("{}d {}h", days, hours)
        } else {
            format!("{}d", days)
        }
    }
}

/// Format a per-interval byte count; the oldest sample has none
fn format_delta(delta: Option<u64>) -> String {
    delta.map(format_bytes).unwrap_or_else(|| "-".to_string())
}

/// Format a byte count in human-readable format
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes < KB {
        format!("{}B", bytes)
    } else if bytes < MB {
        format!("{:.1}KB", bytes as f64 / KB as f64)
    } else if bytes < GB {
        format!("{:.1}MB", bytes as f64 / MB as f64)
    } else {
        format!("{:.2}GB", bytes as f64 / GB as f64)
    }
}

/// Truncate a string to a maximum number of characters
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Create a spinner for operations that may wait on a stop timeout
pub fn create_progress_bar(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Finish a progress bar with error
pub fn finish_progress_error(pb: ProgressBar, message: &str) {
    pb.finish_with_message(format!("{} {}", "✗".red(), message));
}
