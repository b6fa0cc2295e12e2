//! Colored console output for deps
//!
//! Uses owo-colors for terminal colors. Progress bars live in
//! `helpers::internal::progress`.

use owo_colors::OwoColorize;

/// Print an action header (blue, bold)
/// Example: "==> Synchronizing 4 dependencies"
pub fn action(message: &str) {
    println!("{} {}", "==>".blue().bold(), message.bold());
}

/// Print an action with dependency counter
/// Example: "(1/5) zlib"
pub fn action_numbered(current: usize, total: usize, message: &str) {
    println!(
        "{} {}",
        format!("({}/{})", current, total).cyan(),
        message.bold()
    );
}

/// Print a sub-action (cyan arrow)
/// Example: "  -> extracting"
pub fn sub_action(stage: &str) {
    println!("  {} {}", "->".cyan(), stage);
}

/// Print a detail line (dimmed)
pub fn detail(message: &str) {
    println!("     {}", message.dimmed());
}

/// Print a success message (green)
pub fn success(message: &str) {
    println!("{} {}", "==>".green().bold(), message.green());
}

/// Print an info message (cyan)
pub fn info(message: &str) {
    println!("{} {}", "::".cyan(), message);
}

/// Print a warning message (yellow)
pub fn warning(message: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), message.yellow());
}

/// Print an error message (red)
pub fn error(message: &str) {
    eprintln!("{} {}", "error:".red().bold(), message.red());
}

/// Print a skip message (dimmed)
/// Example: "==> zlib up to date"
pub fn skip(message: &str) {
    println!("{} {}", "==>".dimmed(), message.dimmed());
}

/// Print a dependency row in `levitate-deps status` output
pub fn status_item(name: &str, status: &str, is_current: bool) {
    if is_current {
        println!("  {} {}", name.green(), status.dimmed());
    } else {
        println!("  {} {}", name.yellow(), status);
    }
}
