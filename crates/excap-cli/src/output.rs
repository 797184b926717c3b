//! Small printing helpers shared by command handlers. Color is enabled
//! only when stdout is a TTY, falling back to plain text for piped
//! output.

use is_terminal::IsTerminal;
use owo_colors::OwoColorize;

pub fn color_enabled() -> bool {
    std::io::stdout().is_terminal()
}

pub fn success(msg: &str) {
    if color_enabled() {
        println!("{} {}", "OK".green().bold(), msg);
    } else {
        println!("OK {}", msg);
    }
}

pub fn warn(msg: &str) {
    if color_enabled() {
        eprintln!("{} {}", "WARN".yellow().bold(), msg);
    } else {
        eprintln!("WARN {}", msg);
    }
}

pub fn heading(msg: &str) {
    if color_enabled() {
        println!("{}", msg.bold());
    } else {
        println!("{}", msg);
    }
}
