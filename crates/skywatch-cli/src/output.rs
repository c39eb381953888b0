//! Terminal output in human or JSON mode
//!
//! Human mode prints marked status lines; `--quiet` drops the chatter but
//! keeps warnings, errors and file content. JSON mode writes one compact
//! object per line to stdout so `watch --json` can be piped, and reports
//! problems as objects on stderr.

use serde_json::{json, Value};

/// Where a rendered line goes
#[derive(Debug, PartialEq)]
enum Line {
    Stdout(String),
    Stderr(String),
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Success,
    Error,
    Warn,
    Info,
    Raw,
}

/// Prints command results for the selected mode
#[derive(Debug, Clone, Copy)]
pub struct Printer {
    json: bool,
    quiet: bool,
}

impl Printer {
    pub fn new(json: bool, quiet: bool) -> Self {
        Self { json, quiet }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    pub fn success(&self, message: &str) {
        self.emit(Kind::Success, message);
    }

    pub fn error(&self, message: &str) {
        self.emit(Kind::Error, message);
    }

    pub fn warn(&self, message: &str) {
        self.emit(Kind::Warn, message);
    }

    pub fn info(&self, message: &str) {
        self.emit(Kind::Info, message);
    }

    /// Prints text exactly as given (file content); nothing in JSON mode
    pub fn raw(&self, text: &str) {
        self.emit(Kind::Raw, text);
    }

    /// Prints `value` on one line; nothing in human mode
    pub fn print_json(&self, value: &Value) {
        if self.json {
            println!("{value}");
        }
    }

    fn emit(&self, kind: Kind, message: &str) {
        match self.render(kind, message) {
            Some(Line::Stdout(line)) => println!("{line}"),
            Some(Line::Stderr(line)) => eprintln!("{line}"),
            None => {}
        }
    }

    fn render(&self, kind: Kind, message: &str) -> Option<Line> {
        if self.json {
            return match kind {
                Kind::Success => Some(Line::Stdout(
                    json!({"success": true, "message": message}).to_string(),
                )),
                Kind::Error => Some(Line::Stderr(
                    json!({"success": false, "error": message}).to_string(),
                )),
                Kind::Warn => Some(Line::Stderr(
                    json!({"level": "warning", "message": message}).to_string(),
                )),
                Kind::Info | Kind::Raw => None,
            };
        }

        match kind {
            Kind::Success if !self.quiet => Some(Line::Stdout(format!("\u{2713} {message}"))),
            Kind::Info if !self.quiet => Some(Line::Stdout(format!("  {message}"))),
            Kind::Success | Kind::Info => None,
            Kind::Error => Some(Line::Stderr(format!("\u{2717} Error: {message}"))),
            Kind::Warn => Some(Line::Stderr(format!("\u{26a0} Warning: {message}"))),
            Kind::Raw => Some(Line::Stdout(message.to_string())),
        }
    }
}
