//! Human and JSON output for CLI commands
//!
//! Human output goes to stdout with status glyphs; JSON mode prints one
//! document per command so the output can be piped into `jq`.

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Sink for command output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    /// A labelled value, aligned in human mode
    fn field(&self, label: &str, value: &str);
    fn print_json(&self, value: &serde_json::Value);
}

/// Glyph-prefixed lines for terminals
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {message}");
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} {message}");
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} {message}");
    }
    fn info(&self, message: &str) {
        println!("  {message}");
    }
    fn field(&self, label: &str, value: &str) {
        println!("  {:<16} {}", format!("{label}:"), value);
    }
    fn print_json(&self, _value: &serde_json::Value) {}
}

/// JSON output formatter
///
/// Status lines become single-line objects on stderr so stdout carries only
/// the command's document.
pub struct JsonFormatter;

fn status_line(value: serde_json::Value) {
    eprintln!("{value}");
}

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        status_line(serde_json::json!({ "level": "success", "message": message }));
    }
    fn error(&self, message: &str) {
        status_line(serde_json::json!({ "level": "error", "message": message }));
    }
    fn warn(&self, message: &str) {
        status_line(serde_json::json!({ "level": "warning", "message": message }));
    }
    fn info(&self, _message: &str) {}
    fn field(&self, _label: &str, _value: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{text}"),
            Err(e) => status_line(serde_json::json!({ "level": "error", "message": e.to_string() })),
        }
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Human => Box::new(HumanFormatter),
    }
}

/// Short form of a checksum for human output
pub fn short_checksum(checksum: &str) -> &str {
    checksum.get(..12).unwrap_or(checksum)
}
