//! Lint network definition files (JSON): buffer bounds, overlaps, containers, functions.
//!
//! Usage:
//!   lint_network [OPTIONS] [NETWORK.json ...]
//!   lint_network < network.json
//!
//! Options:
//!   --human, -H  Human-readable output
//!
//! If no files are given, reads from stdin. Exit code 1 if any error-level findings or a
//! file cannot be read or parsed.

use netmarshal::definition::NetworkDefinition;
use netmarshal::lint::{lint, LintMessage, Severity};
use std::io::{self, Read};
use std::path::Path;

#[derive(Clone, Copy)]
enum OutputStyle {
    Compact,
    Human,
}

fn print_message(path: &str, m: &LintMessage, style: OutputStyle) {
    let severity_str = match m.severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
    };
    match style {
        OutputStyle::Compact => {
            println!("{}:{}: {}: {} [{}]", path, m.location, severity_str, m.message, m.rule.id());
        }
        OutputStyle::Human => {
            println!("  {} {}: {}", path, m.location, m.message);
            println!("    {} ({})", severity_str, m.rule.id());
        }
    }
}

#[derive(Default)]
struct Totals {
    errors: usize,
    warnings: usize,
}

fn report(path: &str, source: &str, style: OutputStyle, totals: &mut Totals) -> anyhow::Result<bool> {
    let definition = NetworkDefinition::from_json_str(source)?;
    let messages = lint(&definition);
    for m in &messages {
        match m.severity {
            Severity::Error => totals.errors += 1,
            Severity::Warning => totals.warnings += 1,
        }
        print_message(path, m, style);
    }
    Ok(messages.iter().any(|m| m.severity == Severity::Error))
}

fn main() -> anyhow::Result<()> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let style = if let Some(pos) = args.iter().position(|a| a == "--human" || a == "-H") {
        args.remove(pos);
        OutputStyle::Human
    } else {
        OutputStyle::Compact
    };

    let mut has_error = false;
    let mut totals = Totals::default();

    if args.is_empty() {
        let mut src = String::new();
        io::stdin().read_to_string(&mut src)?;
        has_error |= report("<stdin>", &src, style, &mut totals)?;
    } else {
        for path in &args {
            let path = Path::new(path);
            let display_path = path.display().to_string();
            let src = match std::fs::read_to_string(path) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("{}: {}", display_path, e);
                    has_error = true;
                    continue;
                }
            };
            match report(&display_path, &src, style, &mut totals) {
                Ok(errors) => has_error |= errors,
                Err(e) => {
                    eprintln!("{}: {}", display_path, e);
                    has_error = true;
                }
            }
        }
    }

    if totals.errors > 0 || totals.warnings > 0 {
        eprintln!("lint: {} error(s), {} warning(s)", totals.errors, totals.warnings);
    }
    if has_error {
        std::process::exit(1);
    }
    Ok(())
}
