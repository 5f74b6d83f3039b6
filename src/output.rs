use clap::ValueEnum;
use colored::Colorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Pretty,
    Minimal,
}

pub fn mode_label(dry_run: bool) -> &'static str {
    if dry_run { "dry-run" } else { "apply" }
}

/// Section of yellow bullet points, skipped when empty.
pub fn print_warnings(warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    println!("\n{}", "Warnings".yellow().bold());
    for warning in warnings {
        println!("  - {}", warning.yellow());
    }
}

/// `#N`, or `-` when there is nothing to show.
pub fn slot_ref(id: Option<u64>) -> String {
    id.map(|id| format!("#{id}")).unwrap_or_else(|| "-".into())
}
