use colored::Colorize;

use crate::commands::pause_before_writing;
use crate::config::RunConfig;
use crate::copier::{self, CopyAction, CopyReport};
use crate::error::Result;
use crate::output::{self, Format};
use crate::tracker::dry_run::DryRun;
use crate::tracker::{self, Credentials, Target};

pub fn run(
    from: &Target,
    to: &Target,
    credentials: &Credentials,
    config: &RunConfig,
    format: Format,
) -> Result<()> {
    let source = tracker::open(from, credentials)?;
    let dest = tracker::open(to, credentials)?;

    let report = if config.dry_run {
        copier::copy_all(source.as_ref(), &DryRun::new(dest), config)?
    } else {
        pause_before_writing(config);
        copier::copy_all(source.as_ref(), dest.as_ref(), config)?
    };
    print_report(&report, format)
}

fn print_report(report: &CopyReport, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(report)?),
        Format::Pretty => {
            println!(
                "{} {}",
                format!("copy {} -> {}", report.source, report.destination).bold(),
                format!("({})", output::mode_label(report.dry_run)).dimmed()
            );
            println!("  {} {}", "created:".dimmed(), report.created);
            println!("  {} {}", "updated:".dimmed(), report.updated);
            for slot in &report.slots {
                let action = match slot.action {
                    CopyAction::Created => "created".green(),
                    CopyAction::Updated => "updated".normal(),
                };
                println!("  {:>5} {} ({})", format!("#{}", slot.slot), action, slot.state);
            }
        }
        Format::Minimal => {
            println!(
                "copy {} created={} updated={}",
                output::mode_label(report.dry_run),
                report.created,
                report.updated
            );
        }
    }
    Ok(())
}
