use std::path::Path;

use colored::Colorize;
use serde::Serialize;

use crate::commands::pause_before_writing;
use crate::config::{RunConfig, Tables};
use crate::engine::{self, Action, RenumberReport};
use crate::error::Result;
use crate::export;
use crate::output::{self, Format};
use crate::pending::Pending;
use crate::tracker::dry_run::DryRun;
use crate::tracker::{self, Credentials, Target};
use crate::translate;

#[derive(Debug, Serialize)]
struct MigrateReport {
    records: usize,
    warnings: Vec<String>,
    #[serde(flatten)]
    renumber: RenumberReport,
}

pub fn run(
    export_source: &str,
    target: &Target,
    credentials: &Credentials,
    tables: Option<&Path>,
    config: &RunConfig,
    format: Format,
) -> Result<()> {
    let tables = match tables {
        Some(path) => Tables::load(path)?,
        None => Tables::default(),
    };
    let bugs = export::load(export_source)?;
    let translation = translate::translate_all(&bugs, &tables);
    let records = translation.records.len();
    let pending = Pending::new(translation.records)?;

    let destination = tracker::open(target, credentials)?;
    let renumber = if config.dry_run {
        engine::renumber(&DryRun::new(destination), pending, config)?
    } else {
        pause_before_writing(config);
        engine::renumber(destination.as_ref(), pending, config)?
    };

    let report = MigrateReport {
        records,
        warnings: translation.warnings,
        renumber,
    };
    print_report(&report, format)
}

fn action_label(action: Action) -> &'static str {
    match action {
        Action::Created => "created",
        Action::Renumbered => "renumbered",
        Action::Placeholder => "placeholder",
        Action::Reconciled => "reconciled",
        Action::Filled => "filled",
        Action::Skipped => "skipped",
        Action::Vacant => "vacant",
        Action::Unchanged => "unchanged",
    }
}

fn print_report(report: &MigrateReport, format: Format) -> Result<()> {
    let renumber = &report.renumber;
    let summary = &renumber.summary;

    match format {
        Format::Json => println!("{}", serde_json::to_string(report)?),
        Format::Pretty => {
            println!(
                "{} {}",
                format!("migrate -> {}", renumber.destination).bold(),
                format!("({})", output::mode_label(renumber.dry_run)).dimmed()
            );
            println!("  {} {}", "records:".dimmed(), report.records);
            println!(
                "  {} {} created, {} renumbered, {} placeholders",
                "slots written:".dimmed(),
                summary.created,
                summary.renumbered,
                summary.placeholders
            );
            println!(
                "  {} {} reconciled, {} left alone",
                "existing slots:".dimmed(),
                summary.reconciled,
                summary.skipped
            );
            println!("  {} {}", "move notes written:".dimmed(), summary.annotations);

            output::print_warnings(&report.warnings);

            if !renumber.decisions.is_empty() {
                println!("\n{}", "Slots".bold());
                for decision in &renumber.decisions {
                    let label = format!("{:12}", action_label(decision.action));
                    let label = match decision.action {
                        Action::Renumbered => label.yellow(),
                        Action::Skipped | Action::Vacant | Action::Unchanged => label.dimmed(),
                        _ => label.green(),
                    };
                    println!(
                        "  {:>5} {} record {}",
                        format!("#{}", decision.slot),
                        label,
                        output::slot_ref(decision.source_id)
                    );
                }
            }
        }
        Format::Minimal => {
            println!(
                "migrate {} records={} created={} renumbered={} placeholders={} reconciled={} skipped={} warnings={}",
                output::mode_label(renumber.dry_run),
                report.records,
                summary.created,
                summary.renumbered,
                summary.placeholders,
                summary.reconciled,
                summary.skipped,
                report.warnings.len()
            );
        }
    }

    Ok(())
}
