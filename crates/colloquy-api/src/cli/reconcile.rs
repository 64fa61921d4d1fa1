//! `colloquy reconcile`: one reconciliation pass, then exit.
//!
//! Only the stores are opened, so no generation API key is needed.

use anyhow::Result;
use console::style;

use colloquy_core::sync::ReconcileReport;

use crate::state::{Stores, load_environment};

pub async fn reconcile(json: bool) -> Result<()> {
    let (config, data_dir) = load_environment().await?;
    let stores = Stores::open(&config, &data_dir).await?;
    let report = stores.reconciler().run_once().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &ReconcileReport) {
    let marker = if report.entries_failed > 0 || report.sessions_deferred > 0 {
        style("!").yellow().bold()
    } else {
        style("✓").green().bold()
    };

    println!();
    println!("  {marker} Reconciliation pass finished");
    println!();
    row("Sessions scanned", report.sessions_scanned);
    row("Entries synced", report.entries_synced);
    row("Entries failed", report.entries_failed);
    row("Sessions retired", report.sessions_retired);
    row("Sessions deferred", report.sessions_deferred);
    row("Expired purged", report.expired_purged);
    println!();
}

fn row(label: &str, value: impl std::fmt::Display) {
    println!("  {:<18} {}", style(label).dim(), style(value).bold());
}
