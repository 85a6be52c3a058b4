//! Run command implementation.

use dirsync_catalog::CatalogStore;
use dirsync_engine::{
    CatalogGateway, LdapDirectory, PhaseOutcome, RunReport, SyncJob, SyncJobConfig,
};
use std::path::Path;
use std::sync::Arc;

/// The job type the CLI runs.
pub type LdapJob = SyncJob<LdapDirectory, CatalogGateway>;

/// Opens the catalog and builds a job for `config_path`.
pub fn open_job(
    path: &Path,
    config_path: &Path,
) -> Result<(LdapJob, SyncJobConfig), Box<dyn std::error::Error>> {
    let config = SyncJobConfig::from_json_file(config_path)?;
    let store = Arc::new(CatalogStore::open(path)?);
    let job = SyncJob::new(
        LdapDirectory::new(config.directory.clone()),
        CatalogGateway::new(store),
    );
    Ok((job, config))
}

/// Runs the run command.
///
/// A failed run still exits successfully unless `strict` is set; the
/// report and the log carry the failure.
pub fn run(
    path: &Path,
    config_path: &Path,
    format: &str,
    strict: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (job, config) = open_job(path, config_path)?;
    let report = job.run(&config);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            print_text_output(&report);
        }
    }

    if strict && !report.is_success() {
        return Err(format!(
            "sync run {} failed: {}",
            report.run_id,
            report.first_error().unwrap_or_default()
        )
        .into());
    }
    Ok(())
}

/// One-line summary of a report.
pub fn summary(report: &RunReport) -> String {
    format!(
        "run {}: users {}, groups {}, transaction {}, {} removed, {} created, {:.2?}",
        report.run_id,
        report.users,
        report.groups,
        report.transaction,
        report.removed_users().len(),
        report.created_groups().len(),
        report.duration
    )
}

fn print_text_output(report: &RunReport) {
    println!("Sync Run {}", report.run_id);
    println!("=====================================");
    if let Some(error) = &report.setup_error {
        println!("Setup error:     {error}");
    }
    println!("User phase:      {}", report.users);
    if let PhaseOutcome::Completed(users) = &report.users {
        println!("  Directory users:     {}", users.directory_users);
        println!("  Removed users:       {}", users.removed.len());
        println!("  Removed memberships: {}", users.memberships_removed);
        for name in &users.removed {
            println!("    - {name}");
        }
    }
    println!("Group phase:     {}", report.groups);
    if let PhaseOutcome::Completed(groups) = &report.groups {
        println!("  Directory groups:    {}", groups.directory_groups);
        println!("  Created groups:      {}", groups.created.len());
        println!("  Existing groups:     {}", groups.existing.len());
        println!("  Skipped names:       {}", groups.skipped.len());
        for name in &groups.created {
            println!("    + {name}");
        }
    }
    println!("Transaction:     {}", report.transaction);
    if report.rollbacks > 0 {
        println!("Rollbacks:       {}", report.rollbacks);
    }
    for error in &report.cleanup_errors {
        println!("Cleanup error:   {error}");
    }
    println!("Duration:        {:.2?}", report.duration);
}
