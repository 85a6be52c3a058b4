//! Scripted synchronization scenarios.
//!
//! A scenario wires a test catalog, a scripted directory and a recording
//! gateway into one job, so tests can state the catalog and directory
//! contents and assert on the outcome.

use crate::fixtures::{
    group_record, person_record, raw_group_record, TestCatalog, GROUPS_BASE, PEOPLE_BASE,
};
use dirsync_engine::{
    CatalogGateway, DirectoryConfig, MockDirectory, RecordingGateway, RunReport, SearchSpec,
    SyncJob, SyncJobConfig,
};
use std::sync::Arc;

/// The job type scenarios run.
pub type ScenarioJob = SyncJob<MockDirectory, RecordingGateway<CatalogGateway>>;

/// A catalog, a scripted directory and a job over both.
pub struct SyncScenario {
    catalog: TestCatalog,
    directory: MockDirectory,
    job: ScenarioJob,
    config: SyncJobConfig,
}

impl SyncScenario {
    /// Creates a scenario over an in-memory catalog. The directory starts
    /// with an empty people subtree and group sync disabled.
    pub fn new() -> Self {
        Self::with_catalog(TestCatalog::memory())
    }

    /// Creates a scenario over a file-backed catalog.
    pub fn file() -> Self {
        Self::with_catalog(TestCatalog::file())
    }

    fn with_catalog(catalog: TestCatalog) -> Self {
        let directory = MockDirectory::new();
        directory.set_records(PEOPLE_BASE, Vec::new());
        let gateway = RecordingGateway::new(CatalogGateway::new(Arc::clone(&catalog.store)));
        let job = SyncJob::new(directory.clone(), gateway);
        let config = SyncJobConfig::new(
            DirectoryConfig::new("ldap://ldap.example.org"),
            SearchSpec::new(PEOPLE_BASE, "(objectClass=person)", "uid"),
        );
        Self {
            catalog,
            directory,
            job,
            config,
        }
    }

    /// Seeds directory-sourced catalog users.
    pub fn with_catalog_users(self, names: &[&str]) -> Self {
        self.catalog.seed_directory_users(names);
        self
    }

    /// Seeds local catalog users.
    pub fn with_local_users(self, names: &[&str]) -> Self {
        self.catalog.seed_local_users(names);
        self
    }

    /// Seeds catalog groups.
    pub fn with_catalog_groups(self, names: &[&str]) -> Self {
        self.catalog.seed_groups(names);
        self
    }

    /// Scripts the directory's users.
    pub fn with_directory_users(self, names: &[&str]) -> Self {
        self.directory
            .set_records(PEOPLE_BASE, names.iter().map(|n| person_record(n)).collect());
        self
    }

    /// Scripts the directory's groups by `cn` and enables group sync.
    pub fn with_directory_groups(mut self, names: &[&str]) -> Self {
        self.directory
            .set_records(GROUPS_BASE, names.iter().map(|n| group_record(n)).collect());
        self.enable_group_sync("cn");
        self
    }

    /// Scripts the directory's groups by raw name and enables group sync.
    pub fn with_raw_directory_groups(mut self, raw_names: &[&str]) -> Self {
        self.directory.set_records(
            GROUPS_BASE,
            raw_names.iter().map(|n| raw_group_record(n)).collect(),
        );
        self.enable_group_sync("description");
        self
    }

    /// Sets the group-name pattern.
    pub fn with_group_pattern(mut self, pattern: &str) -> Self {
        self.config.group_name_pattern = Some(pattern.to_string());
        self
    }

    /// Makes the user search fail.
    pub fn with_user_search_failure(self, message: &str) -> Self {
        self.directory.set_search_failure(PEOPLE_BASE, message);
        self
    }

    /// Makes the group search fail and enables group sync.
    pub fn with_group_search_failure(mut self, message: &str) -> Self {
        self.directory.set_search_failure(GROUPS_BASE, message);
        self.enable_group_sync("cn");
        self
    }

    /// Adjusts the job configuration.
    pub fn with_config<F: FnOnce(&mut SyncJobConfig)>(mut self, f: F) -> Self {
        f(&mut self.config);
        self
    }

    fn enable_group_sync(&mut self, attribute: &str) {
        self.config.create_missing_groups = true;
        self.config.groups = Some(SearchSpec::new(
            GROUPS_BASE,
            "(objectClass=groupOfNames)",
            attribute,
        ));
    }

    /// Runs the job once.
    pub fn run(&self) -> RunReport {
        self.job.run(&self.config)
    }

    /// Returns the catalog.
    pub fn catalog(&self) -> &TestCatalog {
        &self.catalog
    }

    /// Returns the scripted directory.
    pub fn directory(&self) -> &MockDirectory {
        &self.directory
    }

    /// Returns the job.
    pub fn job(&self) -> &ScenarioJob {
        &self.job
    }

    /// Returns the recording gateway.
    pub fn gateway(&self) -> &RecordingGateway<CatalogGateway> {
        self.job.gateway()
    }

    /// Returns the job configuration.
    pub fn config(&self) -> &SyncJobConfig {
        &self.config
    }
}

impl Default for SyncScenario {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirsync_catalog::AuthKind;

    #[test]
    fn default_scenario_removes_all_directory_users() {
        let scenario = SyncScenario::new()
            .with_catalog_users(&["alice"])
            .with_local_users(&["admin"]);
        let report = scenario.run();
        assert!(report.is_success());
        assert!(scenario.catalog().usernames(AuthKind::Ldap).is_empty());
        assert_eq!(scenario.catalog().usernames(AuthKind::Local), vec!["admin"]);
    }

    #[test]
    fn group_sync_enabled_by_directory_groups() {
        let scenario = SyncScenario::new().with_directory_groups(&["Editors"]);
        assert!(scenario.config().create_missing_groups);
        let report = scenario.run();
        assert_eq!(report.created_groups(), &["Editors".to_string()]);
    }
}
