//! Pipeline stages: export → extract → import (→ tasks → checks).

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use icms_migration_core::check::ensure_passed;
use icms_migration_core::models::import_application::application_statuses;
use icms_migration_core::task::TASK_TABLE;
use icms_migration_core::{
    format_row, format_rfc3339, model, now_utc, registry, task_batch, CheckOutcome, CountCheck,
    DataType, ExportContext, FieldValue, FragmentParser, LegacySource, MigrationConfig,
    MigrationError, ModelKind, PkStrategy, QueryModel, Record, RecordExt, StagingRead,
};
use serde::Serialize;
use tracing::{info, warn};
use ulid::Ulid;

use crate::SqliteMigrationStore;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ExportFromV1,
    ExtractV1Xml,
    ImportV1Data,
    CreateTasks,
    Check,
    Reset,
}

impl Stage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExportFromV1 => "export_from_v1",
            Self::ExtractV1Xml => "extract_v1_xml",
            Self::ImportV1Data => "import_v1_data",
            Self::CreateTasks => "create_tasks",
            Self::Check => "check",
            Self::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StageReport {
    pub run_id: String,
    pub stage: Stage,
    pub data_types: Vec<DataType>,
    pub started_at: String,
    pub finished_at: String,
    /// Rows handled per query, parser or table.
    pub rows: BTreeMap<String, usize>,
    pub checks: Vec<CheckOutcome>,
}

impl StageReport {
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.values().sum()
    }
}

struct StageRun {
    run_id: Ulid,
    stage: Stage,
    data_types: Vec<DataType>,
    started_at: String,
    rows: BTreeMap<String, usize>,
    checks: Vec<CheckOutcome>,
}

impl StageRun {
    fn start(stage: Stage, data_types: &[DataType]) -> Result<Self> {
        info!(stage = stage.as_str(), ?data_types, "starting stage");
        Ok(Self {
            run_id: Ulid::new(),
            stage,
            data_types: data_types.to_vec(),
            started_at: format_rfc3339(now_utc())?,
            rows: BTreeMap::new(),
            checks: Vec::new(),
        })
    }

    fn add(&mut self, key: impl Into<String>, rows: usize) {
        *self.rows.entry(key.into()).or_default() += rows;
    }
}

/// Runs pipeline stages against a store, reading the legacy replica when a
/// stage needs it. Every stage checks the interlock before touching data.
pub struct Migrator<'a> {
    store: &'a mut SqliteMigrationStore,
    source: Option<&'a dyn LegacySource>,
    config: &'a MigrationConfig,
}

impl<'a> Migrator<'a> {
    pub fn new(store: &'a mut SqliteMigrationStore, config: &'a MigrationConfig) -> Self {
        Self {
            store,
            source: None,
            config,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: &'a dyn LegacySource) -> Self {
        self.source = Some(source);
        self
    }

    /// Stages every query model of `data_types`, replacing what was staged
    /// for those groups before.
    pub fn export_from_v1(&mut self, data_types: &[DataType]) -> Result<StageReport> {
        self.config.validate()?;
        let source = self.source()?;
        let mut run = StageRun::start(Stage::ExportFromV1, data_types)?;

        for data_type in data_types {
            self.store.clear_staged(registry::load_order(*data_type))?;
            for query_model in registry::query_models(*data_type) {
                let rows = self.export_query(source, query_model)?;
                info!(
                    query = query_model.query.name,
                    model = query_model.model.as_str(),
                    rows,
                    "exported legacy query"
                );
                run.add(query_model.query.name, rows);
            }
        }

        self.finish(run)
    }

    fn export_query(&mut self, source: &dyn LegacySource, query_model: &QueryModel) -> Result<usize> {
        let populate = model(query_model.model).models_to_populate();
        let includes: Vec<(ModelKind, Vec<&'static str>)> = populate
            .iter()
            .map(|kind| {
                let mut fields = vec!["id"];
                fields.extend(model(*kind).fields());
                (*kind, fields)
            })
            .collect();

        let mut next_pk = match query_model.pk {
            PkStrategy::Legacy => None,
            PkStrategy::Allocate => {
                let root = populate.first().copied().unwrap_or(query_model.model);
                Some(self.store.next_pk(root)?)
            }
        };

        let store = &mut *self.store;
        let fetched = source.fetch(query_model.query, self.config.batch_size, &mut |columns, rows| {
            let mut staged: Vec<Vec<Record>> = vec![Vec::with_capacity(rows.len()); includes.len()];
            for row in rows {
                let pk = next_pk.as_mut().map(|next| {
                    let pk = *next;
                    *next += 1;
                    pk
                });
                for ((_, fields), records) in includes.iter().zip(staged.iter_mut()) {
                    records.push(format_row(columns, row.clone(), Some(fields.as_slice()), pk));
                }
            }
            for ((kind, _), records) in includes.iter().zip(&staged) {
                store.insert_staged(*kind, records)?;
            }
            Ok(())
        })?;

        Ok(fetched)
    }

    /// Explodes staged XML payloads into child rows, parents before the
    /// fragments they produce.
    pub fn extract_v1_xml(&mut self, data_types: &[DataType]) -> Result<StageReport> {
        self.config.validate()?;
        let mut run = StageRun::start(Stage::ExtractV1Xml, data_types)?;

        for data_type in data_types {
            let parsers = registry::xml_parsers(*data_type);
            let children: BTreeSet<ModelKind> = parsers.iter().map(|parser| parser.model()).collect();
            self.store
                .clear_staged(&children.into_iter().collect::<Vec<_>>())?;

            for parser in parsers {
                let rows = self.extract_parser(parser)?;
                info!(
                    parent = parser.parent().as_str(),
                    field = parser.field(),
                    model = parser.model().as_str(),
                    rows,
                    "extracted xml fragments"
                );
                run.add(format!("{}.{}", parser.parent().as_str(), parser.field()), rows);
            }
        }

        self.finish(run)
    }

    fn extract_parser(&mut self, parser: &dyn FragmentParser) -> Result<usize> {
        let payloads: Vec<(i64, String)> = self
            .store
            .staged(parser.parent())?
            .into_iter()
            .filter_map(|record| {
                let id = record.int("id")?;
                let payload = record.text(parser.field())?.to_string();
                Some((id, payload))
            })
            .collect();

        let mut extracted = 0;
        for batch in payloads.chunks(self.config.batch_size.max(1)) {
            let mut children = parser.parse_xml(batch)?;
            let mut next_pk = self.store.next_pk(parser.model())?;
            for child in &mut children {
                child.insert("id".to_string(), FieldValue::Int(next_pk));
                next_pk += 1;
            }
            extracted += self.store.insert_staged(parser.model(), &children)?;
        }
        Ok(extracted)
    }

    /// Loads staged rows into the target tables, then bridges, then tasks
    /// (unless `create_tasks` is false), and finally runs the count checks.
    pub fn import_v1_data(&mut self, data_types: &[DataType], create_tasks: bool) -> Result<StageReport> {
        self.config.validate()?;
        let mut run = StageRun::start(Stage::ImportV1Data, data_types)?;

        for data_type in data_types {
            for kind in registry::load_order(*data_type) {
                let staging_model = model(*kind);
                let rows = {
                    let ctx = self.export_context();
                    staging_model
                        .source_data(&ctx)?
                        .into_iter()
                        .map(|row| staging_model.data_export(row))
                        .collect::<Result<Vec<_>, MigrationError>>()?
                };
                let table = staging_model.target_table();
                let loaded = self.store.bulk_create(table, &rows, self.config.batch_size)?;
                info!(model = kind.as_str(), table, rows = loaded, "loaded entity");
                run.add(table, loaded);
            }

            for bridge in registry::m2m(*data_type) {
                let source_model = model(bridge.source);
                let rows = {
                    let ctx = self.export_context();
                    source_model
                        .m2m_data(bridge, &ctx)?
                        .into_iter()
                        .map(|row| source_model.m2m_export(row))
                        .collect::<Result<Vec<_>, MigrationError>>()?
                };
                let loaded = self
                    .store
                    .bulk_create(bridge.table, &rows, self.config.batch_size)?;
                info!(table = bridge.table, rows = loaded, "loaded m2m bridge");
                run.add(bridge.table, loaded);
            }
        }

        if create_tasks && data_types.contains(&DataType::ImportApplication) {
            let loaded = self.load_tasks()?;
            run.add(TASK_TABLE, loaded);
        }

        run.checks = self.evaluate_checks(data_types)?;
        let report = self.finish(run)?;
        ensure_passed(&report.checks)?;
        Ok(report)
    }

    /// Seeds the active task of every migrated application still in flight.
    pub fn create_tasks(&mut self) -> Result<StageReport> {
        self.config.validate()?;
        let mut run = StageRun::start(Stage::CreateTasks, &[DataType::ImportApplication])?;
        let loaded = self.load_tasks()?;
        run.add(TASK_TABLE, loaded);
        self.finish(run)
    }

    fn load_tasks(&mut self) -> Result<usize> {
        let statuses = {
            let ctx = self.export_context();
            application_statuses(&ctx)?
        };
        let created = now_utc();
        let first_id = self.store.max_id(TASK_TABLE)? + 1;
        let tasks: Vec<Record> = task_batch(&statuses)
            .into_iter()
            .zip(first_id..)
            .map(|(seed, id)| seed.into_record(id, created))
            .collect();

        let loaded = self.store.bulk_create(TASK_TABLE, &tasks, self.config.batch_size)?;
        info!(rows = loaded, "created tasks");
        Ok(loaded)
    }

    /// Runs every count check of `data_types`, failing on any mismatch.
    pub fn run_checks(&mut self, data_types: &[DataType]) -> Result<StageReport> {
        self.config.validate()?;
        let mut run = StageRun::start(Stage::Check, data_types)?;
        run.checks = self.evaluate_checks(data_types)?;
        let report = self.finish(run)?;
        ensure_passed(&report.checks)?;
        Ok(report)
    }

    fn evaluate_checks(&self, data_types: &[DataType]) -> Result<Vec<CheckOutcome>> {
        let mut outcomes = Vec::new();
        for data_type in data_types {
            for check in registry::checks(*data_type) {
                let expected = match check {
                    CountCheck::Count(count) => count.expected_count,
                    CountCheck::Query(query) => {
                        self.source()?.count(query.name, query.query, query.binds)?
                    }
                };
                let actual = self.store.count(check.tables(), check.filter())?;
                let outcome = check.evaluate(expected, actual);
                if outcome.passed {
                    info!(check = check.name(), expected, actual, "count check passed");
                } else {
                    warn!(check = check.name(), expected, actual, "count check failed");
                }
                outcomes.push(outcome);
            }
        }
        Ok(outcomes)
    }

    /// Truncate-and-reload: empties staging and every target table.
    pub fn reset(&mut self) -> Result<StageReport> {
        self.config.validate()?;
        let mut run = StageRun::start(Stage::Reset, &DataType::ALL)?;
        let removed = self.store.reset()?;
        info!(rows = removed, "reset staging and target tables");
        run.add("removed", removed);
        self.finish(run)
    }

    fn export_context(&self) -> ExportContext<'_> {
        ExportContext {
            staging: &*self.store,
            email_domain_exclude: self.config.email_domain_exclude(),
        }
    }

    fn source(&self) -> Result<&'a dyn LegacySource> {
        self.source.ok_or_else(|| {
            MigrationError::Configuration(
                "this stage reads the legacy replica but no source is configured".to_string(),
            )
            .into()
        })
    }

    fn finish(&self, run: StageRun) -> Result<StageReport> {
        let report = StageReport {
            run_id: run.run_id.to_string(),
            stage: run.stage,
            data_types: run.data_types,
            started_at: run.started_at,
            finished_at: format_rfc3339(now_utc())?,
            rows: run.rows,
            checks: run.checks,
        };
        self.store.record_run(&report)?;
        info!(
            stage = report.stage.as_str(),
            run_id = %report.run_id,
            rows = report.row_count(),
            "finished stage"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::too_many_lines)]

    use std::path::Path;

    use super::*;
    use crate::fixture::seed_legacy_replica;
    use crate::SqliteLegacySource;
    use rusqlite::Connection;

    fn must<T>(result: Result<T>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("test failure: {err:#}"),
        }
    }

    fn fixture_store() -> SqliteMigrationStore {
        let store = must(SqliteMigrationStore::open(Path::new(":memory:")));
        must(store.migrate());
        store
    }

    fn fixture_source() -> SqliteLegacySource {
        let conn = match Connection::open_in_memory() {
            Ok(conn) => conn,
            Err(err) => panic!("test failure: {err}"),
        };
        must(seed_legacy_replica(&conn));
        SqliteLegacySource::from_connection(conn)
    }

    fn enabled_config() -> MigrationConfig {
        MigrationConfig {
            allow_data_migration: true,
            batch_size: 2,
            ..MigrationConfig::default()
        }
    }

    fn scalar(store: &SqliteMigrationStore, sql: &str) -> i64 {
        match store.connection().query_row(sql, [], |row| row.get(0)) {
            Ok(value) => value,
            Err(err) => panic!("test failure: {sql}: {err}"),
        }
    }

    fn text(store: &SqliteMigrationStore, sql: &str) -> Option<String> {
        match store.connection().query_row(sql, [], |row| row.get(0)) {
            Ok(value) => value,
            Err(err) => panic!("test failure: {sql}: {err}"),
        }
    }

    #[test]
    fn every_stage_refuses_without_the_interlock() {
        let mut store = fixture_store();
        let source = fixture_source();
        let config = MigrationConfig::default();
        let mut migrator = Migrator::new(&mut store, &config).with_source(&source);

        let failures = [
            migrator.export_from_v1(&DataType::ALL).err(),
            migrator.extract_v1_xml(&DataType::ALL).err(),
            migrator.import_v1_data(&DataType::ALL, true).err(),
            migrator.create_tasks().err(),
            migrator.run_checks(&DataType::ALL).err(),
            migrator.reset().err(),
        ];
        for failure in failures {
            let err = match failure {
                Some(err) => err,
                None => panic!("stage ran with the interlock off"),
            };
            assert!(matches!(
                err.downcast_ref::<MigrationError>(),
                Some(MigrationError::Configuration(message)) if message.contains("ALLOW_DATA_MIGRATION")
            ));
        }
        assert!(must(store.list_runs()).is_empty());
    }

    #[test]
    fn export_requires_a_legacy_source() {
        let mut store = fixture_store();
        let config = enabled_config();
        let mut migrator = Migrator::new(&mut store, &config);
        assert!(migrator.export_from_v1(&[DataType::Reference]).is_err());
    }

    #[test]
    fn export_stages_legacy_ids_and_allocates_shared_application_keys() {
        let mut store = fixture_store();
        let source = fixture_source();
        let config = enabled_config();

        let report = {
            let mut migrator = Migrator::new(&mut store, &config).with_source(&source);
            must(migrator.export_from_v1(&DataType::ALL))
        };
        assert_eq!(report.rows.get("country"), Some(&3));
        assert_eq!(report.rows.get("fa_oil"), Some(&2));
        assert_eq!(report.rows.get("fa_dfl"), Some(&1));
        assert_eq!(report.rows.get("sanctions"), Some(&1));

        let processes = must(store.staged(ModelKind::Process).map_err(anyhow::Error::from));
        let ids: Vec<i64> = processes.iter().filter_map(|record| record.int("id")).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);

        for kind in [ModelKind::ImportApplication, ModelKind::OilSupplementaryInfo] {
            let staged = must(store.staged(kind).map_err(anyhow::Error::from));
            assert!(staged
                .iter()
                .all(|record| record.int("id").is_some_and(|id| ids.contains(&id))));
        }

        let offices = must(store.staged(ModelKind::Office).map_err(anyhow::Error::from));
        assert_eq!(
            offices.first().and_then(|office| office.text("legacy_id")),
            Some("i-1-1")
        );
        assert!(offices.iter().all(|office| !office.contains_key("office_group")));

        // Re-running replaces rather than duplicates.
        let mut migrator = Migrator::new(&mut store, &config).with_source(&source);
        must(migrator.export_from_v1(&[DataType::Reference]));
        assert_eq!(must(store.staged_count(ModelKind::Country)), 3);
    }

    #[test]
    fn extract_explodes_fragments_into_children() {
        let mut store = fixture_store();
        let source = fixture_source();
        let config = enabled_config();
        let report = {
            let mut migrator = Migrator::new(&mut store, &config).with_source(&source);
            must(migrator.export_from_v1(&DataType::ALL));
            must(migrator.extract_v1_xml(&DataType::ALL))
        };

        assert_eq!(report.rows.get("User.personal_email_xml"), Some(&3));
        assert_eq!(must(store.staged_count(ModelKind::Email)), 3);
        assert_eq!(must(store.staged_count(ModelKind::PhoneNumber)), 1);
        assert_eq!(must(store.staged_count(ModelKind::ImportContact)), 2);
        assert_eq!(must(store.staged_count(ModelKind::UserImportCertificate)), 2);
        assert_eq!(must(store.staged_count(ModelKind::VariationRequest)), 1);
        assert_eq!(must(store.staged_count(ModelKind::OilSupplementaryReport)), 1);
        assert_eq!(must(store.staged_count(ModelKind::OilSupplementaryReportFirearm)), 2);

        let contacts = must(store.staged(ModelKind::ImportContact).map_err(anyhow::Error::from));
        let ids: Vec<i64> = contacts.iter().filter_map(|record| record.int("id")).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn full_pipeline_loads_targets_bridges_tasks_and_passes_checks() {
        let mut store = fixture_store();
        let source = fixture_source();
        let config = enabled_config();
        let report = {
            let mut migrator = Migrator::new(&mut store, &config).with_source(&source);
            must(migrator.export_from_v1(&DataType::ALL));
            must(migrator.extract_v1_xml(&DataType::ALL));
            must(migrator.import_v1_data(&DataType::ALL, true))
        };

        assert!(report.checks.iter().all(|check| check.passed));
        assert_eq!(report.rows.get("web_task"), Some(&2));

        // System user and the login without an email are not migrated.
        assert_eq!(scalar(&store, "SELECT COUNT(*) FROM web_user"), 2);
        assert_eq!(scalar(&store, "SELECT COUNT(*) FROM web_email"), 3);
        assert_eq!(
            text(&store, "SELECT password FROM web_user WHERE id = 2"),
            Some("fox_pbkdf2_sha1$10000$2:salty$hash".to_string())
        );
        assert_eq!(scalar(&store, "SELECT COUNT(*) FROM web_importer WHERE user_id IS NULL"), 1);

        assert_eq!(scalar(&store, "SELECT COUNT(*) FROM web_importer_offices"), 2);
        assert_eq!(scalar(&store, "SELECT COUNT(*) FROM web_exporter_offices"), 1);
        assert_eq!(
            text(&store, "SELECT postcode FROM web_office WHERE legacy_id = 'e-1-1'"),
            None
        );
        assert_eq!(
            text(&store, "SELECT address_2 FROM web_office WHERE legacy_id = 'e-1-1'"),
            Some("EXPORTERS HOUSE LONG POSTCODE".to_string())
        );

        assert_eq!(
            text(&store, "SELECT template_content FROM web_template WHERE id = 1"),
            Some("<p>Dear [[IMPORTER_NAME]]</p>".to_string())
        );

        assert_eq!(scalar(&store, "SELECT COUNT(*) FROM web_process"), 4);
        assert_eq!(
            scalar(
                &store,
                "SELECT importer_office_id FROM web_importapplication WHERE reference = 'IMA/2022/00001'"
            ),
            1
        );
        // The certificate on the unsubmitted draft stays behind.
        assert_eq!(scalar(&store, "SELECT COUNT(*) FROM web_userimportcertificate"), 1);
        assert_eq!(
            scalar(
                &store,
                "SELECT COUNT(*) FROM web_openindividuallicenceapplication_user_imported_certificates"
            ),
            1
        );
        assert_eq!(
            scalar(&store, "SELECT COUNT(*) FROM web_importapplication_variation_requests"),
            1
        );
        assert_eq!(
            scalar(&store, "SELECT bought_from_id FROM web_oilsupplementaryreport"),
            1
        );
        assert_eq!(scalar(&store, "SELECT COUNT(*) FROM web_oilsupplementaryreportfirearm"), 2);

        assert_eq!(
            scalar(&store, "SELECT COUNT(*) FROM web_task WHERE task_type = 'process'"),
            1
        );
        assert_eq!(
            scalar(&store, "SELECT COUNT(*) FROM web_task WHERE task_type = 'prepare'"),
            1
        );

        let stages: Vec<String> = must(store.list_runs())
            .into_iter()
            .map(|run| run.stage)
            .collect();
        assert_eq!(stages, vec!["import_v1_data", "extract_v1_xml", "export_from_v1"]);
    }

    #[test]
    fn importing_twice_fails_on_duplicate_keys_until_reset() {
        let mut store = fixture_store();
        let source = fixture_source();
        let config = enabled_config();
        let mut migrator = Migrator::new(&mut store, &config).with_source(&source);
        must(migrator.export_from_v1(&[DataType::Reference]));
        must(migrator.import_v1_data(&[DataType::Reference], false));

        let err = match migrator.import_v1_data(&[DataType::Reference], false) {
            Ok(_) => panic!("second import should collide"),
            Err(err) => err,
        };
        assert!(matches!(
            err.downcast_ref::<MigrationError>(),
            Some(MigrationError::DuplicatePrimaryKey { .. })
        ));

        must(migrator.reset());
        must(migrator.export_from_v1(&[DataType::Reference]));
        must(migrator.import_v1_data(&[DataType::Reference], false));
    }

    #[test]
    fn checks_report_every_mismatch() {
        let mut store = fixture_store();
        let source = fixture_source();
        let config = enabled_config();
        let mut migrator = Migrator::new(&mut store, &config).with_source(&source);

        let err = match migrator.run_checks(&[DataType::Reference]) {
            Ok(_) => panic!("empty targets must fail the checks"),
            Err(err) => err,
        };
        match err.downcast_ref::<MigrationError>() {
            Some(MigrationError::CountMismatch(failures)) => {
                assert_eq!(failures.len(), 3);
                assert!(failures[0].starts_with("Country found 0 expected 3"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
