use std::collections::BTreeSet;

use crate::format::split_address;
use crate::models::{base, ExportContext, M2mBridge, ModelKind, StagingModel};
use crate::value::{FieldValue, Record, RecordExt};
use crate::MigrationError;

const SYSTEM_USER_ID: i64 = 0;
const POSTCODE_MAX_LEN: usize = 8;

pub struct User;

impl User {
    /// Whether a staged user is carried into V2: the system user, accounts
    /// without an email login and the excluded email domain stay behind.
    #[must_use]
    pub fn is_migrated(record: &Record, email_domain_exclude: Option<&str>) -> bool {
        if !matches!(record.int("id"), Some(id) if id != SYSTEM_USER_ID) {
            return false;
        }
        let Some(username) = record.text("username") else {
            return false;
        };
        username.contains('@') && !Self::has_excluded_domain(record, email_domain_exclude)
    }

    /// Whether the login ends with the excluded email domain, ignoring case.
    #[must_use]
    pub fn has_excluded_domain(record: &Record, email_domain_exclude: Option<&str>) -> bool {
        let Some(domain) = email_domain_exclude.map(str::trim).filter(|domain| !domain.is_empty())
        else {
            return false;
        };
        record.text("username").is_some_and(|username| {
            username
                .to_ascii_lowercase()
                .ends_with(&domain.to_ascii_lowercase())
        })
    }

    /// Ids of every staged user that [`User::is_migrated`] accepts.
    ///
    /// # Errors
    /// Returns an error when staged users cannot be read.
    pub fn migrated_ids(ctx: &ExportContext<'_>) -> Result<BTreeSet<i64>, MigrationError> {
        Ok(ctx
            .staging
            .staged(ModelKind::User)?
            .iter()
            .filter(|record| Self::is_migrated(record, ctx.email_domain_exclude))
            .filter_map(|record| record.int("id"))
            .collect())
    }

    /// Ids of staged users left behind because of their email domain.
    ///
    /// # Errors
    /// Returns an error when staged users cannot be read.
    pub fn excluded_domain_ids(ctx: &ExportContext<'_>) -> Result<BTreeSet<i64>, MigrationError> {
        if ctx.email_domain_exclude.is_none() {
            return Ok(BTreeSet::new());
        }
        Ok(ctx
            .staging
            .staged(ModelKind::User)?
            .iter()
            .filter(|record| Self::has_excluded_domain(record, ctx.email_domain_exclude))
            .filter_map(|record| record.int("id"))
            .collect())
    }

    fn legacy_password(record: &Record) -> FieldValue {
        match (record.int("id"), record.text("salt"), record.text("encrypted_password")) {
            (Some(id), Some(salt), Some(encrypted)) => {
                FieldValue::Text(format!("fox_pbkdf2_sha1$10000${id}:{salt}${encrypted}"))
            }
            _ => FieldValue::Null,
        }
    }
}

impl StagingModel for User {
    fn kind(&self) -> ModelKind {
        ModelKind::User
    }

    fn target_table(&self) -> &'static str {
        "web_user"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            "username",
            "first_name",
            "last_name",
            "is_active",
            "salt",
            "encrypted_password",
            "last_login_datetime",
            "date_joined_datetime",
            "title",
            "organisation",
            "department",
            "job_title",
            "date_of_birth",
            "personal_email_xml",
            "telephone_xml",
        ]
    }

    fn excludes(&self) -> Vec<&'static str> {
        let mut excludes = base::excludes(self.fields());
        excludes.extend([
            "salt",
            "encrypted_password",
            "last_login_datetime",
            "date_joined_datetime",
        ]);
        excludes
    }

    fn includes(&self) -> Vec<&'static str> {
        vec!["email", "password", "date_joined", "last_login", "icms_v1_user"]
    }

    fn source_data(&self, ctx: &ExportContext<'_>) -> Result<Vec<Record>, MigrationError> {
        let values = self.values();
        Ok(ctx
            .staging
            .staged(self.kind())?
            .into_iter()
            .filter(|record| Self::is_migrated(record, ctx.email_domain_exclude))
            .map(|mut record| {
                let password = Self::legacy_password(&record);
                let email = record.value("username").clone();
                let date_joined = record.take("date_joined_datetime");
                let last_login = record.take("last_login_datetime");
                record.insert("password".to_string(), password);
                record.insert("email".to_string(), email);
                record.insert("date_joined".to_string(), date_joined);
                record.insert("last_login".to_string(), last_login);
                record.insert("icms_v1_user".to_string(), FieldValue::Bool(true));
                base::project(record, &values)
            })
            .collect())
    }

    fn data_export(&self, mut data: Record) -> Result<Record, MigrationError> {
        data.insert("show_welcome_message".to_string(), FieldValue::Bool(false));
        Ok(data)
    }
}

/// Staged rows of `model` that belong to a migrated user.
fn owned_by_migrated_user<M: StagingModel + ?Sized>(
    model: &M,
    ctx: &ExportContext<'_>,
) -> Result<Vec<Record>, MigrationError> {
    let users = User::migrated_ids(ctx)?;
    Ok(base::source_data(model, ctx)?
        .into_iter()
        .filter(|record| record.int("user_id").is_some_and(|id| users.contains(&id)))
        .collect())
}

pub struct Email;

impl StagingModel for Email {
    fn kind(&self) -> ModelKind {
        ModelKind::Email
    }

    fn target_table(&self) -> &'static str {
        "web_email"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["user_id", "email", "type", "is_primary", "portal_notifications", "comment"]
    }

    fn source_data(&self, ctx: &ExportContext<'_>) -> Result<Vec<Record>, MigrationError> {
        owned_by_migrated_user(self, ctx)
    }
}

pub struct PhoneNumber;

impl StagingModel for PhoneNumber {
    fn kind(&self) -> ModelKind {
        ModelKind::PhoneNumber
    }

    fn target_table(&self) -> &'static str {
        "web_phonenumber"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["user_id", "phone", "type", "comment"]
    }

    fn source_data(&self, ctx: &ExportContext<'_>) -> Result<Vec<Record>, MigrationError> {
        owned_by_migrated_user(self, ctx)
    }
}

pub struct Importer;

impl Importer {
    /// Ids of staged importers owned by a user of the excluded email domain.
    ///
    /// # Errors
    /// Returns an error when staged rows cannot be read.
    pub fn excluded_ids(ctx: &ExportContext<'_>) -> Result<BTreeSet<i64>, MigrationError> {
        let users = User::excluded_domain_ids(ctx)?;
        if users.is_empty() {
            return Ok(BTreeSet::new());
        }
        Ok(ctx
            .staging
            .staged(ModelKind::Importer)?
            .iter()
            .filter(|record| record.int("user_id").is_some_and(|id| users.contains(&id)))
            .filter_map(|record| record.int("id"))
            .collect())
    }
}

impl StagingModel for Importer {
    fn kind(&self) -> ModelKind {
        ModelKind::Importer
    }

    fn target_table(&self) -> &'static str {
        "web_importer"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            "is_active",
            "type",
            "name",
            "registered_number",
            "eori_number",
            "region_origin",
            "user_id",
            "comments",
            "main_importer_id",
        ]
    }

    /// Importers of excluded-domain users are dropped. Any other importer
    /// whose person was not migrated only loses the link.
    fn source_data(&self, ctx: &ExportContext<'_>) -> Result<Vec<Record>, MigrationError> {
        let users = User::migrated_ids(ctx)?;
        let excluded = User::excluded_domain_ids(ctx)?;
        let mut records = base::source_data(self, ctx)?;
        records.retain(|record| !record.int("user_id").is_some_and(|id| excluded.contains(&id)));
        for record in &mut records {
            if record.int("user_id").is_some_and(|id| !users.contains(&id)) {
                record.insert("user_id".to_string(), FieldValue::Null);
            }
        }
        Ok(records)
    }

    fn data_export(&self, mut data: Record) -> Result<Record, MigrationError> {
        if data.value("name").is_null() {
            data.insert("name".to_string(), FieldValue::text(""));
        }
        Ok(data)
    }
}

pub struct Exporter;

impl StagingModel for Exporter {
    fn kind(&self) -> ModelKind {
        ModelKind::Exporter
    }

    fn target_table(&self) -> &'static str {
        "web_exporter"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            "is_active",
            "name",
            "registered_number",
            "comments",
            "main_exporter_id",
            "exclusive_correspondence",
        ]
    }
}

pub struct Office;

/// Drops office rows whose `importer_id` belongs to an excluded importer.
fn without_excluded_importers(
    records: Vec<Record>,
    ctx: &ExportContext<'_>,
) -> Result<Vec<Record>, MigrationError> {
    let importers = Importer::excluded_ids(ctx)?;
    Ok(records
        .into_iter()
        .filter(|record| !record.int("importer_id").is_some_and(|id| importers.contains(&id)))
        .collect())
}

impl StagingModel for Office {
    fn kind(&self) -> ModelKind {
        ModelKind::Office
    }

    fn target_table(&self) -> &'static str {
        "web_office"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            "importer_id",
            "exporter_id",
            "legacy_id",
            "is_active",
            "postcode",
            "address",
            "eori_number",
            "address_entry_type",
        ]
    }

    fn source_data(&self, ctx: &ExportContext<'_>) -> Result<Vec<Record>, MigrationError> {
        without_excluded_importers(base::source_data(self, ctx)?, ctx)
    }

    fn m2m_data(
        &self,
        bridge: &M2mBridge,
        ctx: &ExportContext<'_>,
    ) -> Result<Vec<Record>, MigrationError> {
        let offices = without_excluded_importers(ctx.staging.staged(self.kind())?, ctx)?;
        Ok(base::m2m_data(bridge, offices))
    }

    /// Importer postcodes keep their last eight characters. Longer exporter
    /// postcodes are free text and move to the end of the address.
    fn data_export(&self, mut data: Record) -> Result<Record, MigrationError> {
        let is_importer_office = !data.take("importer_id").is_null();
        data.remove("exporter_id");

        let mut address = data.take("address").as_str().map(ToString::to_string);
        let postcode = data.take("postcode");
        let postcode = match postcode.as_str().map(str::trim) {
            Some(raw) if raw.chars().count() > POSTCODE_MAX_LEN => {
                if is_importer_office {
                    let skip = raw.chars().count() - POSTCODE_MAX_LEN;
                    FieldValue::Text(raw.chars().skip(skip).collect())
                } else {
                    address = Some(match address {
                        Some(existing) => format!("{existing}\n{raw}"),
                        None => raw.to_string(),
                    });
                    FieldValue::Null
                }
            }
            Some(raw) if !raw.is_empty() => FieldValue::text(raw),
            _ => FieldValue::Null,
        };
        data.insert("postcode".to_string(), postcode);

        for (index, line) in split_address(address.as_deref()).into_iter().enumerate() {
            data.insert(format!("address_{}", index + 1), line.into());
        }

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InMemoryStaging;

    fn must_ok<T, E: std::fmt::Display>(result: Result<T, E>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("expected Ok(..), got error: {err}"),
        }
    }

    fn user(id: i64, username: &str) -> Record {
        let mut record = Record::new();
        record.insert("id".to_string(), FieldValue::Int(id));
        record.insert("username".to_string(), FieldValue::text(username));
        record.insert("salt".to_string(), FieldValue::text("NaCl"));
        record.insert("encrypted_password".to_string(), FieldValue::text("HASH"));
        record.insert("personal_email_xml".to_string(), FieldValue::text("<PERSONAL_EMAIL_LIST/>"));
        record
    }

    fn staging_with_users() -> InMemoryStaging {
        let mut staging = InMemoryStaging::new();
        staging.extend(
            ModelKind::User,
            [
                user(0, "system@example.com"),
                user(2, "test_user@example.com"),
                user(3, "no-login"),
                user(4, "someone@excluded.example"),
            ],
        );
        staging
    }

    #[test]
    fn user_export_filters_and_derives_credentials() {
        let staging = staging_with_users();
        let ctx = ExportContext {
            staging: &staging,
            email_domain_exclude: Some("@EXCLUDED.example"),
        };
        let rows = must_ok(User.source_data(&ctx));
        assert_eq!(rows.len(), 1);

        let row = must_ok(User.data_export(rows[0].clone()));
        assert_eq!(row.int("id"), Some(2));
        assert_eq!(row.text("email"), Some("test_user@example.com"));
        assert_eq!(
            row.text("password"),
            Some("fox_pbkdf2_sha1$10000$2:NaCl$HASH")
        );
        assert_eq!(row.value("icms_v1_user"), &FieldValue::Bool(true));
        assert_eq!(row.value("show_welcome_message"), &FieldValue::Bool(false));
        assert!(!row.contains_key("salt"));
        assert!(!row.contains_key("personal_email_xml"));
    }

    #[test]
    fn emails_of_unmigrated_users_are_dropped() {
        let mut staging = staging_with_users();
        for (id, user_id) in [(1, 2), (2, 3)] {
            let mut email = Record::new();
            email.insert("id".to_string(), FieldValue::Int(id));
            email.insert("user_id".to_string(), FieldValue::Int(user_id));
            email.insert("email".to_string(), FieldValue::text("a@example.com"));
            staging.insert(ModelKind::Email, email);
        }
        let ctx = ExportContext {
            staging: &staging,
            email_domain_exclude: None,
        };
        let rows = must_ok(Email.source_data(&ctx));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].int("user_id"), Some(2));
    }

    #[test]
    fn importer_links_to_unmigrated_users_are_cleared() {
        let mut staging = staging_with_users();
        let mut importer = Record::new();
        importer.insert("id".to_string(), FieldValue::Int(1));
        importer.insert("user_id".to_string(), FieldValue::Int(3));
        staging.insert(ModelKind::Importer, importer);
        let ctx = ExportContext {
            staging: &staging,
            email_domain_exclude: None,
        };

        let rows = must_ok(Importer.source_data(&ctx));
        assert!(rows[0].value("user_id").is_null());
        let exported = must_ok(Importer.data_export(rows[0].clone()));
        assert_eq!(exported.text("name"), Some(""));
    }

    fn importer(id: i64, user_id: i64) -> Record {
        let mut record = Record::new();
        record.insert("id".to_string(), FieldValue::Int(id));
        record.insert("user_id".to_string(), FieldValue::Int(user_id));
        record
    }

    fn staged_office(id: i64, importer_id: Option<i64>, exporter_id: Option<i64>) -> Record {
        let mut record = Record::new();
        record.insert("id".to_string(), FieldValue::Int(id));
        record.insert("importer_id".to_string(), importer_id.into());
        record.insert("exporter_id".to_string(), exporter_id.into());
        record.insert("legacy_id".to_string(), FieldValue::Text(format!("{id}-1")));
        record
    }

    #[test]
    fn excluded_domain_importers_take_their_offices_and_links_with_them() {
        let mut staging = staging_with_users();
        staging.extend(ModelKind::Importer, [importer(1, 4), importer(2, 3), importer(3, 2)]);
        staging.extend(
            ModelKind::Office,
            [
                staged_office(10, Some(1), None),
                staged_office(11, Some(2), None),
                staged_office(12, None, Some(7)),
                staged_office(13, Some(3), None),
            ],
        );
        let ctx = ExportContext {
            staging: &staging,
            email_domain_exclude: Some("@EXCLUDED.example"),
        };

        let importers = must_ok(Importer.source_data(&ctx));
        let ids: Vec<_> = importers.iter().filter_map(|row| row.int("id")).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(importers[0].value("user_id").is_null());
        assert_eq!(importers[1].int("user_id"), Some(2));

        let offices = must_ok(Office.source_data(&ctx));
        let ids: Vec<_> = offices.iter().filter_map(|row| row.int("id")).collect();
        assert_eq!(ids, vec![11, 12, 13]);

        let importer_bridge = M2mBridge {
            source: ModelKind::Office,
            target: ModelKind::Importer,
            table: "web_importer_offices",
            link_field: "importer_id",
        };
        let links = must_ok(Office.m2m_data(&importer_bridge, &ctx));
        let linked: Vec<_> = links
            .iter()
            .map(|row| (row.int("office_id"), row.int("importer_id"), row.int("row_number")))
            .collect();
        assert_eq!(
            linked,
            vec![(Some(11), Some(2), Some(1)), (Some(13), Some(3), Some(2))]
        );

        let exporter_bridge = M2mBridge {
            target: ModelKind::Exporter,
            table: "web_exporter_offices",
            link_field: "exporter_id",
            ..importer_bridge
        };
        let links = must_ok(Office.m2m_data(&exporter_bridge, &ctx));
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].int("exporter_id"), Some(7));
    }

    #[test]
    fn without_a_domain_exclusion_every_office_is_kept() {
        let mut staging = staging_with_users();
        staging.insert(ModelKind::Importer, importer(1, 4));
        staging.insert(ModelKind::Office, staged_office(10, Some(1), None));
        let ctx = ExportContext {
            staging: &staging,
            email_domain_exclude: None,
        };

        assert_eq!(must_ok(Importer.source_data(&ctx)).len(), 1);
        assert_eq!(must_ok(Office.source_data(&ctx)).len(), 1);
        assert_eq!(
            must_ok(Office.m2m_data(
                &M2mBridge {
                    source: ModelKind::Office,
                    target: ModelKind::Importer,
                    table: "web_importer_offices",
                    link_field: "importer_id",
                },
                &ctx
            ))
            .len(),
            1
        );
    }

    fn office(importer: Option<i64>, postcode: &str, address: &str) -> Record {
        let mut record = Record::new();
        record.insert("id".to_string(), FieldValue::Int(1));
        record.insert("importer_id".to_string(), importer.into());
        record.insert(
            "exporter_id".to_string(),
            if importer.is_some() { FieldValue::Null } else { FieldValue::Int(5) },
        );
        record.insert("postcode".to_string(), FieldValue::text(postcode));
        record.insert("address".to_string(), FieldValue::text(address));
        record
    }

    #[test]
    fn importer_office_postcode_keeps_last_eight_characters() {
        let exported = must_ok(Office.data_export(office(Some(1), "GB SW1A 1AA", "1 Street\nTown")));
        assert_eq!(exported.text("postcode"), Some("SW1A 1AA"));
        assert_eq!(exported.text("address_1"), Some("1 Street"));
        assert_eq!(exported.text("address_2"), Some("Town"));
        assert!(exported.value("address_3").is_null());
        assert!(!exported.contains_key("importer_id"));
        assert!(!exported.contains_key("address"));
    }

    #[test]
    fn long_exporter_postcode_moves_into_address() {
        let exported = must_ok(Office.data_export(office(None, "Not a real postcode", "1 Street")));
        assert!(exported.value("postcode").is_null());
        assert_eq!(exported.text("address_1"), Some("1 Street"));
        assert_eq!(exported.text("address_2"), Some("Not a real postcode"));
        assert!(!exported.contains_key("exporter_id"));
    }
}
