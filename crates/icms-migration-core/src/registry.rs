//! Per data type catalogues, each in dependency order: query models, XML
//! parsers, load order and M2M bridges, plus the checks run after loading.

use crate::check::{CheckCount, CheckQuery, CountCheck};
use crate::models::{M2mBridge, ModelKind};
use crate::queries::{import_application as ia, reference, user};
use crate::query::{PkStrategy, QueryModel};
use crate::xml_parser::{self, FragmentParser};
use crate::DataType;

const REFERENCE_QUERIES: &[QueryModel] = &[
    QueryModel {
        query: &reference::COUNTRY,
        model: ModelKind::Country,
        pk: PkStrategy::Legacy,
    },
    QueryModel {
        query: &reference::CONSTABULARY,
        model: ModelKind::Constabulary,
        pk: PkStrategy::Legacy,
    },
    QueryModel {
        query: &reference::TEMPLATE,
        model: ModelKind::Template,
        pk: PkStrategy::Legacy,
    },
];

const USER_QUERIES: &[QueryModel] = &[
    QueryModel {
        query: &user::USERS,
        model: ModelKind::User,
        pk: PkStrategy::Legacy,
    },
    QueryModel {
        query: &user::IMPORTERS,
        model: ModelKind::Importer,
        pk: PkStrategy::Legacy,
    },
    QueryModel {
        query: &user::EXPORTERS,
        model: ModelKind::Exporter,
        pk: PkStrategy::Legacy,
    },
    QueryModel {
        query: &user::OFFICES,
        model: ModelKind::Office,
        pk: PkStrategy::Allocate,
    },
];

const IMPORT_APPLICATION_QUERIES: &[QueryModel] = &[
    QueryModel {
        query: &ia::OIL,
        model: ModelKind::OilApplication,
        pk: PkStrategy::Allocate,
    },
    QueryModel {
        query: &ia::DFL,
        model: ModelKind::DflApplication,
        pk: PkStrategy::Allocate,
    },
    QueryModel {
        query: &ia::SANCTIONS,
        model: ModelKind::SanctionsApplication,
        pk: PkStrategy::Allocate,
    },
];

const REFERENCE_LOAD: &[ModelKind] = &[ModelKind::Country, ModelKind::Constabulary, ModelKind::Template];

const USER_LOAD: &[ModelKind] = &[
    ModelKind::User,
    ModelKind::Email,
    ModelKind::PhoneNumber,
    ModelKind::Importer,
    ModelKind::Exporter,
    ModelKind::Office,
];

const IMPORT_APPLICATION_LOAD: &[ModelKind] = &[
    ModelKind::Process,
    ModelKind::ImportApplication,
    ModelKind::OilApplication,
    ModelKind::DflApplication,
    ModelKind::SanctionsApplication,
    ModelKind::ImportContact,
    ModelKind::UserImportCertificate,
    ModelKind::VariationRequest,
    ModelKind::OilSupplementaryInfo,
    ModelKind::DflSupplementaryInfo,
    ModelKind::OilSupplementaryReport,
    ModelKind::DflSupplementaryReport,
    ModelKind::OilSupplementaryReportFirearm,
];

const USER_M2M: &[M2mBridge] = &[
    M2mBridge {
        source: ModelKind::Office,
        target: ModelKind::Importer,
        table: "web_importer_offices",
        link_field: "importer_id",
    },
    M2mBridge {
        source: ModelKind::Office,
        target: ModelKind::Exporter,
        table: "web_exporter_offices",
        link_field: "exporter_id",
    },
];

const IMPORT_APPLICATION_M2M: &[M2mBridge] = &[
    M2mBridge {
        source: ModelKind::UserImportCertificate,
        target: ModelKind::OilApplication,
        table: "web_openindividuallicenceapplication_user_imported_certificates",
        link_field: "import_application_id",
    },
    M2mBridge {
        source: ModelKind::VariationRequest,
        target: ModelKind::ImportApplication,
        table: "web_importapplication_variation_requests",
        link_field: "import_application_id",
    },
];

const REFERENCE_CHECKS: &[CountCheck] = &[
    CountCheck::Query(CheckQuery {
        name: "Country",
        query: reference::COUNTRY_COUNT,
        binds: &[],
        tables: &["web_country"],
        filter: None,
    }),
    CountCheck::Query(CheckQuery {
        name: "Constabulary",
        query: reference::CONSTABULARY_COUNT,
        binds: &[],
        tables: &["web_constabulary"],
        filter: None,
    }),
    CountCheck::Query(CheckQuery {
        name: "Template",
        query: reference::TEMPLATE_COUNT,
        binds: &[],
        tables: &["web_template"],
        filter: None,
    }),
];

const USER_CHECKS: &[CountCheck] = &[
    CountCheck::Count(CheckCount {
        name: "Migrated users",
        expected_count: 1,
        tables: &["web_user"],
        filter: Some("icms_v1_user = 1"),
        is_exact: false,
    }),
    CountCheck::Query(CheckQuery {
        name: "Importer",
        query: user::IMPORTER_COUNT,
        binds: &[],
        tables: &["web_importer"],
        filter: None,
    }),
    CountCheck::Query(CheckQuery {
        name: "Exporter",
        query: user::EXPORTER_COUNT,
        binds: &[],
        tables: &["web_exporter"],
        filter: None,
    }),
    CountCheck::Query(CheckQuery {
        name: "Office",
        query: user::OFFICE_COUNT,
        binds: &[],
        tables: &["web_office"],
        filter: None,
    }),
];

const IMPORT_APPLICATION_CHECKS: &[CountCheck] = &[
    CountCheck::Query(CheckQuery {
        name: "OIL applications",
        query: ia::IMPORT_APPLICATION_COUNT,
        binds: ia::OIL_BINDS,
        tables: &["web_openindividuallicenceapplication"],
        filter: None,
    }),
    CountCheck::Query(CheckQuery {
        name: "DFL applications",
        query: ia::IMPORT_APPLICATION_COUNT,
        binds: ia::DFL_BINDS,
        tables: &["web_dflapplication"],
        filter: None,
    }),
    CountCheck::Query(CheckQuery {
        name: "Sanctions applications",
        query: ia::IMPORT_APPLICATION_COUNT,
        binds: ia::SANCTIONS_BINDS,
        tables: &["web_sanctionsandadhocapplication"],
        filter: None,
    }),
];

#[must_use]
pub fn query_models(data_type: DataType) -> &'static [QueryModel] {
    match data_type {
        DataType::Reference => REFERENCE_QUERIES,
        DataType::User => USER_QUERIES,
        DataType::ImportApplication => IMPORT_APPLICATION_QUERIES,
    }
}

/// Parsers for `data_type`, children after the parents that stage them.
#[must_use]
pub fn xml_parsers(data_type: DataType) -> Vec<&'static dyn FragmentParser> {
    xml_parser::all()
        .into_iter()
        .filter(|parser| data_type_of(parser.parent()) == data_type)
        .collect()
}

#[must_use]
pub fn load_order(data_type: DataType) -> &'static [ModelKind] {
    match data_type {
        DataType::Reference => REFERENCE_LOAD,
        DataType::User => USER_LOAD,
        DataType::ImportApplication => IMPORT_APPLICATION_LOAD,
    }
}

#[must_use]
pub fn m2m(data_type: DataType) -> &'static [M2mBridge] {
    match data_type {
        DataType::Reference => &[],
        DataType::User => USER_M2M,
        DataType::ImportApplication => IMPORT_APPLICATION_M2M,
    }
}

#[must_use]
pub fn checks(data_type: DataType) -> &'static [CountCheck] {
    match data_type {
        DataType::Reference => REFERENCE_CHECKS,
        DataType::User => USER_CHECKS,
        DataType::ImportApplication => IMPORT_APPLICATION_CHECKS,
    }
}

/// The migration group a model is loaded with.
#[must_use]
pub fn data_type_of(kind: ModelKind) -> DataType {
    DataType::ALL
        .into_iter()
        .find(|data_type| load_order(*data_type).contains(&kind))
        .unwrap_or(DataType::ImportApplication)
}
