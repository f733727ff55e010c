//! SQL catalogue for the legacy replica.

pub mod import_application;
pub mod reference;
pub mod user;

use crate::query::LegacyQuery;

/// Every export query, in catalogue order.
#[must_use]
pub fn all() -> [&'static LegacyQuery; 10] {
    [
        &reference::COUNTRY,
        &reference::CONSTABULARY,
        &reference::TEMPLATE,
        &user::USERS,
        &user::IMPORTERS,
        &user::EXPORTERS,
        &user::OFFICES,
        &import_application::OIL,
        &import_application::DFL,
        &import_application::SANCTIONS,
    ]
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::xml::XPath;

    #[test]
    fn query_names_are_unique() {
        let names: BTreeSet<&str> = all().iter().map(|query| query.name).collect();
        assert_eq!(names.len(), all().len());
    }

    #[test]
    fn xml_projections_parse_and_are_declared_with_a_source() {
        for query in all() {
            if query.xml_columns.is_empty() {
                continue;
            }
            assert!(query.xml_source.is_some(), "{} has no xml source", query.name);
            for column in query.xml_columns {
                assert!(
                    XPath::parse(column.path).is_ok(),
                    "{}.{} has an invalid path",
                    query.name,
                    column.name
                );
            }
        }
    }

    #[test]
    fn every_query_is_ordered() {
        for query in all() {
            assert!(query.sql.contains("ORDER BY"), "{} is unordered", query.name);
        }
    }
}
