use std::fmt;

use crate::entities::Entity;
use crate::reports::Report;

/// A typed representation of the company-scoped API resources.
///
/// Every variant renders to a path relative to `v3/company/<realm id>/`;
/// the dispatcher joins it onto the configured host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `/<entity>`, used for create, update, void and delete.
    Entity(Entity),
    /// `/<entity>/<id>`
    Record(Entity, String),
    /// `/<entity>/<id>/pdf`
    Pdf(Entity, String),
    /// `/<entity>/<id>/send`
    Send(Entity, String),
    /// `/preferences`
    Preferences,
    Query,
    Report(Report),
    ChangeDataCapture,
    Batch,
}

impl Endpoint {
    /// The path relative to the company root, without a leading slash.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Entity(entity) => entity.path_segment(),
            Self::Record(entity, id) => format!("{}/{}", entity.path_segment(), encode(id)),
            Self::Pdf(entity, id) => format!("{}/{}/pdf", entity.path_segment(), encode(id)),
            Self::Send(entity, id) => format!("{}/{}/send", entity.path_segment(), encode(id)),
            Self::Preferences => "preferences".to_string(),
            Self::Query => "query".to_string(),
            Self::Report(report) => format!("reports/{}", report.name()),
            Self::ChangeDataCapture => "cdc".to_string(),
            Self::Batch => "batch".to_string(),
        }
    }
}

pub(crate) fn is_binary_path(path: &str) -> bool {
    path.trim_end_matches('/').ends_with("/pdf")
}

fn encode(component: &str) -> String {
    url::form_urlencoded::byte_serialize(component.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_entity_paths() {
        assert_eq!(Endpoint::Entity(Entity::JournalEntry).path(), "journalentry");
        assert_eq!(
            Endpoint::Record(Entity::Invoice, "145".into()).path(),
            "invoice/145"
        );
        assert_eq!(Endpoint::Pdf(Entity::Estimate, "7".into()).path(), "estimate/7/pdf");
        assert_eq!(Endpoint::Send(Entity::Invoice, "7".into()).path(), "invoice/7/send");
        assert_eq!(
            Endpoint::Report(Report::ProfitAndLoss).to_string(),
            "/reports/ProfitAndLoss"
        );
    }

    #[test]
    fn record_ids_are_percent_encoded() {
        assert_eq!(
            Endpoint::Record(Entity::Customer, "a/b c".into()).path(),
            "customer/a%2Fb%20c"
        );
    }

    #[test]
    fn only_pdf_paths_are_binary() {
        assert!(is_binary_path(&Endpoint::Pdf(Entity::Invoice, "1".into()).path()));
        assert!(is_binary_path("/invoice/1/pdf/"));
        assert!(!is_binary_path(&Endpoint::Record(Entity::Invoice, "12".into()).path()));
        assert!(!is_binary_path(&Endpoint::Query.path()));
    }
}
