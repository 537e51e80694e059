use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::entities::Entity;
use crate::utils::date_format::qbo_datetime_format;

/// The envelope a query returns: `{"QueryResponse": {...}, "time": "..."}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(rename = "QueryResponse", default)]
    pub query_response: QueryResponse,
    #[serde(
        default,
        with = "qbo_datetime_format::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub time: Option<OffsetDateTime>,
}

/// Paging metadata plus the record collections, keyed by entity name.
///
/// Count queries carry only `totalCount`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_position: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
    #[serde(flatten)]
    pub records: Map<String, Value>,
}

impl QueryResponse {
    /// The stored key matching `entity`, compared case-insensitively.
    fn entity_key(&self, entity: Entity) -> Option<&String> {
        self.records
            .keys()
            .find(|key| key.eq_ignore_ascii_case(entity.name()))
    }
}

impl QueryResult {
    /// The records of `entity` on this result; empty when the key is absent.
    #[must_use]
    pub fn records(&self, entity: Entity) -> &[Value] {
        self.query_response
            .entity_key(entity)
            .and_then(|key| self.query_response.records.get(key))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn into_records(mut self, entity: Entity) -> Vec<Value> {
        let Some(key) = self.query_response.entity_key(entity).cloned() else {
            return Vec::new();
        };
        match self.query_response.records.remove(&key) {
            Some(Value::Array(records)) => records,
            _ => Vec::new(),
        }
    }

    /// `totalCount` as reported by a count query.
    #[must_use]
    pub fn total_count(&self) -> Option<u64> {
        self.query_response.total_count
    }

    /// Folds the next page into this result: records are appended under the
    /// existing entity key, counters are summed and the page's `time` wins.
    pub(crate) fn merge_page(&mut self, entity: Entity, page: Self) {
        let Self {
            query_response: mut page_response,
            time,
        } = page;
        if time.is_some() {
            self.time = time;
        }

        let response = &mut self.query_response;
        response.max_results = sum(response.max_results, page_response.max_results);
        response.total_count = sum(response.total_count, page_response.total_count);

        let page_records = match page_response
            .entity_key(entity)
            .cloned()
            .and_then(|key| page_response.records.remove(&key))
        {
            Some(Value::Array(records)) if !records.is_empty() => records,
            _ => return,
        };

        let key = response
            .entity_key(entity)
            .cloned()
            .unwrap_or_else(|| entity.name().to_string());
        match response.records.get_mut(&key) {
            Some(Value::Array(records)) => records.extend(page_records),
            _ => {
                response.records.insert(key, Value::Array(page_records));
            }
        }
    }
}

fn sum(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.saturating_add(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    fn page(value: Value) -> QueryResult {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn deserializes_a_record_page() {
        let result = page(json!({
            "QueryResponse": {
                "Customer": [{"Id": "1"}, {"Id": "2"}],
                "startPosition": 1,
                "maxResults": 2
            },
            "time": "2024-03-01T10:15:30.123-08:00"
        }));
        assert_eq!(result.records(Entity::Customer).len(), 2);
        assert_eq!(result.query_response.start_position, Some(1));
        assert_eq!(result.query_response.max_results, Some(2));
        assert!(result.time.is_some());
    }

    #[test]
    fn count_results_expose_total_count() {
        let result = page(json!({"QueryResponse": {"totalCount": 42}}));
        assert_eq!(result.total_count(), Some(42));
        assert!(result.records(Entity::Bill).is_empty());
    }

    #[test]
    fn record_lookup_ignores_key_case() {
        let result = page(json!({"QueryResponse": {"invoice": [{"Id": "9"}]}}));
        assert_eq!(result.records(Entity::Invoice), &[json!({"Id": "9"})]);
        assert_eq!(result.into_records(Entity::Invoice).len(), 1);
    }

    #[test]
    fn empty_envelope_and_bad_time_are_tolerated() {
        let result = page(json!({"time": "not a time"}));
        assert!(result.time.is_none());
        assert!(result.records(Entity::Item).is_empty());
    }

    #[test]
    fn merge_appends_records_and_sums_counters() {
        let mut first = page(json!({
            "QueryResponse": {"Invoice": [{"Id": "1"}, {"Id": "2"}], "startPosition": 1, "maxResults": 2},
            "time": "2024-03-01T10:00:00Z"
        }));
        let second = page(json!({
            "QueryResponse": {"INVOICE": [{"Id": "3"}], "startPosition": 3, "maxResults": 1},
            "time": "2024-03-01T10:00:05Z"
        }));
        first.merge_page(Entity::Invoice, second);

        let ids: Vec<_> = first
            .records(Entity::Invoice)
            .iter()
            .map(|r| r["Id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, ["1", "2", "3"]);
        assert_eq!(first.query_response.max_results, Some(3));
        assert_eq!(first.query_response.start_position, Some(1));
        assert_eq!(first.time, Some(datetime!(2024-03-01 10:00:05 UTC)));
        assert_eq!(first.query_response.records.len(), 1);
    }

    #[test]
    fn merge_keeps_time_when_page_has_none() {
        let mut first = page(json!({
            "QueryResponse": {"Item": [{"Id": "1"}]},
            "time": "2024-03-01T10:00:00Z"
        }));
        first.merge_page(Entity::Item, page(json!({"QueryResponse": {}})));
        assert_eq!(first.time, Some(datetime!(2024-03-01 10:00:00 UTC)));
        assert_eq!(first.records(Entity::Item).len(), 1);
    }

    #[test]
    fn merge_saturates_oversized_counters() {
        let mut first = page(json!({
            "QueryResponse": {"Item": [{"Id": "1"}, {"Id": "2"}], "maxResults": u64::MAX, "totalCount": u64::MAX}
        }));
        let second = page(json!({
            "QueryResponse": {"Item": [{"Id": "3"}], "maxResults": 1, "totalCount": 1}
        }));
        first.merge_page(Entity::Item, second);

        assert_eq!(first.query_response.max_results, Some(u64::MAX));
        assert_eq!(first.total_count(), Some(u64::MAX));
        assert_eq!(first.records(Entity::Item).len(), 3);
    }
}
