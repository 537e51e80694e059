use std::fmt::{self, Write as _};

use crate::entities::Entity;
use crate::error::{Error, Result};

use super::{FilterClause, FilterSet, FilterValue, Scalar, control};

pub const DEFAULT_LIMIT: u32 = 1000;
pub const DEFAULT_OFFSET: u32 = 1;

/// A rendered query plus the settings the executor needs to page through it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    query: String,
    count: bool,
    fetch_all: bool,
    limit: u32,
    offset: u32,
}

impl CompiledQuery {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.query
    }

    #[must_use]
    pub fn is_count(&self) -> bool {
        self.count
    }

    #[must_use]
    pub fn fetch_all(&self) -> bool {
        self.fetch_all
    }

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.query
    }
}

impl fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.query)
    }
}

/// Wraps text in single quotes, escaping backslashes and quotes.
#[must_use]
pub fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        match ch {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            _ => quoted.push(ch),
        }
    }
    quoted.push('\'');
    quoted
}

impl Scalar {
    /// Renders the value as a query-language literal. Text is quoted and
    /// escaped; numbers and booleans are bare.
    #[must_use]
    pub fn to_literal(&self) -> String {
        match self {
            Self::Text(text) => quote(text),
            Self::Integer(_) | Self::Decimal(_) | Self::Boolean(_) => self.to_string(),
        }
    }
}

impl FilterValue {
    /// Lists render as `(a, b, ...)` whatever operator they are used with.
    #[must_use]
    pub fn to_literal(&self) -> String {
        match self {
            Self::Scalar(scalar) => scalar.to_literal(),
            Self::List(items) => {
                let items: Vec<_> = items.iter().map(Scalar::to_literal).collect();
                format!("({})", items.join(", "))
            }
        }
    }
}

/// Removes every clause named `field` and reports whether the last one was
/// boolean `true`.
fn take_flag(clauses: &mut Vec<FilterClause>, field: &str) -> bool {
    let enabled = clauses
        .iter()
        .rev()
        .find(|clause| clause.field == field)
        .is_some_and(|clause| clause.value == FilterValue::Scalar(Scalar::Boolean(true)));
    clauses.retain(|clause| clause.field != field);
    enabled
}

fn position(clause: &FilterClause) -> Result<u32> {
    clause
        .value
        .as_scalar()
        .and_then(Scalar::as_position)
        .ok_or_else(|| {
            Error::invalid_query(format!(
                "`{}` must be a positive integer, got {}",
                clause.field,
                clause.value.to_literal()
            ))
        })
}

fn sort_field(clause: &FilterClause) -> Result<String> {
    match clause.value.as_scalar() {
        Some(Scalar::Text(field)) if !field.trim().is_empty() => Ok(field.trim().to_string()),
        _ => Err(Error::invalid_query(format!(
            "`{}` must name a field, got {}",
            clause.field,
            clause.value.to_literal()
        ))),
    }
}

/// Renders `filters` into a query against `entity`.
///
/// Control clauses are pulled out first: `count` and `fetchAll` become
/// flags, `limit`/`offset` default to [`DEFAULT_LIMIT`]/[`DEFAULT_OFFSET`],
/// and `asc`/`desc` name the sort fields. The remaining clauses become the
/// `where` predicates, joined with `and`. Count queries carry neither sort
/// nor pagination suffixes.
pub fn compile(entity: Entity, filters: &FilterSet) -> Result<CompiledQuery> {
    let mut clauses = filters.clauses().to_vec();

    let count = take_flag(&mut clauses, control::COUNT);
    let mut query = if count {
        format!("select count(*) from {entity}")
    } else {
        format!("select * from {entity}")
    };
    let fetch_all = take_flag(&mut clauses, control::FETCH_ALL);

    if !clauses.iter().any(|clause| clause.field == control::LIMIT) {
        clauses.push(FilterClause::new(control::LIMIT, DEFAULT_LIMIT));
    }
    if !clauses.iter().any(|clause| clause.field == control::OFFSET) {
        clauses.push(FilterClause::new(control::OFFSET, DEFAULT_OFFSET));
    }

    let mut limit = DEFAULT_LIMIT;
    let mut offset = DEFAULT_OFFSET;
    let mut asc = None;
    let mut desc = None;
    let mut predicates = Vec::new();
    for clause in &clauses {
        match clause.field.as_str() {
            control::LIMIT => limit = position(clause)?,
            control::OFFSET => offset = position(clause)?,
            control::ASC => asc = Some(sort_field(clause)?),
            control::DESC => desc = Some(sort_field(clause)?),
            _ => predicates.push(format!(
                "{} {} {}",
                clause.field,
                clause.operator,
                clause.value.to_literal()
            )),
        }
    }

    if !predicates.is_empty() {
        query.push_str(" where ");
        query.push_str(&predicates.join(" and "));
    }

    if !count {
        if let Some(field) = asc {
            let _ = write!(query, " orderby {field} asc");
        }
        if let Some(field) = desc {
            let _ = write!(query, " orderby {field} desc");
        }
        let _ = write!(query, " startposition {offset} maxresults {limit}");
    }

    Ok(CompiledQuery {
        query,
        count,
        fetch_all,
        limit,
        offset,
    })
}
