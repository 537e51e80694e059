//! Query compilation and paginated execution.
//!
//! A filter description arrives either as JSON (a mapping of field to value,
//! or a list of `{field, value, operator}` records) or as a [`FilterSet`]
//! built in code. [`normalize`] turns the former into the latter,
//! [`compile`] renders a `FilterSet` into the API's query language and
//! [`execute::find_filtered`] dispatches it, walking pages when `fetchAll`
//! was requested.
//!
//! ```ignore
//! use qbo_rs::{Entity, query::FilterSet};
//!
//! let filters = FilterSet::new()
//!     .with("Active", true)
//!     .with_op("Balance", Operator::GreaterThan, 0)
//!     .asc("DisplayName")
//!     .fetch_all();
//! let customers = client.find_filtered(Entity::Customer, filters).await?;
//! ```

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::{Error, Result};

pub mod compile;
pub mod execute;
pub mod result;

pub use compile::{CompiledQuery, DEFAULT_LIMIT, DEFAULT_OFFSET, compile};
pub use result::{QueryResponse, QueryResult};

/// Field names that configure the compiler instead of becoming predicates.
pub mod control {
    pub const LIMIT: &str = "limit";
    pub const OFFSET: &str = "offset";
    pub const ASC: &str = "asc";
    pub const DESC: &str = "desc";
    pub const COUNT: &str = "count";
    pub const FETCH_ALL: &str = "fetchAll";

    #[must_use]
    pub fn is_control(field: &str) -> bool {
        matches!(field, LIMIT | OFFSET | ASC | DESC | COUNT | FETCH_ALL)
    }
}

/// A single literal value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scalar {
    Text(String),
    Integer(i64),
    Decimal(Decimal),
    Boolean(bool),
}

impl Scalar {
    fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(Self::Text(s.clone())),
            Value::Bool(b) => Ok(Self::Boolean(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Integer(i))
                } else if let Some(u) = n.as_u64() {
                    Ok(Self::Decimal(Decimal::from(u)))
                } else {
                    n.as_f64()
                        .and_then(|f| Decimal::try_from(f).ok())
                        .map(Self::Decimal)
                        .ok_or_else(|| Error::invalid_query(format!("number {n} is out of range")))
                }
            }
            Value::Null => Err(Error::invalid_query("null is not a filter value")),
            Value::Array(_) => Err(Error::invalid_query("nested lists are not filter values")),
            Value::Object(_) => Err(Error::invalid_query("objects are not filter values")),
        }
    }

    /// The value as a positive page size or position, if it is one.
    pub(crate) fn as_position(&self) -> Option<u32> {
        let position = match self {
            Self::Integer(i) => u32::try_from(*i).ok(),
            Self::Text(s) => s.trim().parse::<u32>().ok(),
            Self::Decimal(d) if d.fract().is_zero() => u32::try_from(d.trunc()).ok(),
            _ => None,
        };
        position.filter(|p| *p > 0)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Decimal(d) => write!(f, "{}", d.normalize()),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

macro_rules! scalar_from {
    ($($ty:ty => $variant:ident($conv:expr)),* $(,)?) => {
        $(
            impl From<$ty> for Scalar {
                fn from(value: $ty) -> Self {
                    Self::$variant($conv(value))
                }
            }

            impl From<$ty> for FilterValue {
                fn from(value: $ty) -> Self {
                    Self::Scalar(Scalar::from(value))
                }
            }
        )*
    };
}

scalar_from! {
    &str => Text(str::to_string),
    String => Text(std::convert::identity),
    i64 => Integer(std::convert::identity),
    i32 => Integer(i64::from),
    u32 => Integer(i64::from),
    Decimal => Decimal(std::convert::identity),
    bool => Boolean(std::convert::identity),
}

/// The right-hand side of a clause: one literal or a list of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Scalar(Scalar),
    List(Vec<Scalar>),
}

impl FilterValue {
    fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(Scalar::from_json)
                .collect::<Result<Vec<_>>>()
                .map(Self::List),
            other => Scalar::from_json(other).map(Self::Scalar),
        }
    }

    #[must_use]
    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    #[must_use]
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(scalar) => Some(scalar),
            Self::List(_) => None,
        }
    }
}

impl From<Scalar> for FilterValue {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

impl<S: Into<Scalar>> From<Vec<S>> for FilterValue {
    fn from(values: Vec<S>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// Comparison operators understood by the query language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Operator {
    #[default]
    Equals,
    In,
    LessThan,
    GreaterThan,
    LessOrEqual,
    GreaterOrEqual,
    Like,
}

impl Operator {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::In => "in",
            Self::LessThan => "<",
            Self::GreaterThan => ">",
            Self::LessOrEqual => "<=",
            Self::GreaterOrEqual => ">=",
            Self::Like => "like",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "=" => Ok(Self::Equals),
            "in" => Ok(Self::In),
            "<" => Ok(Self::LessThan),
            ">" => Ok(Self::GreaterThan),
            "<=" => Ok(Self::LessOrEqual),
            ">=" => Ok(Self::GreaterOrEqual),
            "like" => Ok(Self::Like),
            other => Err(Error::invalid_query(format!("unknown operator `{other}`"))),
        }
    }
}

/// One condition, or one control setting when `field` is a reserved name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterClause {
    pub field: String,
    pub value: FilterValue,
    pub operator: Operator,
}

impl FilterClause {
    /// Builds a clause whose operator follows the value's shape: membership
    /// for lists, equality otherwise.
    pub fn new(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        let value = value.into();
        let operator = if value.is_list() {
            Operator::In
        } else {
            Operator::Equals
        };
        Self {
            field: field.into(),
            value,
            operator,
        }
    }

    pub fn with_operator(
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            operator,
        }
    }

    fn from_record(index: usize, record: &Value) -> Result<Self> {
        let Value::Object(record) = record else {
            return Err(Error::invalid_query(format!(
                "clause {index} must be an object with `field` and `value`"
            )));
        };
        let field = record
            .get("field")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::invalid_query(format!("clause {index} is missing `field`")))?;
        let value = record
            .get("value")
            .ok_or_else(|| Error::invalid_query(format!("clause {index} is missing `value`")))?;
        let operator = match record.get("operator") {
            None | Some(Value::Null) => Operator::Equals,
            Some(Value::String(op)) => op.parse()?,
            Some(other) => {
                return Err(Error::invalid_query(format!(
                    "clause {index} has a non-string operator {other}"
                )));
            }
        };
        Ok(Self {
            field: field.to_string(),
            value: FilterValue::from_json(value)?,
            operator,
        })
    }
}

/// An ordered list of clauses, control settings included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    clauses: Vec<FilterClause>,
}

impl FilterSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn push(&mut self, clause: FilterClause) {
        self.clauses.push(clause);
    }

    /// Adds a clause with the operator inferred from the value.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.push(FilterClause::new(field, value));
        self
    }

    #[must_use]
    pub fn with_op(
        mut self,
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<FilterValue>,
    ) -> Self {
        self.push(FilterClause::with_operator(field, operator, value));
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.set_control(control::LIMIT, limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u32) -> Self {
        self.set_control(control::OFFSET, offset);
        self
    }

    #[must_use]
    pub fn asc(mut self, field: impl Into<String>) -> Self {
        self.set_control(control::ASC, field.into());
        self
    }

    #[must_use]
    pub fn desc(mut self, field: impl Into<String>) -> Self {
        self.set_control(control::DESC, field.into());
        self
    }

    /// Switches the query to `select count(*)`.
    #[must_use]
    pub fn count(mut self) -> Self {
        self.set_control(control::COUNT, true);
        self
    }

    /// Requests every page rather than just the first.
    #[must_use]
    pub fn fetch_all(mut self) -> Self {
        self.set_control(control::FETCH_ALL, true);
        self
    }

    /// Replaces every clause named `field` with a single equality clause.
    pub(crate) fn set_control(&mut self, field: &str, value: impl Into<FilterValue>) {
        self.clauses.retain(|clause| clause.field != field);
        self.clauses.push(FilterClause::new(field, value));
    }
}

impl FromIterator<FilterClause> for FilterSet {
    fn from_iter<I: IntoIterator<Item = FilterClause>>(iter: I) -> Self {
        Self {
            clauses: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<FilterClause>> for FilterSet {
    fn from(clauses: Vec<FilterClause>) -> Self {
        Self { clauses }
    }
}

impl IntoIterator for FilterSet {
    type Item = FilterClause;
    type IntoIter = std::vec::IntoIter<FilterClause>;

    fn into_iter(self) -> Self::IntoIter {
        self.clauses.into_iter()
    }
}

impl TryFrom<&Value> for FilterSet {
    type Error = Error;

    fn try_from(input: &Value) -> Result<Self> {
        normalize(input)
    }
}

/// Turns a JSON filter description into a [`FilterSet`].
///
/// - `null` yields an empty set.
/// - A mapping yields one clause per entry, in the order written, with
///   membership for list values and equality otherwise.
/// - A list must hold `{field, value, operator?}` records; a missing operator
///   means equality.
///
/// The input is only read; every clause owns copies of its values.
pub fn normalize(input: &Value) -> Result<FilterSet> {
    match input {
        Value::Null => Ok(FilterSet::new()),
        Value::Object(entries) => entries
            .iter()
            .map(|(field, value)| Ok(FilterClause::new(field.clone(), FilterValue::from_json(value)?)))
            .collect(),
        Value::Array(records) => records
            .iter()
            .enumerate()
            .map(|(index, record)| FilterClause::from_record(index, record))
            .collect(),
        Value::Bool(_) | Value::Number(_) | Value::String(_) => Err(Error::invalid_query(
            format!("expected a mapping or a list of clauses, got {input}"),
        )),
    }
}
