// SPDX-License-Identifier: MIT
// Copyright (c) Microsoft Corporation.

//! Conditions for filtering the archive and audit log queries.
//!
//! Every queryable [`Column`] declares a [`ColumnType`], and the column type decides which
//! [`RelationalOperator`]s make sense for it. A [`Condition`] can only be constructed when its
//! operator is legal for its column, and values for TIME columns are always normalized to epoch
//! milliseconds before they end up in a condition.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::QueryError;

mod builder;
mod time;

pub use builder::{Clock, ConditionBuilder, SystemClock, ValueInput};
pub use time::{format_time, parse_time_value, TIME_FORMAT};

const TEXT_OPERATORS: &[RelationalOperator] = &[
    RelationalOperator::Equals,
    RelationalOperator::Like,
    RelationalOperator::NotEquals,
    RelationalOperator::IsNotNull,
    RelationalOperator::IsNull,
];

const NUMBER_OPERATORS: &[RelationalOperator] = &[
    RelationalOperator::Equals,
    RelationalOperator::NotEquals,
    RelationalOperator::GreaterOrEqual,
    RelationalOperator::GreaterThan,
    RelationalOperator::LessOrEqual,
    RelationalOperator::LessThan,
    RelationalOperator::IsNotNull,
    RelationalOperator::IsNull,
];

const TYPE_OPERATORS: &[RelationalOperator] =
    &[RelationalOperator::Equals, RelationalOperator::NotEquals];

/// The declared value type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum ColumnType {
    /// Free-form text.
    Text,
    /// Integer values.
    Number,
    /// Points in time, stored as milliseconds since the Unix epoch.
    Time,
    /// One of a fixed set of values, such as event category names.
    Type,
}

impl ColumnType {
    /// The operators that are legal for this column type, in the order they should be offered.
    pub fn operators(self) -> &'static [RelationalOperator] {
        match self {
            ColumnType::Text => TEXT_OPERATORS,
            ColumnType::Number | ColumnType::Time => NUMBER_OPERATORS,
            ColumnType::Type => TYPE_OPERATORS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Number => "NUMBER",
            ColumnType::Time => "TIME",
            ColumnType::Type => "TYPE",
        }
    }
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ColumnType {
    type Error = QueryError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "TEXT" => Ok(ColumnType::Text),
            "NUMBER" => Ok(ColumnType::Number),
            "TIME" => Ok(ColumnType::Time),
            "TYPE" => Ok(ColumnType::Type),
            other => Err(QueryError::InvalidColumnType(other.to_string())),
        }
    }
}

impl TryFrom<String> for ColumnType {
    type Error = QueryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ColumnType::try_from(value.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColumnType::try_from(s)
    }
}

/// Resolve the legal operators for a column type.
pub fn operators_for(column_type: ColumnType) -> &'static [RelationalOperator] {
    column_type.operators()
}

/// Resolve the legal operators for a column type given by name, as it appears in column
/// definitions received from the server.
///
/// # Errors
///
/// Returns [`QueryError::InvalidColumnType`] if the name is not a known column type.
pub fn operators_for_type_name(name: &str) -> Result<&'static [RelationalOperator], QueryError> {
    Ok(ColumnType::try_from(name)?.operators())
}

/// A relational comparator between a column and a literal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationalOperator {
    #[serde(rename = "EQ")]
    Equals,
    #[serde(rename = "NEQ")]
    NotEquals,
    #[serde(rename = "LT")]
    LessThan,
    #[serde(rename = "LE")]
    LessOrEqual,
    #[serde(rename = "GT")]
    GreaterThan,
    #[serde(rename = "GE")]
    GreaterOrEqual,
    #[serde(rename = "LIKE")]
    Like,
    #[serde(rename = "NULL")]
    IsNull,
    #[serde(rename = "NOTNULL")]
    IsNotNull,
}

impl RelationalOperator {
    /// Whether a condition with this operator compares against a value.
    ///
    /// The null checks don't, so any value supplied with them is dropped.
    pub fn takes_value(self) -> bool {
        !matches!(self, RelationalOperator::IsNull | RelationalOperator::IsNotNull)
    }

    /// A short description suitable for offering the operator to a user.
    pub fn description(self) -> &'static str {
        match self {
            RelationalOperator::Equals => "Equals",
            RelationalOperator::NotEquals => "Not equals",
            RelationalOperator::LessThan => "Less than",
            RelationalOperator::LessOrEqual => "Less than or equal",
            RelationalOperator::GreaterThan => "Greater than",
            RelationalOperator::GreaterOrEqual => "Greater than or equal",
            RelationalOperator::Like => "Like",
            RelationalOperator::IsNull => "Is null",
            RelationalOperator::IsNotNull => "Is not null",
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            RelationalOperator::Equals => "=",
            RelationalOperator::NotEquals => "<>",
            RelationalOperator::LessThan => "<",
            RelationalOperator::LessOrEqual => "<=",
            RelationalOperator::GreaterThan => ">",
            RelationalOperator::GreaterOrEqual => ">=",
            RelationalOperator::Like => "LIKE",
            RelationalOperator::IsNull => "IS NULL",
            RelationalOperator::IsNotNull => "IS NOT NULL",
        }
    }
}

impl Display for RelationalOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// A queryable field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// The name the server knows the column by.
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// The legal values of a TYPE column, in display order. Empty for other column types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_values: Vec<String>,
}

impl Column {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        column_type: ColumnType,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            column_type,
            type_values: vec![],
        }
    }

    /// Create a TYPE column with the given legal values.
    pub fn enumerated<I, S>(name: impl Into<String>, description: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            description: description.into(),
            column_type: ColumnType::Type,
            type_values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// The operators that are legal for this column.
    pub fn operators(&self) -> &'static [RelationalOperator] {
        self.column_type.operators()
    }
}

/// A validated (column, operator, value) triple, ready to be sent as a query filter.
///
/// Serializes with the column's name only:
///
/// ```json
/// {"column": "time", "operator": "GE", "value": "1700000000000"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    column: Column,
    operator: RelationalOperator,
    value: Option<String>,
}

impl Condition {
    /// Build a condition, normalizing the value for the column type.
    ///
    /// The value is discarded for operators that don't take one. For TIME columns the value
    /// must be either epoch milliseconds or a timestamp in [`TIME_FORMAT`], and the condition
    /// stores the epoch milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::IllegalOperator`] if the operator is not legal for the column type,
    /// and [`QueryError::InvalidLiteralValue`] if a value is required but missing or, for TIME
    /// columns, cannot be parsed.
    pub fn new(
        column: Column,
        operator: RelationalOperator,
        value: Option<&str>,
    ) -> Result<Self, QueryError> {
        if !column.operators().contains(&operator) {
            return Err(QueryError::IllegalOperator {
                operator,
                column_type: column.column_type,
            });
        }

        let value = if operator.takes_value() {
            let value = value.ok_or_else(|| QueryError::InvalidLiteralValue(String::new()))?;
            match column.column_type {
                ColumnType::Time => Some(parse_time_value(value)?.to_string()),
                ColumnType::Text | ColumnType::Number | ColumnType::Type => Some(value.to_string()),
            }
        } else {
            None
        };

        Ok(Self {
            column,
            operator,
            value,
        })
    }

    pub fn column(&self) -> &Column {
        &self.column
    }

    pub fn operator(&self) -> RelationalOperator {
        self.operator
    }

    /// The normalized value, or [`None`] for the null checks.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.column.name, self.operator.symbol())?;
        if let Some(value) = &self.value {
            write!(f, " {value}")?;
        }
        Ok(())
    }
}

impl Serialize for Condition {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        #[derive(Serialize)]
        struct ConditionHelper<'a> {
            column: &'a str,
            operator: RelationalOperator,
            value: Option<&'a str>,
        }

        ConditionHelper {
            column: &self.column.name,
            operator: self.operator,
            value: self.value.as_deref(),
        }
        .serialize(serializer)
    }
}
