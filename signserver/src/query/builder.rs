// SPDX-License-Identifier: MIT
// Copyright (c) Microsoft Corporation.

//! State behind an "add condition" form.
//!
//! The form offers a list of columns. Selecting a column decides which operators are offered
//! and what kind of value input makes sense; confirming the form produces a [`Condition`] or an
//! error to show the user, in which case the form should stay open.

use crate::error::QueryError;

use super::{format_time, Column, ColumnType, Condition, RelationalOperator};

/// Source of the current time, used to suggest values for TIME columns.
pub trait Clock {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

impl<F> Clock for F
where
    F: Fn() -> i64,
{
    fn now_millis(&self) -> i64 {
        self()
    }
}

/// How the value of the condition should be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueInput {
    /// The selected operator takes no value.
    Disabled,
    /// Pick one of the suggestions (the column is a TYPE column), though other text is accepted.
    Choice,
    /// Free text; the suggestions, if any, are examples.
    Free,
}

/// View-model for building a single [`Condition`].
#[derive(Debug)]
pub struct ConditionBuilder<C = SystemClock> {
    columns: Vec<Column>,
    column: usize,
    operators: &'static [RelationalOperator],
    operator: RelationalOperator,
    suggestions: Vec<String>,
    value: String,
    clock: C,
}

impl ConditionBuilder<SystemClock> {
    /// Create a builder offering the given columns, with the first column selected.
    ///
    /// Returns [`None`] if there are no columns to offer.
    pub fn new(columns: Vec<Column>) -> Option<Self> {
        Self::with_clock(columns, SystemClock)
    }
}

impl<C: Clock> ConditionBuilder<C> {
    pub fn with_clock(columns: Vec<Column>, clock: C) -> Option<Self> {
        let first = columns.first()?;
        let operators = first.operators();
        let mut builder = Self {
            operators,
            operator: operators[0],
            columns,
            column: 0,
            suggestions: vec![],
            value: String::new(),
            clock,
        };
        builder.refresh();
        Some(builder)
    }

    /// Select the column with the given name.
    ///
    /// The offered operators, the selected operator, and the value suggestions are replaced to
    /// match the new column. Returns the newly offered operators.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownColumn`] if no offered column has that name; the
    /// selection is unchanged.
    pub fn select_column(&mut self, name: &str) -> Result<&'static [RelationalOperator], QueryError> {
        self.column = self
            .columns
            .iter()
            .position(|column| column.name == name)
            .ok_or_else(|| QueryError::UnknownColumn(name.to_string()))?;
        self.refresh();
        Ok(self.operators)
    }

    /// Select one of the offered operators.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::IllegalOperator`] if the operator isn't offered for the current column.
    pub fn select_operator(&mut self, operator: RelationalOperator) -> Result<(), QueryError> {
        if !self.operators.contains(&operator) {
            return Err(QueryError::IllegalOperator {
                operator,
                column_type: self.column().column_type,
            });
        }
        self.operator = operator;
        Ok(())
    }

    /// Set the value text as entered by the user.
    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self) -> &Column {
        &self.columns[self.column]
    }

    pub fn operators(&self) -> &'static [RelationalOperator] {
        self.operators
    }

    pub fn operator(&self) -> RelationalOperator {
        self.operator
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn value_input(&self) -> ValueInput {
        if !self.operator.takes_value() {
            ValueInput::Disabled
        } else if self.column().column_type == ColumnType::Type {
            ValueInput::Choice
        } else {
            ValueInput::Free
        }
    }

    /// Build the condition from the current selection.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidLiteralValue`] if the value is not valid for the column;
    /// the caller should report it and let the user correct the value.
    pub fn confirm(&self) -> Result<Condition, QueryError> {
        Condition::new(self.column().clone(), self.operator, Some(&self.value))
            .inspect_err(|error| tracing::debug!(%error, "Condition rejected"))
    }

    fn refresh(&mut self) {
        let column = &self.columns[self.column];
        self.operators = column.operators();
        self.operator = self.operators[0];
        self.suggestions = match column.column_type {
            ColumnType::Type => column.type_values.clone(),
            ColumnType::Time => {
                let now = self.clock.now_millis();
                format_time(now)
                    .into_iter()
                    .chain(std::iter::once(now.to_string()))
                    .collect()
            }
            ColumnType::Text | ColumnType::Number => vec![],
        };
        self.value = self.suggestions.first().cloned().unwrap_or_default();
    }
}
