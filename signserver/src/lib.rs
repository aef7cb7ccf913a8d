// SPDX-License-Identifier: MIT
// Copyright (c) Microsoft Corporation.

/*!
# SignServer client tooling

This crate holds client-side pieces for working with a SignServer deployment.

## Query conditions

The administration interface filters the archive and audit logs with conditions of the form
`column operator value`. The [`query`] module decides which relational operators are legal for
a column based on its declared type, normalizes values for TIME columns to epoch milliseconds,
and provides [`query::ConditionBuilder`], the state behind an "add condition" form.

## Certificate validation

The [`validation`] module sends an X.509 certificate to a validation worker and reports its
status. The `signclient` binary wraps it for use in scripts: the validation status is mapped to
the process exit code.

## Crate features

* **cli** -
  Include the `signclient` CLI and configuration file loading. This is a default feature.
*/

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod query;
pub mod validation;
