// SPDX-License-Identifier: MIT
// Copyright (c) Microsoft Corporation.

//! Error types for query conditions and certificate validation.

use tokio_util::codec::LinesCodecError;

use crate::query::{ColumnType, RelationalOperator};

/// Errors that occur while resolving operators or building a query condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum QueryError {
    /// The column type name is not one of the known column types.
    ///
    /// The set of column types is closed, so this indicates a bug in whatever produced the
    /// column definition rather than something a user can correct.
    #[error("unknown column type: {0:?}")]
    InvalidColumnType(String),

    /// The literal value provided for the condition could not be interpreted.
    ///
    /// This is a user input error and should be reported so the value can be corrected.
    #[error("Incorrect value: {0:?}")]
    InvalidLiteralValue(String),

    /// The column name does not match any column offered by the condition builder.
    #[error("no column named {0:?}")]
    UnknownColumn(String),

    /// The operator is not in the legal operator set for the column's type.
    #[error("operator {operator} is not applicable to {column_type} columns")]
    IllegalOperator {
        operator: RelationalOperator,
        column_type: ColumnType,
    },
}

/// Errors the [`crate::validation::ClusterClient`] and certificate loading may return.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// An I/O error occurred.
    ///
    /// This is either a networking problem while talking to a validation host, or the
    /// certificate or truststore could not be read from the filesystem.
    #[error("an I/O error occurred: {0}")]
    Io(#[from] std::io::Error),

    /// OpenSSL rejected the trust configuration or failed to parse a certificate.
    #[error("one or more openssl errors occurred: {0}")]
    SslErrors(#[from] openssl::error::ErrorStack),

    /// The TLS handshake with a validation host failed.
    ///
    /// This is usually because the host presented a certificate not issued by a CA in the
    /// truststore, or because its hostname does not match the certificate.
    #[error("an SSL error occurred: {0}")]
    Ssl(#[from] openssl::ssl::Error),

    /// The file did not contain a certificate in the expected encoding.
    #[error("no certificate could be read from {0}")]
    Certificate(String),

    /// The validation host sent something other than a single JSON response line.
    #[error("malformed response: {0}")]
    Protocol(String),

    #[error("failed to serialize a request or response to JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A host accepted the connection but did not answer within the request timeout.
    #[error("timed out waiting for {host}")]
    Timeout { host: String },

    /// Every configured host failed; the individual failures are logged as they happen.
    #[error("error communicating with validation servers, no server in the cluster seems available")]
    NoServerAvailable,

    /// Generic error that indicates a fatal error, likely due to a bug in the client.
    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

impl From<LinesCodecError> for ValidationError {
    fn from(error: LinesCodecError) -> Self {
        match error {
            LinesCodecError::Io(error) => ValidationError::Io(error),
            LinesCodecError::MaxLineLengthExceeded => {
                ValidationError::Protocol("response exceeds the maximum line length".to_string())
            }
        }
    }
}
