// SPDX-License-Identifier: MIT
// Copyright (c) Microsoft Corporation.

//! Certificate validation against a remote SignServer validation service.
//!
//! The certificate is sent to a validation worker, which answers with the certificate's
//! [`Status`] and the certificate purposes it found valid. Scripts consume the result through
//! the process exit code; see [`Status::exit_code`].

use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

pub mod certificate;
mod client;

pub use certificate::{Certificate, Encoding};
pub use client::{ClusterClient, Config};

/// The default port of the validation service.
pub const DEFAULT_PORT: u16 = 8080;
/// The default port of the validation service when TLS is used.
pub const DEFAULT_TLS_PORT: u16 = 8442;

/// Exit code for any error during execution, including statuses this client doesn't know.
pub const RETURN_ERROR: i32 = -2;
/// Exit code for invalid command-line arguments.
pub const RETURN_BAD_ARGUMENT: i32 = -1;

/// The validation status of a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Valid,
    Revoked,
    NotYetValid,
    Expired,
    /// The certificate's signature doesn't verify or its chain can't be built.
    DontVerify,
    CaRevoked,
    CaNotYetValid,
    CaExpired,
    /// None of the requested certificate purposes are valid for the certificate.
    BadCertPurpose,
    /// A status added to the service after this client was written.
    #[serde(other)]
    Unknown,
}

impl Status {
    /// The process exit code for this status.
    ///
    /// Each known status has a distinct code from 0 (valid) to 8 (bad certificate purpose);
    /// unknown statuses are treated as errors.
    pub fn exit_code(self) -> i32 {
        match self {
            Status::Valid => 0,
            Status::Revoked => 1,
            Status::NotYetValid => 2,
            Status::Expired => 3,
            Status::DontVerify => 4,
            Status::CaRevoked => 5,
            Status::CaNotYetValid => 6,
            Status::CaExpired => 7,
            Status::BadCertPurpose => 8,
            Status::Unknown => RETURN_ERROR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Valid => "VALID",
            Status::Revoked => "REVOKED",
            Status::NotYetValid => "NOTYETVALID",
            Status::Expired => "EXPIRED",
            Status::DontVerify => "DONTVERIFY",
            Status::CaRevoked => "CAREVOKED",
            Status::CaNotYetValid => "CANOTYETVALID",
            Status::CaExpired => "CAEXPIRED",
            Status::BadCertPurpose => "BADCERTPURPOSE",
            Status::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to validate a certificate, as sent to the validation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateRequest {
    /// Identifies the request in client and server logs.
    pub request_id: Uuid,
    /// The name or numeric id of the validation worker.
    pub service: String,
    /// The PEM-encoded certificate.
    pub certificate: String,
    /// Comma-separated certificate purposes to check; the service's defaults apply if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_purposes: Option<String>,
}

impl ValidateRequest {
    pub fn new(
        service: &str,
        certificate: &Certificate,
        certificate_purposes: Option<&str>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            request_id: Uuid::now_v7(),
            service: service.to_string(),
            certificate: certificate.to_pem()?,
            certificate_purposes: certificate_purposes.map(str::to_string),
        })
    }
}

/// The validation service's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateResponse {
    /// Comma-separated certificate purposes the certificate is valid for.
    #[serde(default)]
    pub valid_purposes: Option<String>,
    pub status: Status,
}

/// A way of reaching the validation service.
pub trait ValidationTransport {
    /// Ask the named validation service for the status of `certificate`.
    fn validate(
        &self,
        service: &str,
        certificate: &Certificate,
        requested_purposes: Option<&str>,
    ) -> impl Future<Output = Result<ValidateResponse, ValidationError>>;
}
