// SPDX-License-Identifier: MIT
// Copyright (c) Microsoft Corporation.

//! Loading the certificate to validate.

use std::path::Path;

use openssl::x509::{X509NameRef, X509};

use crate::error::ValidationError;

/// The encoding of a certificate file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// PEM; if the file contains several certificates, the first is used.
    #[default]
    Pem,
    Der,
}

/// An X.509 certificate to validate.
#[derive(Debug, Clone)]
pub struct Certificate {
    x509: X509,
}

impl Certificate {
    /// Parse a certificate from its encoded form.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Certificate`] if a PEM input contains no certificate, and
    /// [`ValidationError::SslErrors`] if the data is malformed.
    pub fn from_bytes(bytes: &[u8], encoding: Encoding) -> Result<Self, ValidationError> {
        let x509 = match encoding {
            Encoding::Pem => X509::stack_from_pem(bytes)?
                .into_iter()
                .next()
                .ok_or_else(|| ValidationError::Certificate("PEM input".to_string()))?,
            Encoding::Der => X509::from_der(bytes)?,
        };
        Ok(Self { x509 })
    }

    /// Read a certificate from a file.
    #[tracing::instrument(skip_all, fields(path = %path.display(), encoding = ?encoding), err)]
    pub fn load(path: &Path, encoding: Encoding) -> Result<Self, ValidationError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes, encoding).map_err(|error| match error {
            ValidationError::Certificate(_) => {
                ValidationError::Certificate(path.display().to_string())
            }
            error => error,
        })
    }

    /// The subject's distinguished name, most specific component first.
    pub fn subject(&self) -> String {
        distinguished_name(self.x509.subject_name())
    }

    /// The issuer's distinguished name, most specific component first.
    pub fn issuer(&self) -> String {
        distinguished_name(self.x509.issuer_name())
    }

    pub fn not_before(&self) -> String {
        self.x509.not_before().to_string()
    }

    pub fn not_after(&self) -> String {
        self.x509.not_after().to_string()
    }

    pub fn to_pem(&self) -> Result<String, ValidationError> {
        let pem = self.x509.to_pem()?;
        String::from_utf8(pem)
            .map_err(|error| anyhow::anyhow!("OpenSSL produced non-UTF-8 PEM: {error}").into())
    }

    pub fn x509(&self) -> &X509 {
        &self.x509
    }
}

// RFC 4514 ordering: the last RDN in the certificate comes first.
fn distinguished_name(name: &X509NameRef) -> String {
    let mut components = name
        .entries()
        .map(|entry| {
            let key = entry.object().nid().short_name().unwrap_or("?");
            let value = entry.data().to_string().unwrap_or_default();
            format!("{key}={value}")
        })
        .collect::<Vec<_>>();
    components.reverse();
    components.join(",")
}
