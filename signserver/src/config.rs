// SPDX-License-Identifier: MIT
// Copyright (c) Microsoft Corporation.

use std::path::PathBuf;

#[cfg(feature = "cli")]
use anyhow::Context;
use openssl::{
    pkcs12::Pkcs12,
    ssl::{SslConnector, SslMethod, SslVerifyMode},
    x509::store::X509StoreBuilder,
};

use crate::error::ValidationError;

/// The certificates trusted when connecting to validation hosts over TLS.
///
/// The truststore is a PKCS#12 file holding the CA certificates that issued the hosts' TLS
/// server certificates.
#[derive(Clone)]
pub struct TrustStore {
    /// The path to the PKCS#12 file.
    pub path: PathBuf,
    /// The password that unlocks the PKCS#12 file.
    pub password: String,
}

impl std::fmt::Debug for TrustStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustStore")
            .field("path", &self.path)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl TrustStore {
    pub fn new(path: PathBuf, password: String) -> Self {
        Self { path, password }
    }

    /// Build a TLS connector that trusts only the certificates in the truststore.
    ///
    /// The system's default verify paths are not consulted.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be read, the password is wrong, or the store holds
    /// no certificates.
    pub fn ssl_connector(&self) -> Result<SslConnector, ValidationError> {
        let der = std::fs::read(&self.path)?;
        let parsed = Pkcs12::from_der(&der)?.parse2(&self.password)?;

        let mut store = X509StoreBuilder::new()?;
        let mut trusted = 0;
        for certificate in parsed.cert.into_iter().chain(parsed.ca.into_iter().flatten()) {
            store.add_cert(certificate)?;
            trusted += 1;
        }
        if trusted == 0 {
            return Err(ValidationError::Certificate(self.path.display().to_string()));
        }
        tracing::debug!(path = %self.path.display(), trusted, "Loaded truststore");

        let mut connector = SslConnector::builder(SslMethod::tls())?;
        connector.set_verify(SslVerifyMode::PEER);
        // The builder starts from the default verify paths; replace them entirely.
        connector.set_cert_store(store.build());

        Ok(connector.build())
    }
}

#[cfg(feature = "cli")]
fn private_load_config<T>(path: &std::path::Path) -> anyhow::Result<T>
where
    T: Default + std::fmt::Display + serde::de::DeserializeOwned,
{
    let config = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read from path {path:?}"))?;
    tracing::info!(path=%path.display(), "Read from configuration file");
    toml::from_str(&config)
        .inspect_err(|error| {
            eprintln!("Failed to parse configuration loaded from {path:?}:\n{error}");
            eprintln!("Example config file:\n\n{}", T::default());
        })
        .context("configuration file is invalid")
}

/// Load the configuration with fallback options.
///
/// If `path` is [`None`], the `default` path, which should be relative to CONFIGURATION_DIRECTORY, is
/// checked.  If the default config doesn't exist, the [`Default`] implementation is returned.
///
/// # Errors
///
/// In the event that one of the config files exists, but is invalid, an error is returned.
#[cfg(feature = "cli")]
pub fn load_config<T>(path: Option<PathBuf>, default: &std::path::Path) -> anyhow::Result<T>
where
    T: Default + std::fmt::Display + serde::de::DeserializeOwned,
{
    path.or_else(|| {
        std::env::var("CONFIGURATION_DIRECTORY")
            .inspect_err(|error| {
                tracing::debug!(
                    ?error,
                    "CONFIGURATION_DIRECTORY environment variable isn't readable"
                );
            })
            .map(PathBuf::from)
            .ok()
            .map(|base_path| base_path.join(default))
            .filter(|path| path.is_file())
    })
    .map_or_else(
        || {
            tracing::debug!("No configuration file found; using defaults");
            Ok(T::default())
        },
        |path| {
            tracing::info!(?path, "Attempting to load configuration");
            private_load_config::<T>(&path)
        },
    )
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use std::{path::Path, time::Duration};

    use openssl::{
        asn1::Asn1Time,
        ec::{EcGroup, EcKey},
        hash::MessageDigest,
        nid::Nid,
        pkey::{PKey, Private},
        stack::Stack,
        x509::{
            extension::BasicConstraints, store::X509StoreRef, X509Builder, X509NameBuilder,
            X509StoreContext, X509,
        },
    };

    use crate::validation::Config;

    use super::*;

    fn certificate_authority(common_name: &str) -> anyhow::Result<(PKey<Private>, X509)> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)?;
        let key = PKey::from_ec_key(EcKey::generate(&group)?)?;
        let mut name = X509NameBuilder::new()?;
        name.append_entry_by_nid(Nid::COMMONNAME, common_name)?;
        let name = name.build();
        let mut builder = X509Builder::new()?;
        builder.set_version(2)?;
        builder.set_subject_name(&name)?;
        builder.set_issuer_name(&name)?;
        builder.set_pubkey(&key)?;
        let not_before = Asn1Time::days_from_now(0)?;
        let not_after = Asn1Time::days_from_now(1)?;
        builder.set_not_before(&not_before)?;
        builder.set_not_after(&not_after)?;
        let constraints = BasicConstraints::new().critical().ca().build()?;
        builder.append_extension(constraints)?;
        builder.sign(&key, MessageDigest::sha256())?;
        Ok((key, builder.build()))
    }

    fn verifies(store: &X509StoreRef, certificate: &X509) -> anyhow::Result<bool> {
        let chain = Stack::new()?;
        let mut context = X509StoreContext::new()?;
        Ok(context.init(store, certificate, &chain, |context| context.verify_cert())?)
    }

    #[test]
    fn truststore_excludes_system_certificates() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;

        // Stand in for the system trust anchors read by the default verify paths.
        let (_, system_ca) = certificate_authority("System CA")?;
        let system_bundle = dir.path().join("system.pem");
        std::fs::write(&system_bundle, system_ca.to_pem()?)?;
        std::env::set_var("SSL_CERT_FILE", &system_bundle);

        let (key, truststore_ca) = certificate_authority("Truststore CA")?;
        let pkcs12 = Pkcs12::builder()
            .name("truststore")
            .pkey(&key)
            .cert(&truststore_ca)
            .build2("changeit")?;
        let path = dir.path().join("truststore.p12");
        std::fs::write(&path, pkcs12.to_der()?)?;

        let context = TrustStore::new(path, "changeit".into())
            .ssl_connector()?
            .into_context();
        assert!(verifies(context.cert_store(), &truststore_ca)?);
        assert!(!verifies(context.cert_store(), &system_ca)?);
        Ok(())
    }

    #[test]
    fn wrong_truststore_password() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let (key, ca) = certificate_authority("Truststore CA")?;
        let pkcs12 = Pkcs12::builder()
            .name("truststore")
            .pkey(&key)
            .cert(&ca)
            .build2("changeit")?;
        let path = dir.path().join("truststore.p12");
        std::fs::write(&path, pkcs12.to_der()?)?;

        let store = TrustStore::new(path, "hunter2".into());
        assert!(matches!(store.ssl_connector(), Err(ValidationError::SslErrors(_))));
        Ok(())
    }

    #[test]
    fn explicit_path() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("client.toml");
        std::fs::write(
            &path,
            r#"
hosts = ["node1.example.com", "node2.example.com"]
port = 9443
truststore = "/etc/signserver/truststore.p12"

[request_timeout]
secs = 5
nanos = 0
"#,
        )?;

        let config: Config = load_config(Some(path), Path::new("signserver/client.toml"))?;
        assert_eq!(config.hosts, ["node1.example.com", "node2.example.com"]);
        assert_eq!(config.port, Some(9443));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(
            config.truststore,
            Some(PathBuf::from("/etc/signserver/truststore.p12"))
        );
        Ok(())
    }

    #[test]
    fn invalid_file() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("client.toml");
        std::fs::write(&path, "hosts = 42\n")?;

        let result: anyhow::Result<Config> =
            load_config(Some(path), Path::new("signserver/client.toml"));
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn display_round_trips() -> anyhow::Result<()> {
        let config = Config::default();
        let parsed: Config = toml::from_str(&config.to_string())?;
        assert_eq!(parsed.hosts, config.hosts);
        assert_eq!(parsed.request_timeout, config.request_timeout);
        Ok(())
    }

    #[test]
    fn missing_truststore() {
        let store = TrustStore::new(PathBuf::from("/nonexistent/truststore.p12"), "changeit".into());
        assert!(matches!(store.ssl_connector(), Err(ValidationError::Io(_))));
    }

    #[test]
    fn truststore_password_is_redacted() {
        let store = TrustStore::new(PathBuf::from("truststore.p12"), "changeit".into());
        assert!(!format!("{store:?}").contains("changeit"));
    }
}
