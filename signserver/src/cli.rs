// SPDX-License-Identifier: MIT
// Copyright (c) Microsoft Corporation.

//! Define the command-line interface of `signclient`.
//!
//! This is where subcommands, the arguments, and their types are defined, along with turning
//! validated arguments into a validation request and its exit code.

use std::{
    fmt::Display,
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use clap::Parser;

use crate::{
    config::TrustStore,
    validation::{
        Certificate, ClusterClient, Config, Encoding, ValidationTransport, DEFAULT_PORT,
        DEFAULT_TLS_PORT, RETURN_BAD_ARGUMENT, RETURN_ERROR,
    },
};

const EXIT_CODES: &str = "\
The following values are returned by the program and can be used when scripting.
Negative values are reported by the shell modulo 256 (-2 is 254, -1 is 255).
  -2   : Error happened during execution
  -1   : Bad arguments
   0   : Certificate is valid
   1   : Certificate is revoked
   2   : Certificate is not yet valid
   3   : Certificate has expired
   4   : Certificate doesn't verify
   5   : CA certificate has been revoked
   6   : CA certificate is not yet valid
   7   : CA certificate has expired
   8   : Certificate has no valid certificate purpose

Sample usages:
a) signclient validatecertificate --service CertValidationWorker --hosts localhost --cert certificate.pem
b) signclient validatecertificate --service 5806 --hosts localhost --cert certificate.pem --truststore truststore.p12 --truststorepwd changeit";

/// The SignServer client.
///
/// Validate certificates against a SignServer validation service. The result is printed and
/// reported through the exit code, so the client can be used from scripts.
///
/// Connection defaults (hosts, port, timeout, truststore) can be provided with a configuration
/// file. To view the current configuration, run the `config` subcommand.
#[derive(Debug, Parser)]
#[command(name = "signclient", version)]
pub struct Cli {
    /// The path to the client's configuration file.
    ///
    /// If no path is provided, the configuration file at
    /// $CONFIGURATION_DIRECTORY/signserver/client.toml is used, if it exists. If it does not
    /// exist, the configuration defaults are used.
    #[arg(long, short, env = "SIGNCLIENT_CONFIG")]
    pub config: Option<PathBuf>,

    /// A set of one or more comma-separated directives to filter logs.
    ///
    /// The general format is "target_name[span_name{field=value}]=level" where level is
    /// one of TRACE, DEBUG, INFO, WARN, ERROR.
    ///
    /// Details: https://docs.rs/tracing-subscriber/0.3.19/tracing_subscriber/filter/struct.EnvFilter.html#directives
    #[arg(long, env = "SIGNCLIENT_LOG", default_value = "WARN,signserver=INFO")]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Request a certificate to get validated.
    #[command(name = "validatecertificate", after_help = EXIT_CODES)]
    ValidateCertificate(ValidateCertificate),

    /// See the current configuration, or the defaults if no configuration file is supplied.
    Config,
}

#[derive(clap::Args, Debug)]
pub struct ValidateCertificate {
    /// The name or id of the validation service to process the request.
    #[arg(long, value_name = "SERVICE-NAME")]
    pub service: String,

    /// Path to the certificate file (DER or PEM).
    #[arg(long, value_name = "CERT-FILE")]
    pub cert: PathBuf,

    /// A ',' separated list of the hostnames of the validation service nodes.
    ///
    /// For example, 'host1.someorg.org,host2.someorg.org'. The nodes are tried in order until
    /// one answers. Overrides the hosts in the configuration file.
    #[arg(long, value_delimiter = ',', value_name = "HOSTS")]
    pub hosts: Vec<String>,

    /// Remote port of the service (default is 8080, or 8442 for TLS).
    #[arg(long)]
    pub port: Option<u16>,

    /// A ',' separated list of requested certificate purposes.
    #[arg(long = "certpurposes", value_name = "CERTPURPOSES")]
    pub cert_purposes: Option<String>,

    /// The certificate is in PEM format (default).
    #[arg(long, conflicts_with = "der")]
    pub pem: bool,

    /// The certificate is in DER format.
    #[arg(long)]
    pub der: bool,

    /// Don't produce any output, only the exit code.
    #[arg(long)]
    pub silent: bool,

    /// Path to a PKCS#12 truststore containing the CA certificates of the nodes' TLS certificates.
    ///
    /// TLS is used only when a truststore is provided, and requires --truststorepwd.
    #[arg(long, value_name = "P12-FILE")]
    pub truststore: Option<PathBuf>,

    /// Password to unlock the truststore.
    #[arg(
        long = "truststorepwd",
        env = "SIGNCLIENT_TRUSTSTORE_PASSWORD",
        hide_env_values = true,
        value_name = "PASSWORD"
    )]
    pub truststore_password: Option<String>,
}

/// The outcome of a failed command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The arguments are invalid; the user needs to correct them.
    #[error("{0}")]
    IllegalArguments(String),

    /// The command failed while executing.
    #[error(transparent)]
    Failure(#[from] anyhow::Error),
}

impl CommandError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CommandError::IllegalArguments(_) => RETURN_BAD_ARGUMENT,
            CommandError::Failure(_) => RETURN_ERROR,
        }
    }
}

/// Connection settings after merging arguments with the configuration file.
#[derive(Debug)]
pub struct Settings {
    pub hosts: Vec<String>,
    pub port: u16,
    pub request_timeout: Duration,
    pub truststore: Option<TrustStore>,
    pub encoding: Encoding,
    /// The requested certificate purposes, comma separated with blanks removed.
    pub purposes: Option<String>,
}

impl ValidateCertificate {
    /// Check the arguments and merge them with the configuration.
    ///
    /// Arguments take precedence over the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::IllegalArguments`] if a required value is missing, the truststore
    /// options are incomplete, or a referenced file isn't a readable regular file.
    pub fn resolve(&self, config: &Config) -> Result<Settings, CommandError> {
        if self.service.trim().is_empty() {
            return Err(CommandError::IllegalArguments(
                "a name or id of the validation service must be specified with the --service option"
                    .to_string(),
            ));
        }

        let hosts = (if self.hosts.is_empty() {
            &config.hosts
        } else {
            &self.hosts
        })
        .iter()
        .map(|host| host.trim())
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();
        if hosts.is_empty() {
            return Err(CommandError::IllegalArguments(
                "at least one validation service host must be specified".to_string(),
            ));
        }

        let truststore_path = self.truststore.clone().or_else(|| config.truststore.clone());
        let truststore = match (truststore_path, &self.truststore_password) {
            (Some(path), Some(password)) => {
                readable_file(
                    &path,
                    "the truststore must be a readable PKCS#12 file",
                )?;
                Some(TrustStore::new(path, password.clone()))
            }
            (None, None) => None,
            _ => {
                return Err(CommandError::IllegalArguments(
                    "if TLS is going to be used, both --truststore and --truststorepwd must be specified"
                        .to_string(),
                ))
            }
        };

        let port = self.port.or(config.port).unwrap_or(if truststore.is_some() {
            DEFAULT_TLS_PORT
        } else {
            DEFAULT_PORT
        });

        let purposes = self
            .cert_purposes
            .as_deref()
            .map(|purposes| {
                let purposes = purposes
                    .split(',')
                    .map(str::trim)
                    .filter(|purpose| !purpose.is_empty())
                    .collect::<Vec<_>>();
                if purposes.is_empty() {
                    Err(CommandError::IllegalArguments(
                        "at least one usage must be specified with --certpurposes".to_string(),
                    ))
                } else {
                    Ok(purposes.join(","))
                }
            })
            .transpose()?;

        readable_file(
            &self.cert,
            "the certificate file must exist and be readable by the user",
        )?;

        Ok(Settings {
            hosts,
            port,
            request_timeout: config.request_timeout,
            truststore,
            encoding: self.encoding(),
            purposes,
        })
    }

    pub fn encoding(&self) -> Encoding {
        if self.der {
            Encoding::Der
        } else {
            Encoding::Pem
        }
    }
}

fn readable_file(path: &Path, message: &str) -> Result<(), CommandError> {
    let is_file = std::fs::File::open(path)
        .and_then(|file| file.metadata())
        .is_ok_and(|metadata| metadata.is_file());
    if is_file {
        Ok(())
    } else {
        Err(CommandError::IllegalArguments(format!(
            "{message} ({})",
            path.display()
        )))
    }
}

/// Run the `validatecertificate` command.
///
/// Returns the exit code for the certificate's validation status.
pub async fn validate_certificate(
    args: &ValidateCertificate,
    config: &Config,
    out: &mut dyn Write,
) -> Result<i32, CommandError> {
    let settings = args.resolve(config)?;
    tracing::debug!(?settings, "Resolved connection settings");

    let tls = settings
        .truststore
        .as_ref()
        .map(TrustStore::ssl_connector)
        .transpose()
        .context("failed to set up trust from the truststore")?;
    let client = ClusterClient::new(
        settings.hosts,
        settings.port,
        settings.request_timeout,
        tls,
    );
    let certificate = Certificate::load(&args.cert, settings.encoding).with_context(|| {
        format!(
            "certificate in file {} not read successfully",
            args.cert.display()
        )
    })?;

    report(
        &client,
        &args.service,
        &certificate,
        settings.purposes.as_deref(),
        Printer::new(out, args.silent),
    )
    .await
}

/// Writes output lines unless running silently.
pub struct Printer<'a> {
    out: &'a mut dyn Write,
    silent: bool,
}

impl<'a> Printer<'a> {
    pub fn new(out: &'a mut dyn Write, silent: bool) -> Self {
        Self { out, silent }
    }

    fn line(&mut self, line: impl Display) -> anyhow::Result<()> {
        if !self.silent {
            writeln!(self.out, "{line}")?;
        }
        Ok(())
    }
}

/// Validate `certificate` with `transport`, printing the certificate and the result.
///
/// Returns the exit code for the validation status.
pub async fn report<T: ValidationTransport>(
    transport: &T,
    service: &str,
    certificate: &Certificate,
    requested_purposes: Option<&str>,
    mut printer: Printer<'_>,
) -> Result<i32, CommandError> {
    printer.line("Validating certificate with:")?;
    printer.line(format_args!("  Subject    : {}", certificate.subject()))?;
    printer.line(format_args!("  Issuer     : {}", certificate.issuer()))?;
    printer.line(format_args!("  Valid From : {}", certificate.not_before()))?;
    printer.line(format_args!("  Valid To   : {}", certificate.not_after()))?;
    printer.line("")?;

    let response = transport
        .validate(service, certificate, requested_purposes)
        .await
        .context("error occurred during validation")?;

    printer.line("Valid Certificate Purposes:")?;
    printer.line(format_args!(
        "  {}",
        response.valid_purposes.as_deref().unwrap_or_default()
    ))?;
    printer.line("Certificate Status:")?;
    printer.line(format_args!("  {}", response.status))?;

    Ok(response.status.exit_code())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use openssl::{
        asn1::Asn1Time,
        ec::{EcGroup, EcKey},
        hash::MessageDigest,
        nid::Nid,
        pkey::PKey,
        x509::{X509Builder, X509NameBuilder},
    };

    use super::*;
    use crate::{
        error::ValidationError,
        validation::{Status, ValidateResponse},
    };

    struct Fixed(Result<ValidateResponse, ()>);

    impl ValidationTransport for Fixed {
        async fn validate(
            &self,
            _service: &str,
            _certificate: &Certificate,
            _requested_purposes: Option<&str>,
        ) -> Result<ValidateResponse, ValidationError> {
            self.0.clone().map_err(|()| ValidationError::NoServerAvailable)
        }
    }

    fn certificate() -> anyhow::Result<Certificate> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)?;
        let key = PKey::from_ec_key(EcKey::generate(&group)?)?;
        let mut name = X509NameBuilder::new()?;
        name.append_entry_by_nid(Nid::ORGANIZATIONNAME, "Example Org")?;
        name.append_entry_by_nid(Nid::COMMONNAME, "Report Test")?;
        let name = name.build();
        let mut builder = X509Builder::new()?;
        builder.set_version(2)?;
        builder.set_subject_name(&name)?;
        builder.set_issuer_name(&name)?;
        builder.set_pubkey(&key)?;
        let not_before = Asn1Time::from_unix(1_700_000_000)?;
        let not_after = Asn1Time::from_unix(1_731_536_000)?;
        builder.set_not_before(&not_before)?;
        builder.set_not_after(&not_after)?;
        builder.sign(&key, MessageDigest::sha256())?;
        Ok(Certificate::from_bytes(&builder.build().to_pem()?, Encoding::Pem)?)
    }

    fn args(cert: PathBuf) -> ValidateCertificate {
        ValidateCertificate {
            service: "CertValidationWorker".to_string(),
            cert,
            hosts: vec![],
            port: None,
            cert_purposes: None,
            pem: false,
            der: false,
            silent: false,
            truststore: None,
            truststore_password: None,
        }
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn pem_and_der_conflict() {
        let result = Cli::try_parse_from([
            "signclient",
            "validatecertificate",
            "--service",
            "5806",
            "--cert",
            "cert.der",
            "--pem",
            "--der",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn hosts_are_comma_separated() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "signclient",
            "validatecertificate",
            "--service",
            "5806",
            "--cert",
            "cert.der",
            "--der",
            "--hosts",
            "node1,node2",
        ])?;
        let Command::ValidateCertificate(args) = cli.command else {
            panic!("expected validatecertificate");
        };
        assert_eq!(args.hosts, ["node1", "node2"]);
        assert_eq!(args.encoding(), Encoding::Der);
        Ok(())
    }

    #[test]
    fn defaults_from_config() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let cert = dir.path().join("cert.pem");
        std::fs::write(&cert, "")?;

        let settings = args(cert).resolve(&Config::default())?;
        assert_eq!(settings.hosts, ["localhost"]);
        assert_eq!(settings.port, DEFAULT_PORT);
        assert!(settings.truststore.is_none());
        assert_eq!(settings.encoding, Encoding::Pem);
        Ok(())
    }

    #[test]
    fn arguments_override_config() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let cert = dir.path().join("cert.pem");
        std::fs::write(&cert, "")?;
        let config = Config {
            hosts: vec!["configured".to_string()],
            port: Some(9000),
            ..Default::default()
        };

        let mut args = args(cert);
        args.hosts = vec!["node1".to_string(), " ".to_string(), "node2".to_string()];
        args.port = Some(9001);
        let settings = args.resolve(&config)?;
        assert_eq!(settings.hosts, ["node1", "node2"]);
        assert_eq!(settings.port, 9001);
        Ok(())
    }

    #[test]
    fn truststore_selects_tls_port() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let cert = dir.path().join("cert.pem");
        let truststore = dir.path().join("truststore.p12");
        std::fs::write(&cert, "")?;
        std::fs::write(&truststore, "")?;

        let mut args = args(cert);
        args.truststore = Some(truststore);
        args.truststore_password = Some("changeit".to_string());
        let settings = args.resolve(&Config::default())?;
        assert_eq!(settings.port, DEFAULT_TLS_PORT);
        assert!(settings.truststore.is_some());
        Ok(())
    }

    #[test]
    fn truststore_requires_password() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let cert = dir.path().join("cert.pem");
        let truststore = dir.path().join("truststore.p12");
        std::fs::write(&cert, "")?;
        std::fs::write(&truststore, "")?;

        let mut only_store = args(cert.clone());
        only_store.truststore = Some(truststore);
        let error = only_store.resolve(&Config::default()).expect_err("no password");
        assert_eq!(error.exit_code(), RETURN_BAD_ARGUMENT);

        let mut only_password = args(cert);
        only_password.truststore_password = Some("changeit".to_string());
        let error = only_password.resolve(&Config::default()).expect_err("no truststore");
        assert_eq!(error.exit_code(), RETURN_BAD_ARGUMENT);
        Ok(())
    }

    #[test]
    fn certificate_must_be_a_file() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let error = args(dir.path().to_path_buf())
            .resolve(&Config::default())
            .expect_err("directory");
        assert!(matches!(error, CommandError::IllegalArguments(_)));

        let error = args(dir.path().join("missing.pem"))
            .resolve(&Config::default())
            .expect_err("missing");
        assert!(matches!(error, CommandError::IllegalArguments(_)));
        Ok(())
    }

    #[test]
    fn blank_purposes_are_rejected() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let cert = dir.path().join("cert.pem");
        std::fs::write(&cert, "")?;

        for blank in ["", " ", ", ,"] {
            let mut args = args(cert.clone());
            args.cert_purposes = Some(blank.to_string());
            let error = args.resolve(&Config::default()).expect_err("blank purposes");
            assert!(matches!(error, CommandError::IllegalArguments(_)));
        }

        let mut args = args(cert);
        args.cert_purposes = Some(" DIGITALSIGNATURE, ,KEYENCIPHERMENT ".to_string());
        let settings = args.resolve(&Config::default())?;
        assert_eq!(
            settings.purposes.as_deref(),
            Some("DIGITALSIGNATURE,KEYENCIPHERMENT")
        );
        Ok(())
    }

    #[test]
    fn no_hosts() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let cert = dir.path().join("cert.pem");
        std::fs::write(&cert, "")?;
        let config = Config {
            hosts: vec![],
            ..Default::default()
        };
        let error = args(cert).resolve(&config).expect_err("no hosts");
        assert_eq!(error.exit_code(), RETURN_BAD_ARGUMENT);
        Ok(())
    }

    #[tokio::test]
    async fn report_prints_result() -> anyhow::Result<()> {
        let transport = Fixed(Ok(ValidateResponse {
            valid_purposes: Some("DIGITALSIGNATURE,KEYENCIPHERMENT".to_string()),
            status: Status::Expired,
        }));
        let mut out = vec![];
        let code = report(
            &transport,
            "CertValidationWorker",
            &certificate()?,
            None,
            Printer::new(&mut out, false),
        )
        .await?;
        assert_eq!(code, 3);

        let out = String::from_utf8(out)?;
        assert_eq!(
            out,
            "Validating certificate with:\n\
             \x20 Subject    : CN=Report Test,O=Example Org\n\
             \x20 Issuer     : CN=Report Test,O=Example Org\n\
             \x20 Valid From : Nov 14 22:13:20 2023 GMT\n\
             \x20 Valid To   : Nov 13 22:13:20 2024 GMT\n\
             \n\
             Valid Certificate Purposes:\n\
             \x20 DIGITALSIGNATURE,KEYENCIPHERMENT\n\
             Certificate Status:\n\
             \x20 EXPIRED\n"
        );
        Ok(())
    }

    #[tokio::test]
    async fn silent_report() -> anyhow::Result<()> {
        let transport = Fixed(Ok(ValidateResponse {
            valid_purposes: None,
            status: Status::BadCertPurpose,
        }));
        let mut out = vec![];
        let code = report(
            &transport,
            "5806",
            &certificate()?,
            Some("CODESIGNING"),
            Printer::new(&mut out, true),
        )
        .await?;
        assert_eq!(code, 8);
        assert!(out.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn transport_failure() -> anyhow::Result<()> {
        let mut out = vec![];
        let error = report(
            &Fixed(Err(())),
            "5806",
            &certificate()?,
            None,
            Printer::new(&mut out, true),
        )
        .await
        .expect_err("no server");
        assert_eq!(error.exit_code(), RETURN_ERROR);
        Ok(())
    }
}
