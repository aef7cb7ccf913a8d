// SPDX-License-Identifier: MIT
// Copyright (c) Microsoft Corporation.

use std::{path::PathBuf, process::ExitCode};

use anyhow::Context;
use clap::Parser;
use signserver::{
    cli::{self, Cli, Command, CommandError},
    config::load_config,
    validation::{Config, RETURN_BAD_ARGUMENT, RETURN_ERROR},
};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, EnvFilter};

// The path, relative to $CONFIGURATION_DIRECTORY, of the default config file location.
const DEFAULT_CONFIG: &str = "signserver/client.toml";

// Negative codes wrap the way the shell reports them: -1 is 255, -2 is 254.
fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(code as u8)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let opts = match Cli::try_parse() {
        Ok(opts) => opts,
        Err(error) => {
            let _ = error.print();
            return if error.use_stderr() {
                exit_code(RETURN_BAD_ARGUMENT)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if let Err(error) = setup_logging(&opts.log_filter) {
        eprintln!("Error: {error:?}");
        return exit_code(RETURN_BAD_ARGUMENT);
    }

    let config = match load_config::<Config>(opts.config, PathBuf::from(DEFAULT_CONFIG).as_path())
    {
        Ok(config) => config,
        Err(error) => {
            eprintln!("Error: {error:?}");
            return exit_code(RETURN_ERROR);
        }
    };

    match opts.command {
        Command::Config => {
            println!(
                "# This is the current configuration\n\n{config}\n# This concludes the configuration.\n"
            );
            ExitCode::SUCCESS
        }
        Command::ValidateCertificate(args) => {
            let mut stdout = std::io::stdout();
            match cli::validate_certificate(&args, &config, &mut stdout).await {
                Ok(code) => exit_code(code),
                Err(error @ CommandError::IllegalArguments(_)) => {
                    eprintln!("Error, {error}.");
                    eprintln!("Run 'signclient validatecertificate --help' for usage.");
                    exit_code(error.exit_code())
                }
                Err(CommandError::Failure(error)) => {
                    eprintln!("Error: {error:?}");
                    exit_code(RETURN_ERROR)
                }
            }
        }
    }
}

fn setup_logging(log_filter: &str) -> anyhow::Result<()> {
    // Unfortunately we can't use clap's value_parser since EnvFilter does not
    // implement Clone.
    let log_filter = EnvFilter::builder().parse(log_filter).context(
        "SIGNCLIENT_LOG contains an invalid log directive; refer to \
            https://docs.rs/tracing-subscriber/0.3.19/tracing_subscriber/\
            filter/struct.EnvFilter.html#directives for format details.",
    )?;
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(log_filter);
    tracing::subscriber::set_global_default(registry)
        .context("Programming error: set_global_default should only be called once.")
}
