// SPDX-License-Identifier: MIT
// Copyright (c) Microsoft Corporation.

use std::{env, path::PathBuf};

use anyhow::anyhow;
use clap::CommandFactory;

const TASKS: [&str; 1] = ["manual"];

fn main() -> anyhow::Result<()> {
    match env::args()
        .nth(1)
        .ok_or(anyhow!("Must provide a task"))?
        .as_str()
    {
        "manual" => generate_manual(),
        _ => Err(anyhow!("Unknown task, use one of {:?}", TASKS)),
    }
}

// Writes signclient.1 plus one page per subcommand, e.g. signclient-validatecertificate.1.
fn generate_manual() -> anyhow::Result<()> {
    let mut root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    root.push("../");

    let outdir = root.join("signserver/docs/");
    std::fs::create_dir_all(&outdir)?;
    let command = signserver::cli::Cli::command();
    clap_mangen::generate_to(command, &outdir)?;
    println!("Wrote manual pages to {}", outdir.display());

    Ok(())
}
