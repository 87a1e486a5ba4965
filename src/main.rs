// src/main.rs

use anyhow::Result;
use std::process::ExitCode;
use content_index::commands;

fn main() -> Result<ExitCode> {
    commands::run_cli()
}
