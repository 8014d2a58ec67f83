// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! SqlGraph CLI entry point

use clap::Parser;
use colored::Colorize;

mod cli;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // -v/--verbose takes precedence over --log-level; RUST_LOG still applies
    let log_level = if cli.verbose {
        log::LevelFilter::Debug
    } else if let Some(level) = cli.log_level {
        level.to_level_filter()
    } else {
        log::LevelFilter::Warn
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    match cli.command {
        Commands::Version => {
            println!("{} {}", "SqlGraph".bold().green(), sqlgraph::VERSION);
            println!("Transactional topology engine for SQL-backed graphs");
            Ok(())
        }

        Commands::Show {
            path,
            schema,
            format,
        } => cli::handle_show(path, schema, format),

        Commands::Validate { path, format } => cli::handle_validate(path, format),

        Commands::Log {
            path,
            since,
            format,
        } => cli::handle_log(path, since, format),
    }
}
