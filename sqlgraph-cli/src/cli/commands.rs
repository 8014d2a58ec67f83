// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Command-line arguments

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "sqlgraph",
    version,
    about = "Inspect SqlGraph topologies stored in SQLite",
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<log::Level>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the version
    Version,

    /// Show schemas, labels, properties and edge roles
    Show {
        /// SQLite database file
        #[arg(long, short = 'p', value_name = "DB")]
        path: PathBuf,

        /// Only show this schema
        #[arg(long, short = 's')]
        schema: Option<String>,

        #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Compare the committed topology with the live tables
    Validate {
        #[arg(long, short = 'p', value_name = "DB")]
        path: PathBuf,

        #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Print the structural change log
    Log {
        #[arg(long, short = 'p', value_name = "DB")]
        path: PathBuf,

        /// Only entries after this log id
        #[arg(long, default_value_t = 0)]
        since: i64,

        #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}
