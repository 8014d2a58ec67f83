// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! CLI module for SqlGraph
//!
//! Inspects the topology stored in a SQLite database: the committed
//! catalog, drift against the live tables, and the change log.

pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{Cli, Commands};
pub use handlers::{handle_log, handle_show, handle_validate};
