//! Test utilities for SqlGraph integration tests
//!
//! - TopologyFixture: a topology over a temporary SQLite database
//! - EventRecorder: a listener keeping every event it receives

#![allow(dead_code)]

pub mod event_recorder;
pub mod topology_fixture;
