//! geoacl host library crate.
//!
//! # Purpose
//! Exposes configuration, logging setup, YAML seeding and store/engine wiring
//! for use by the `geoacl` binary and tests.
//!
//! # Notes
//! The binary is a thin wrapper: parse flags, build [`app::AppState`], run one
//! query through [`cli::execute`], print the JSON result.
pub mod app;
pub mod cli;
pub mod config;
pub mod observability;
pub mod seed;
