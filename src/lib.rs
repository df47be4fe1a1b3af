//! citadel - a local mirror of the Rick and Morty catalog API
//!
//! Reads resolve against the upstream API first, then the local SQLite
//! catalog, then fixed defaults. Upstream records are reconciled into the
//! catalog as they pass through, and bulk sweeps fill it page by page.

pub mod api;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod error;
pub mod health;
pub mod ledger;
pub mod models;
pub mod progress;
pub mod resolve;
pub mod sync;
