//! # cnpjsync - CNPJ/MCC Synchronization Service
//!
//! Keeps the local relational store synchronized with three
//! independently-versioned external sources:
//! - the government business-registry dump (zipped, multi-part)
//! - the card-scheme CNAE/MCC mapping spreadsheet
//! - the card-scheme determined-MCC list spreadsheet
//!
//! The orchestrator compares ledger versions against probed remote
//! versions and runs the matching fetch+ingest pipeline for each source
//! that changed, committing the new version only on verified success.

pub mod config;
pub mod fetch;
pub mod ingest;
pub mod ledger;
pub mod orchestrator;
pub mod probe;

pub use config::SyncConfig;
pub use ledger::{Source, VersionLedger};
