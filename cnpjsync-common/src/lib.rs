//! # cnpjsync Common Library
//!
//! Shared code for the CNPJ/MCC synchronization service including:
//! - CNPJ validation and normalization
//! - Database schema and table access
//! - Lookup queries joining the three source tables
//! - Common error types

pub mod cnpj;
pub mod db;
pub mod error;

pub use error::{Error, Result};
