//! Database schema and table access

pub mod determined;
pub mod init;
pub mod lookup;
pub mod mapping;
pub mod registry;

pub use init::init_database;
