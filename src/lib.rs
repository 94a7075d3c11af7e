//! storefront-migrate - idempotent schema and seed migrations for the PC store.
//!
//! This library exposes the core modules for use in integration tests.

pub mod config;
pub mod db;
pub mod error;
pub mod inspect;
pub mod lint;
pub mod migrate;
