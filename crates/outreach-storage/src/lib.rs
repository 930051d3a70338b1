//! Outreach Storage - Database access layer
//!
//! This crate provides the Postgres-backed persistence for Outreach:
//! connection pooling, entity models, per-entity repositories, and the
//! `CampaignStore` capability the execution engine runs against.

pub mod db;
pub mod models;
pub mod repository;
pub mod store;

pub use db::{Database, DatabasePool};
pub use models::*;
pub use repository::*;
pub use store::{CampaignStore, PgCampaignStore, StoreResult};
