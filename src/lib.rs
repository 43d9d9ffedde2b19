pub mod api;
pub mod auth_middleware;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod metrics;
pub mod model;
pub mod persistence;
pub mod query;
pub mod worker;
