pub mod auth;
pub mod codec;
pub mod config;
pub mod db;
pub mod errors;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod query;
pub mod rest;
pub mod severity;
