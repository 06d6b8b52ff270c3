//! Energy Bill Server library.
//!
//! Core functionality for the bill ingestion service: database operations,
//! the extraction gateway, the ingestion pipeline, and the HTTP API.

pub mod api;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod services;
