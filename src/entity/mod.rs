//! SeaORM entities.

pub mod bill;
pub mod processing_log;
