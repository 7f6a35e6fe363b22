//! API route handlers

pub mod analytics;
pub mod sensing;
pub mod signals;
