//! WellWork — well-being check-in service with AI enrichment.

pub mod api;
pub mod cache;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod generation;
pub mod model;
pub mod notify;
pub mod prompt;
pub mod service;
pub mod store;
