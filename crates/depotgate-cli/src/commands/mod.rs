//! Command handlers

pub mod cache;
pub mod resolve;
