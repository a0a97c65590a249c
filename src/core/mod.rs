//! Core configuration and memory accounting

pub mod config;
pub mod memory;
