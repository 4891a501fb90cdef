// src/lib.rs
pub mod api;
pub mod config;
pub mod metrics;
pub mod monitor;
pub mod probe;
pub mod server;
pub mod storage;
