// file: src/logging/mod.rs
// version: 2.0.0
// guid: i9j0k1l2-m3n4-5678-9012-345678ijklmn

//! Logging for host provisioning

pub mod logger;

pub use logger::init_logger;
