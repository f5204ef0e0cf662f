//! Transparent proxy between an AcuLink bridge and `acu-link.com`.
//!
//! Plaintext uploads go through [`interceptor`], which forwards them to the
//! vendor and queues the POST bodies for decoding. The encrypted channel goes
//! through [`relay`] byte for byte.

pub mod config;
pub mod database;
pub mod interceptor;
pub mod relay;
pub mod repository;
pub mod services;
