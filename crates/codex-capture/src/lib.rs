//! codex-capture - observational capture of LLM exchanges
//!
//! This crate sits between a CLI agent and a local model server, records
//! every request/response pair it sees, and rebuilds the assistant's output
//! from streamed deltas so the exchange can be inspected afterwards.

pub mod capture;
pub mod config;
pub mod error;
pub mod proxy;
pub mod testing;

pub use error::{CaptureError, Result};
