//! Domain core for the Convene community platform.
//!
//! Channels gather subscribers under a bitmask permission model, meetings
//! run inside channels with capacity and feedback, and accounts carry a
//! personal channel from registration to deactivation. The crate exposes
//! typed services over PostgreSQL; a thin surface crate maps errors to
//! transport status codes.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod repository;
pub mod service;

#[cfg(test)]
pub mod test_helpers;

pub use config::Config;
pub use error::{Error, Result};
