//! # tern-core
//!
//! Core types, traits, configuration, and error handling for the Tern bot.

pub mod config;
pub mod error;
pub mod keyboard;
pub mod message;
pub mod traits;

pub use config::shellexpand;
