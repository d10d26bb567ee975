//! # Voxmill Common Library
//!
//! Shared code for the Voxmill speech services including:
//! - Error types
//! - Configuration loading and root folder resolution
//! - Event types (VoxEvent enum) and the EventBus
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
