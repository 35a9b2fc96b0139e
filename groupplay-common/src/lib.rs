//! # GroupPlay Common Library
//!
//! Shared code for the GroupPlay workspace:
//! - Group and notification target identifiers
//! - Notification and event types (GroupEvent enum) with the EventBus
//! - Configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod group;

pub use error::{Error, Result};
pub use group::{GroupId, NotifyTarget};
