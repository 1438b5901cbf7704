//! Protocol module for conversation and request structures
//!
//! This module defines the canonical data models shared by the history, the
//! request builder and the provider adapters. They are:
//! - Provider-agnostic
//! - Immutable once recorded
//! - Serializable for the HTTP boundary

pub mod types;

pub use types::{CompletionRequest, Message, MessageRole};
