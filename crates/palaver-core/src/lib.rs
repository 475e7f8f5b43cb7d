//! Core types and trait definitions for Palaver.
//!
//! Free of HTTP and database dependencies; every other crate in the
//! workspace builds on it.

pub mod conversation;
pub mod cursor;
pub mod error;
pub mod generation;
pub mod message;
pub mod page;
pub mod store;
pub mod user;

pub use error::{Error, Result};
