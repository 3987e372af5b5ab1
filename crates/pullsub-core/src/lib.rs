//! # pullsub-core
//!
//! Core crate for pullsub. Contains the transport boundary (trait and
//! notification shapes), configuration schemas, typed identifiers,
//! identity persistence, and the unified error system.
//!
//! This crate has **no** internal dependencies on other pullsub crates.

pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
