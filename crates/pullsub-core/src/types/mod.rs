//! Core type definitions used across the pullsub workspace.

pub mod id;

pub use id::*;
