//! Reception Core - Shared types for raw material receptions.
//!
//! This crate provides the types shared by every reception component:
//! - `engine` - Consistency engine for pallet/box editing
//! - `cli` - Offline tooling over reception payloads
//!
//! # Architecture
//!
//! The core crate contains only types and helpers - no I/O, no persistence,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, the (product, lot) key and canonical decimals

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
