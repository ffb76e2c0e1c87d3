//! Shared serialization utilities.
//!
//! The encoding scheme is deliberately small: little-endian fixed-width
//! primitives for values, and order-preserving big-endian transforms for
//! anything that ends up in a sortable position.

pub mod encoding;
pub mod sortable;

pub use encoding::{Decode, Encode, EncodingError};
