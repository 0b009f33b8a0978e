//! Tolerant decoding of backend result frames.
//!
//! A result frame should hold a JSON array of paths, or an object with a
//! `results` array. Backends in the wild also double-encode that JSON into a
//! string. [`decode`] accepts all of these and never fails: anything it
//! cannot make sense of becomes an empty [`ResultSet`] and a log line.

pub mod decoder;
pub mod error;
pub mod result_set;

pub use decoder::{decode, decode_bytes, try_decode};
pub use error::{DecodeError, Result};
pub use result_set::ResultSet;
