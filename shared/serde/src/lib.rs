//! # Entsync Serde
//! Big-endian byte serialization for the entsync wire protocol.
//!
//! Integers are fixed width and big-endian, strings are u32-length-prefixed
//! UTF-8, sequences are u32-count-prefixed and optional values are preceded by
//! a presence byte.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod byte_reader;
mod byte_writer;
mod collections;
mod error;
mod number;
mod serde;

pub use byte_reader::ByteReader;
pub use byte_writer::{ByteCounter, ByteWrite, ByteWriter};
pub use error::SerdeErr;
pub use serde::{byte_length, Serde};
