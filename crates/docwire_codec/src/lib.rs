//! # docwire codec
//!
//! Native value model and bidirectional wire value codec.
//!
//! This crate provides:
//! - [`Value`], the native document value, including server-side
//!   [`FieldValue`] sentinels
//! - [`Timestamp`], [`GeoPoint`] and [`VectorValue`]
//! - [`FieldPath`], [`ResourcePath`] and [`DocumentRef`]
//! - [`WireValue`] and the [`encode`]/[`decode`] pair
//!
//! Everything here is pure: no I/O, no shared state, safe to call from any
//! number of transactions at once.
//!
//! ## Usage
//!
//! ```
//! use docwire_codec::{decode, encode, Timestamp, Value};
//!
//! let ts = Timestamp::new(-14_182_920, 123_000_123).unwrap();
//! let wire = encode(&Value::Timestamp(ts)).unwrap();
//! assert_eq!(decode(&wire).unwrap(), Value::Timestamp(ts));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod path;
mod timestamp;
mod value;
mod wire;

pub use decoder::{decode, decode_field, decode_fields};
pub use encoder::{
    encode, EncodeOptions, ValueEncoder, TYPE_FIELD, VECTOR_TYPE_TAG, VECTOR_VALUE_FIELD,
};
pub use error::{CodecError, CodecResult};
pub use path::{DatabaseId, DocumentRef, FieldPath, IntoFieldPath, ResourcePath, DOCUMENT_ID_FIELD};
pub use timestamp::{Timestamp, MAX_SECONDS, MIN_SECONDS};
pub use value::{FieldValue, GeoPoint, Map, Number, Value, VectorValue};
pub use wire::{ArrayValue, MapValue, WireValue};
