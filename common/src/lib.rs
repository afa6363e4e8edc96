//! Shared pieces of the rawsock workspace: the error taxonomy, the
//! process-wide socket constant tables, and the byte-order helpers.
//!
//! Nothing in this crate performs I/O.

pub mod byteorder;
pub mod consts;
pub mod error;
