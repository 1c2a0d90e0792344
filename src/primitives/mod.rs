//! Low-level primitives for talking to a card.
//!
//! Includes byte codecs, the asynchronous record I/O boundary and the
//! completion tickets that turn each request into a blocking round trip.

/// Byte-level utilities and encoding/decoding.
///
/// TLV scanning plus the GSM alphabet and BCD number codecs.
pub mod bytes;

/// Concurrency primitives and synchronization.
///
/// Single-shot tickets delivering the outcome of one card request.
pub mod concurrency;

/// I/O abstractions and utilities.
///
/// The record-oriented storage collaborator and an in-memory card.
pub mod io;
