//! USIM phonebook reconciliation engine.
//!
//! Reads the phonebook reference file and the address, index-pointer, email
//! and additional-number files it names, joins them into normalized entries
//! and keeps them consistent with the card while single fields are edited.

#![warn(missing_docs)]

pub mod cli;
pub mod primitives;
pub mod storage;
pub mod types;
