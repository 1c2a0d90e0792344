#![forbid(unsafe_code)]

//! Command-line support for the `simbook` binary.
//!
//! Loads and saves JSON card images and builds the serializable reports the
//! binary prints.

/// Card image files and phonebook reports.
///
/// Opens a phonebook session over an image file, applies edits and writes
/// the modified image back.
pub mod card_file;
