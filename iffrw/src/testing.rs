//! Utility functions for tests.

use std::io::Cursor;

use hex::decode;

/// Decodes a hex string (spaces and newlines ignored) into a seekable
/// cursor, for writing byte-level tests against literal wire data.
pub fn hex_to_cursor(data: &str) -> Cursor<Vec<u8>> {
    let data = data.replace(' ', "");
    let data = data.replace('\n', "");
    let data = decode(data).expect("while decoding hex data from string");
    Cursor::new(data)
}
