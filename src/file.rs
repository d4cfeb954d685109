//! Loading image buffers from the host filesystem.
//!
//! This is test/example scaffolding, not part of the validation engine's
//! public contract: [`crate::image::Image::open`] takes a byte slice, so a
//! caller embedding the engine in something other than a CLI never needs
//! this module.
#![warn(missing_docs)]
#![warn(unsafe_code)]

use std::{fs, result::Result};

use crate::error::Error;

/// Read an entire file into a byte vector.
///
/// # Examples
///
/// ```
/// use std::fs::OpenOptions;
/// use std::io::Write;
/// use cbmimage::file::read_file;
///
/// let filename = "cbmimage-doctest-read_file.img";
/// {
///     let mut file = OpenOptions::new()
///         .create(true)
///         .write(true)
///         .truncate(true)
///         .open(filename)
///         .unwrap();
///     file.write_all(&[1, 2, 3, 4]).unwrap();
/// }
///
/// let data = read_file(filename).unwrap();
/// assert_eq!(data, vec![1, 2, 3, 4]);
///
/// std::fs::remove_file(filename).unwrap();
/// ```
pub fn read_file(filename: &str) -> Result<Vec<u8>, Error> {
    Ok(fs::read(filename)?)
}
