#![warn(missing_docs)]
#![warn(unsafe_code)]
//! cbmimage is a library crate to read, inspect and validate Commodore
//! disk image files: D64, D71, D81, D80, D82, D40, and the CMD native
//! partition containers D1M/D2M/D4M/DNP.
//!
//! [`image::Image::open`] classifies a buffer and resolves its
//! [`geometry::Geometry`]; [`dir::entries`] walks its directory;
//! [`reader::read_file`] reassembles a file's data from its block chain;
//! and [`validate::validate`] reconstructs a FAT by following every live
//! chain and cross-checks it against the BAM.
use log::error;

pub mod address;
pub mod bam;
pub mod chain;
pub mod config;
pub mod dir;
pub mod error;
pub mod fat;
pub mod file;
pub mod geometry;
pub mod image;
pub mod loop_detector;
pub mod reader;
pub mod validate;

/// Initialize the module.
/// This should be called before any parsing is performed.
/// Panics on failure or if there are any incompatibilities.
pub fn init() {
    // If we're on a system with a usize < 32 bits then fail.  This
    // crate is geared towards parsing file formats for 8-bit systems,
    // but the code currently does not run on 8-bit systems.  For
    // example, we read the entire file into a single image data array
    // and access the data array with usize indexes for several of the
    // file formats.
    if usize::BITS < 32 {
        error!(
            "Architecture usize {} is too small for this library",
            usize::BITS
        );
        panic!(
            "Architecture usize {} is too small for this library",
            usize::BITS
        );
    }
}
