//! Reassembling a file's bytes from its block chain.
//!
//! Grounded on `examples/original_source/lib/file.c`
//! (`cbmimage_file_open_by_dir_entry`): each block contributes its 254
//! data bytes (256 minus the 2-byte link header), except the terminal
//! block, which contributes only the valid-byte count the link sector
//! byte encoded.
#![warn(missing_docs)]
#![warn(unsafe_code)]

use crate::chain::{self, Link};
use crate::dir::DirEntry;
use crate::error::Error;
use crate::image::Image;
use crate::loop_detector::LoopDetector;

/// Read the full contents of a file named by `entry`'s `start_block`
/// chain.
///
/// GEOS VLIR files are not reassembled by this function: their
/// `start_block` names a record map, not a data chain (see
/// [`crate::validate`] for VLIR-aware traversal).
pub fn read_file(image: &Image, entry: &DirEntry) -> Result<Vec<u8>, Error> {
    let max_lba = image.frame().geometry.total_blocks();
    let mut loops = LoopDetector::new(max_lba);
    let mut out = Vec::with_capacity(entry.block_count as usize * 254);

    chain::follow(image, entry.start_block, &mut loops, |_, data| {
        out.extend_from_slice(&data[2..]);
    })?;

    // Trim the terminal block down to its declared valid-byte count.
    //
    // Grounded on `cbmimage_file_read_next_block` (`lib/file.c`): the
    // caller's remaining-byte count is `ret - block_current_offset + 1`
    // with `block_current_offset == 2`, i.e. `ret - 1`, *except* `ret == 0`
    // (a full terminal block, `valid_bytes == 256` once `read_link` has
    // already turned the on-disk `0` into 256) which means all `0x100 - 2`
    // data bytes are valid, not `256 - 1`.
    let mut current = entry.start_block;
    loop {
        match chain::read_link(image, current)? {
            Link::Next(next) => current = next,
            Link::End { valid_bytes } => {
                let full_blocks_bytes = out.len().saturating_sub(254);
                let valid_data_bytes = if valid_bytes == 256 {
                    254
                } else {
                    (valid_bytes as usize).saturating_sub(1)
                };
                out.truncate(full_blocks_bytes + valid_data_bytes.min(254));
                break;
            }
        }
    }

    Ok(out)
}
