//! Following a block chain: reading the 2-byte link header at the front of
//! each block and walking to the next one until the terminator.
//!
//! Grounded on `examples/original_source/lib/blockaccessor.c`
//! (`cbmimage_blockaccessor_get_next_block`/`_follow`) and
//! `lib/validate.c`'s `cbmimage_i_validate_follow_chain`.
#![warn(missing_docs)]
#![warn(unsafe_code)]

use crate::address::BlockAddress;
use crate::error::{ChainError, Error, ErrorKind};
use crate::image::Image;
use crate::loop_detector::LoopDetector;

/// The outcome of reading one block's link header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// The chain continues at this block address.
    Next(BlockAddress),
    /// This was the last block of the chain; the link sector byte encodes
    /// the number of valid data bytes in it (`0` means 256, per
    /// `cbmimage_blockaccessor_get_next_block`).
    End {
        /// Number of valid bytes in the terminal block, in `1..=256`.
        valid_bytes: u16,
    },
}

/// Read the 2-byte link header at the front of `block`'s data.
///
/// Grounded on `cbmimage_blockaccessor_get_next_block`: a link track of
/// `0` means "end of chain", and the link sector byte is then the valid
/// byte count (with `0` meaning 256, not zero bytes). Otherwise the link
/// must name a track/sector that exists in the active frame.
pub fn read_link(image: &Image, block: BlockAddress) -> Result<Link, Error> {
    let data = image.read_block(block)?;
    let link_track = data[0];
    let link_sector = data[1];

    if link_track == 0 {
        let valid_bytes = if link_sector == 0 { 256 } else { link_sector as u16 };
        return Ok(Link::End { valid_bytes });
    }

    let next = image
        .frame()
        .from_ts(link_track, link_sector)
        .map_err(|_| Error::new(ErrorKind::Chain(ChainError::MalformedLink)))?;

    Ok(Link::Next(next))
}

/// Follow a chain starting at `start`, calling `visit` with each block
/// address (including `start`) until the terminator, marking every block
/// in `loops` to catch cycles or blocks shared with another chain.
///
/// Grounded on `cbmimage_i_validate_follow_chain`: a block revisited by
/// `loops` aborts the walk with [`ChainError::LoopDetected`] rather than
/// looping forever.
pub fn follow<F: FnMut(BlockAddress, &[u8])>(
    image: &Image,
    start: BlockAddress,
    loops: &mut LoopDetector,
    mut visit: F,
) -> Result<(), Error> {
    let mut current = start;
    loop {
        if loops.mark(current.lba)? {
            return Err(Error::new(ErrorKind::Chain(ChainError::LoopDetected)));
        }

        let data = image.read_block(current)?;
        visit(current, data);

        match read_link(image, current)? {
            Link::End { .. } => return Ok(()),
            Link::Next(next) => current = next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn image_with_chain() -> Vec<u8> {
        let mut buf = vec![0u8; 683 * 256];
        // track 1 sector 0 -> track 1 sector 1
        buf[0] = 1;
        buf[1] = 1;
        // track 1 sector 1 -> end, 100 valid bytes
        let block2 = 256;
        buf[block2] = 0;
        buf[block2 + 1] = 100;
        buf
    }

    #[test]
    fn read_link_follows_to_next_block() {
        let buf = image_with_chain();
        let image = Image::open(&buf).unwrap();
        let start = image.frame().from_ts(1, 0).unwrap();
        match read_link(&image, start).unwrap() {
            Link::Next(addr) => assert_eq!((addr.track, addr.sector), (1, 1)),
            Link::End { .. } => panic!("expected Next"),
        }
    }

    #[test]
    fn read_link_reports_terminator_valid_bytes() {
        let buf = image_with_chain();
        let image = Image::open(&buf).unwrap();
        let second = image.frame().from_ts(1, 1).unwrap();
        match read_link(&image, second).unwrap() {
            Link::End { valid_bytes } => assert_eq!(valid_bytes, 100),
            Link::Next(_) => panic!("expected End"),
        }
    }

    #[test]
    fn terminator_zero_sector_means_256_valid_bytes() {
        let mut buf = vec![0u8; 683 * 256];
        buf[0] = 0;
        buf[1] = 0;
        let image = Image::open(&buf).unwrap();
        let start = image.frame().from_ts(1, 0).unwrap();
        match read_link(&image, start).unwrap() {
            Link::End { valid_bytes } => assert_eq!(valid_bytes, 256),
            Link::Next(_) => panic!("expected End"),
        }
    }

    #[test]
    fn follow_visits_every_block_and_stops_at_end() {
        let buf = image_with_chain();
        let image = Image::open(&buf).unwrap();
        let start = image.frame().from_ts(1, 0).unwrap();
        let mut loops = LoopDetector::new(683);
        let mut visited = vec![];
        follow(&image, start, &mut loops, |addr, _data| visited.push(addr.lba)).unwrap();
        assert_eq!(visited, vec![1, 2]);
    }

    #[test]
    fn follow_detects_a_self_loop() {
        let mut buf = vec![0u8; 683 * 256];
        // track 1 sector 0 links to itself
        buf[0] = 1;
        buf[1] = 0;
        let image = Image::open(&buf).unwrap();
        let start = image.frame().from_ts(1, 0).unwrap();
        let mut loops = LoopDetector::new(683);
        let result = follow(&image, start, &mut loops, |_, _| {});
        assert!(result.is_err());
    }

    #[test]
    fn malformed_link_to_nonexistent_sector_errors() {
        let mut buf = vec![0u8; 683 * 256];
        buf[0] = 1;
        buf[1] = 200; // track 1 only has 21 sectors
        let image = Image::open(&buf).unwrap();
        let start = image.frame().from_ts(1, 0).unwrap();
        let mut loops = LoopDetector::new(683);
        let result = follow(&image, start, &mut loops, |_, _| {});
        assert!(result.is_err());
    }
}
