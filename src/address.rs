//! Block addressing: the paired Track/Sector + LBA representation shared
//! by every other component.
//!
//! Grounded on `cbmimage_blockaddress`/`cbmimage_track_sector`
//! (`examples/original_source/include/cbmimage.h`) and the conversion
//! routines in `examples/original_source/lib/blockaddress.c`. Resolving a
//! `BlockAddress` from Track/Sector or LBA, and advancing it, requires the
//! active [`crate::image::Frame`]'s geometry; those operations live on
//! `Image`/`Frame` (see `src/image.rs`) rather than here, matching the
//! DESIGN NOTES' "advance vs follow" separation: this module only owns the
//! plain data pair.
#![warn(missing_docs)]
#![warn(unsafe_code)]

use std::fmt;

/// A block address, valid in both the Track/Sector and LBA
/// representations at all times.
///
/// `track == 0` or `lba == 0` denotes "unused/invalid" (see
/// [`BlockAddress::UNUSED`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockAddress {
    /// 1-based track number, or 0 if unused.
    pub track: u8,
    /// 0-based sector number within the track.
    pub sector: u8,
    /// 1-based logical block address, or 0 if unused.
    pub lba: u16,
}

impl BlockAddress {
    /// The sentinel "no block" address, matching `cbmimage_block_unused`.
    pub const UNUSED: BlockAddress = BlockAddress {
        track: 0,
        sector: 0,
        lba: 0,
    };

    /// Build a block address directly from its three fields, without
    /// validating it against any geometry. Used by parsers and by the
    /// geometry layer once it has already done the range check.
    pub fn new(track: u8, sector: u8, lba: u16) -> Self {
        BlockAddress { track, sector, lba }
    }

    /// True if this address names no real block.
    pub fn is_unused(&self) -> bool {
        self.track == 0 || self.lba == 0
    }

    /// Rebase this address by `delta`, the way a relative sub-partition's
    /// blocks are mapped back into the parent frame's coordinates.
    ///
    /// Grounded on `cbmimage_blockaddress_add`
    /// (`examples/original_source/lib/blockaddress.c`): if `delta` is
    /// unused this is a no-op; if `self` is unused it becomes `delta`;
    /// otherwise `self.lba := self.lba + delta.lba - 1`. The caller is
    /// responsible for recomputing `track`/`sector` from the new `lba` via
    /// the active frame's geometry (`Image::from_lba`), since this type
    /// alone cannot perform that inverse lookup.
    pub fn add_lba(&self, delta: BlockAddress) -> BlockAddress {
        if delta.lba == 0 {
            *self
        } else if self.lba == 0 {
            delta
        } else {
            BlockAddress {
                track: self.track,
                sector: self.sector,
                lba: self.lba + delta.lba - 1,
            }
        }
    }
}

impl fmt::Display for BlockAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}({:#05X})", self.track, self.sector, self.lba)
    }
}
