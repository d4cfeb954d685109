//! Reading the Block Availability Map: per-track free/used bitmaps and
//! free-block counters, and the consistency checks the validator runs
//! against them.
//!
//! Grounded on `examples/original_source/lib/bam.c`
//! (`cbmimage_i_get_bam_of_track`/`cbmimage_i_get_bam_counter_of_track`/
//! `cbmimage_i_check_max_bam_of_track`). A bitmap bit of `1` means the
//! sector is free, matching the native on-disk convention; DNP's selectors
//! additionally reverse each byte's bit order before use.
#![warn(missing_docs)]
#![warn(unsafe_code)]

use crate::error::{Error, ErrorKind, StructureError};
use crate::geometry::Geometry;
use crate::image::Image;

fn reverse_bits(mut byte: u8) -> u8 {
    let mut out = 0u8;
    for _ in 0..8 {
        out <<= 1;
        out |= byte & 1;
        byte >>= 1;
    }
    out
}

/// The per-track BAM reading: how many sectors the bitmap claims are
/// free, and whether that count matches the separately stored counter
/// byte (when the format has one).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackBam {
    /// Track number this reading is for.
    pub track: u8,
    /// Free/used bit for each sector that exists on this track, `true`
    /// meaning free.
    pub free: [bool; 256],
    /// Number of sectors actually populated in `free` (the rest are
    /// padding past the end of the track).
    pub sector_count: u8,
    /// The free-block counter this format stores, if any.
    pub stored_free_count: Option<u8>,
    /// The bitmap bytes as stored on disk, before any bit-order reversal
    /// (DNP). Used only by [`TrackBam::looks_factory_blank`].
    raw_bitmap: Vec<u8>,
}

/// A per-sector classification, distinguishing a block that has simply
/// never been allocated from one that was used and freed again.
///
/// Grounded on SPEC_FULL.md §4.6's three-way `bam_get`: most formats only
/// ever need `Used`/`Free`, but a track whose whole BAM entry still carries
/// its factory-blank pattern (never written to since formatting) reports
/// every one of its sectors as `ReallyFree` rather than the bit-for-bit
/// `Free`/`Used` reading, since that raw pattern is not a valid bitmap at
/// all under the normal LSB-first convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BamState {
    /// The bitmap says this sector is allocated.
    Used,
    /// The bitmap says this sector is free, and the track's raw BAM entry
    /// is not the factory-blank pattern.
    Free,
    /// The track's raw BAM entry is the factory-blank pattern (all zero,
    /// or every byte from the bitmap's second byte onward is `0x01`);
    /// every sector of the track reads this way regardless of its
    /// individual bit.
    ReallyFree,
}

impl TrackBam {
    /// Number of bits in `free[..sector_count]` set to `true`.
    pub fn counted_free(&self) -> u8 {
        self.free[..self.sector_count as usize]
            .iter()
            .filter(|&&b| b)
            .count() as u8
    }
}

/// Read the BAM bitmap (and counter, if present) for `track`.
///
/// Grounded on `cbmimage_i_get_bam_of_track`/`cbmimage_i_get_bam_counter_of_track`:
/// the byte at `start_offset + (track - start_track) * bytes_per_track + i`
/// holds bits for sectors `i*8 .. i*8+7`, LSB-first, reversed first when
/// the selector says so (DNP).
pub fn read_track_bam(image: &Image, geometry: &Geometry, track: u8) -> Result<TrackBam, Error> {
    let sector_count = geometry
        .sectors_in_track(track)
        .ok_or_else(|| Error::new(ErrorKind::Structure(StructureError::InvalidPartition(format!(
            "track {} does not exist on this image",
            track
        )))))?;

    let selector = geometry.bam_selector_for(track).ok_or_else(|| {
        Error::new(ErrorKind::Structure(StructureError::InvalidPartition(format!(
            "no BAM selector covers track {}",
            track
        ))))
    })?;

    let block = image
        .frame()
        .from_ts(selector.block_track, selector.block_sector)?;
    let data = image.read_block(block)?;

    let base = selector.start_offset as usize
        + (track - selector.start_track) as usize * selector.bytes_per_track as usize;

    let mut free = [false; 256];
    let mut raw_bitmap = Vec::with_capacity(selector.data_bytes as usize);
    for i in 0..selector.data_bytes as usize {
        let raw_byte = *data.get(base + i).unwrap_or(&0);
        raw_bitmap.push(raw_byte);
        let byte = if selector.reverse_bit_order {
            reverse_bits(raw_byte)
        } else {
            raw_byte
        };
        for j in 0..8 {
            let sector = i * 8 + j;
            if sector < 256 {
                free[sector] = (byte >> j) & 1 == 1;
            }
        }
    }

    let stored_free_count = if let Some(counter_selector) = geometry.bam_counter_selector_for(track) {
        let counter_block = image
            .frame()
            .from_ts(counter_selector.block_track, counter_selector.block_sector)?;
        let counter_data = image.read_block(counter_block)?;
        let offset = counter_selector.start_offset as usize
            + (track - counter_selector.start_track) as usize * counter_selector.bytes_per_track as usize;
        counter_data.get(offset).copied()
    } else {
        None
    };

    Ok(TrackBam {
        track,
        free,
        sector_count,
        stored_free_count,
        raw_bitmap,
    })
}

impl TrackBam {
    /// True if this track's raw, pre-reversal BAM bytes are the
    /// factory-blank pattern rather than a real bitmap.
    ///
    /// Grounded on SPEC_FULL.md §4.6: "all-zero or bytes 1..N == 0x01".
    /// Read here as: the stored counter is `0` and every bitmap byte is
    /// `0`, or every bitmap byte from the second one onward is `0x01`
    /// (the first byte is left unconstrained since some formats pack a
    /// count or reserved bit into it).
    pub fn looks_factory_blank(&self) -> bool {
        if self.raw_bitmap.is_empty() {
            return false;
        }
        let all_zero = self.stored_free_count.unwrap_or(0) == 0
            && self.raw_bitmap.iter().all(|&b| b == 0);
        let all_ones_past_first = self.raw_bitmap[1..].iter().all(|&b| b == 0x01);
        all_zero || all_ones_past_first
    }
}

/// Classify one sector's BAM state: allocated, free, or free because the
/// whole track has never been allocated from.
///
/// Grounded on SPEC_FULL.md §4.6's `bam_get`.
pub fn bam_get(bam: &TrackBam, sector: u8) -> BamState {
    if bam.looks_factory_blank() {
        return BamState::ReallyFree;
    }
    if (sector as usize) < bam.sector_count as usize && bam.free[sector as usize] {
        BamState::Free
    } else {
        BamState::Used
    }
}

/// Count of structural problems with one track's BAM reading: a bit set
/// past the track's real sector count, a stored counter that disagrees
/// with the bitmap's popcount, or a stored counter larger than the
/// track's sector count. `0` means the track's BAM is internally
/// consistent.
///
/// Grounded on SPEC_FULL.md §4.6's `check_consistency`.
pub fn check_consistency(bam: &TrackBam) -> u32 {
    let mut violations = 0;

    for sector in bam.sector_count as usize..256 {
        if bam.free[sector] {
            violations += 1;
        }
    }

    if let Some(counter) = bam.stored_free_count {
        if counter != bam.counted_free() {
            violations += 1;
        }
        if counter > bam.sector_count {
            violations += 1;
        }
    }

    violations
}

/// Total free blocks across every track that is not a directory track.
///
/// Grounded on SPEC_FULL.md §4.6's `blocks_free`: directory tracks are
/// excluded since their own free-block accounting does not represent
/// user-data capacity the way every other track's does.
pub fn blocks_free(image: &Image, geometry: &Geometry) -> Result<u32, Error> {
    let mut total = 0u32;
    for track in 1..=geometry.tracks {
        if geometry.dir_tracks.contains(&track) {
            continue;
        }
        if let Ok(bam) = read_track_bam(image, geometry, track) {
            total += bam
                .stored_free_count
                .map(|c| c as u32)
                .unwrap_or_else(|| bam.counted_free() as u32);
        }
    }
    Ok(total)
}

/// Check one track's BAM reading against the geometry and, if present,
/// its own counter byte.
///
/// Grounded on `cbmimage_i_check_max_bam_of_track` (bits set for
/// sectors past the end of the track are invalid) and
/// `cbmimage_i_bam_check_equality`'s counter comparison.
pub fn check_track_bam(bam: &TrackBam) -> Result<(), Error> {
    for sector in bam.sector_count as usize..256 {
        if bam.free[sector] {
            return Err(Error::new(ErrorKind::Structure(
                StructureError::BamBitOnNonexistentSector { track: bam.track },
            )));
        }
    }

    if let Some(stored) = bam.stored_free_count {
        if stored != bam.counted_free() {
            return Err(Error::new(ErrorKind::Structure(
                StructureError::BamCounterMismatch { track: bam.track },
            )));
        }
    }

    Ok(())
}
