//! Format recognition and the fixed, per-kind layout constants every other
//! component reads from.
//!
//! Grounded on `examples/original_source/lib/d40_d64_d71.c`,
//! `lib/d80_d82.c`, `lib/d81.c`, `lib/d1m_d2m_d4m.c` and `lib/dnp.c`: each of
//! those files builds a `cbmimage_image_settings` template (sectors-per-zone
//! table, BAM/BAM-counter selector, directory track, info block). This
//! module collects the same constants into one Rust-side registry instead of
//! spreading them across one `static const` struct per C file.
#![warn(missing_docs)]
#![warn(unsafe_code)]

use crate::error::{Error, ErrorKind, GeometryError};

/// The recognized disk/partition image kinds.
///
/// `CmdNative` covers the three CMD native-partition containers
/// (D1M/D2M/D4M); they share every layout constant except
/// [`GeometryKind::sectors_per_track`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    /// 1541, 35 or 40 tracks.
    D64 { tracks: u8 },
    /// 1571, 70 tracks (two D64-style sides back to back).
    D71,
    /// 1581, 80 tracks, uniform 40 sectors/track.
    D81,
    /// 8050, 77 tracks.
    D80,
    /// 8250, 154 tracks (two D80-style sides).
    D82,
    /// 2040/3040/4040, 35 tracks, 21/20/18/17-sector zones.
    D40,
    /// CMD native partition container: FD2000 (D1M), FD4000 in D2M mode
    /// (D2M), or FD4000 in D4M mode (D4M). `sectors_per_track` differs
    /// (40/80/160) but the rest of the geometry (81 tracks,
    /// `subdir_relative_addressing`, fixed partition-table region) is
    /// shared.
    CmdNative { sectors_per_track: u8 },
    /// CMD native partition (DNP): 255 tracks max, uniform 256
    /// sectors/track, actual track count is read from the image at open
    /// time (byte 8 of the first BAM block).
    Dnp { tracks: u8 },
}

/// A selector describing where one BAM bitmap segment lives and how its
/// bits map onto a track's sectors.
///
/// Grounded on `CBMIMAGE_BAM_SELECTOR_INIT`/`_REVERSE`
/// (`examples/original_source/include/cbmimage_bam.h` and every
/// `lib/d*.c` template that instantiates it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BamSelector {
    /// Lowest track this selector's segment applies to; a track is
    /// handled by the selector with the largest `start_track <= track`.
    pub start_track: u8,
    /// Byte offset within the BAM block where this track's bitmap starts.
    pub start_offset: u8,
    /// Number of bytes occupied by one track's bitmap entry.
    pub bytes_per_track: u8,
    /// Number of bitmap bytes actually holding sector bits (<=
    /// `bytes_per_track`; the remainder, if any, is the free-count byte
    /// unless that is stored separately, see [`BamCounterSelector`]).
    pub data_bytes: u8,
    /// Track the BAM block containing this selector's bytes lives on.
    pub block_track: u8,
    /// Sector the BAM block containing this selector's bytes lives on.
    pub block_sector: u8,
    /// DNP stores its bitmap bits MSB-first per byte instead of LSB-first.
    pub reverse_bit_order: bool,
}

/// A selector describing where one BAM free-sector-counter byte lives.
///
/// Most formats pack it as the first byte of each track's bitmap entry
/// (`data_bytes < bytes_per_track` in the matching [`BamSelector`]); D64/D71
/// instead keep a separate table of counter bytes starting at a fixed
/// offset, which is what this selector expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BamCounterSelector {
    /// Lowest track this selector applies to.
    pub start_track: u8,
    /// Byte offset within the BAM block of the first counter byte.
    pub start_offset: u8,
    /// Number of bytes per counter entry (1, except oddities; always 1 in
    /// every format this crate reads).
    pub bytes_per_track: u8,
    /// Track the BAM block lives on.
    pub block_track: u8,
    /// Sector the BAM block lives on.
    pub block_sector: u8,
}

/// The fixed layout facts for one resolved image: sector counts per track,
/// where the directory/BAM/info blocks live, and the partition-addressing
/// mode a `chdir` into this kind of sub-image should use.
///
/// Constructed once per [`crate::image::Frame`] by [`resolve`] or by a
/// `chdir` finisher (`d81_chdir_partition_init`/`d1m_d2m_d4m_chdir`/`dnp`
/// style) and then treated as immutable for the frame's lifetime.
#[derive(Debug, Clone)]
pub struct Geometry {
    /// Which format this is.
    pub kind: GeometryKind,
    /// Number of tracks, 1-based (track numbers run `1..=tracks`).
    pub tracks: u8,
    /// Bytes per block; always 256 for every format this crate reads.
    pub bytes_per_block: u16,
    /// Track(s) holding the root directory chain. A second entry is used
    /// by D71 (other side's directory track) and D80/D82 (a secondary
    /// directory track); `0` means "not applicable".
    pub dir_tracks: [u8; 2],
    /// Track/sector of the root directory's first block.
    pub dir_start: (u8, u8),
    /// Track/sector of the disk-info/header block.
    pub info_start: (u8, u8),
    /// Byte offset of the disk name within the info block.
    pub info_offset_diskname: u8,
    /// BAM bitmap selectors, largest-`start_track`-first is not required;
    /// [`Geometry::bam_selector_for`] scans for the best match.
    pub bam: Vec<BamSelector>,
    /// BAM free-counter selectors, parallel to `bam` where the format
    /// keeps counters separate from the bitmap (D64/D71); empty when the
    /// counter is interleaved with the bitmap bytes.
    pub bam_counter: Vec<BamCounterSelector>,
    /// True if this image kind is itself a partition table (D1M/D2M/D4M)
    /// rather than a filesystem.
    pub is_partition_table: bool,
    /// True if a GEOS super-side-sector/VLIR structure can be present.
    pub has_super_sidesector: bool,
}

impl Geometry {
    /// Number of sectors on `track`, or `None` if `track` is out of range.
    ///
    /// Grounded on the per-zone tables in `lib/d40_d64_d71.c` and
    /// `lib/d80_d82.c`; D81/D1M-family/DNP use a single uniform value.
    pub fn sectors_in_track(&self, track: u8) -> Option<u8> {
        if track == 0 || track > self.tracks {
            return None;
        }
        Some(match self.kind {
            GeometryKind::D40 => match track {
                1..=17 => 21,
                18..=24 => 20,
                25..=30 => 18,
                _ => 17,
            },
            GeometryKind::D64 { .. } => d64_zone(track),
            GeometryKind::D71 => {
                let t = if track > 35 { track - 35 } else { track };
                d64_zone(t)
            }
            GeometryKind::D81 => 40,
            GeometryKind::D80 => d82_zone(track),
            GeometryKind::D82 => {
                let t = if track > 77 { track - 77 } else { track };
                d82_zone(t)
            }
            GeometryKind::CmdNative { sectors_per_track } => sectors_per_track,
            GeometryKind::Dnp { .. } => 256,
        })
    }

    /// The BAM selector covering `track`: the one with the largest
    /// `start_track <= track`.
    ///
    /// Grounded on `cbmimage_i_bam_get_selector`
    /// (`examples/original_source/lib/bam.c`).
    pub fn bam_selector_for(&self, track: u8) -> Option<&BamSelector> {
        self.bam
            .iter()
            .filter(|s| s.start_track <= track)
            .max_by_key(|s| s.start_track)
    }

    /// The BAM counter selector covering `track`, if this format keeps
    /// counters separate from the bitmap.
    pub fn bam_counter_selector_for(&self, track: u8) -> Option<&BamCounterSelector> {
        self.bam_counter
            .iter()
            .filter(|s| s.start_track <= track)
            .max_by_key(|s| s.start_track)
    }

    /// Total number of addressable blocks (the highest valid LBA).
    pub fn total_blocks(&self) -> u32 {
        (1..=self.tracks)
            .map(|t| self.sectors_in_track(t).unwrap_or(0) as u32)
            .sum()
    }
}

fn d64_zone(track: u8) -> u8 {
    match track {
        1..=17 => 21,
        18..=24 => 19,
        25..=30 => 18,
        _ => 17,
    }
}

/// The D80/D82 BAM lives entirely on track 38, one `(start_track, sector)`
/// pair per quadrant of up to 4: `(1,0), (51,3), (101,6), (151,9)`. D80
/// (`count == 2`) only ever reaches the first two; D82 uses all four.
///
/// Grounded on the four `CBMIMAGE_BAM_AND_BAM_COUNTER_CREATE` invocations
/// in `lib/d80_d82.c`.
fn d80_d82_bam(count: usize) -> Vec<BamSelector> {
    const QUADRANTS: [(u8, u8); 4] = [(1, 0), (51, 3), (101, 6), (151, 9)];
    QUADRANTS[..count]
        .iter()
        .map(|&(start_track, sector)| BamSelector {
            start_track,
            start_offset: 0x07,
            bytes_per_track: 5,
            data_bytes: 4,
            block_track: 38,
            block_sector: sector,
            reverse_bit_order: false,
        })
        .collect()
}

fn d80_d82_bam_counter(count: usize) -> Vec<BamCounterSelector> {
    const QUADRANTS: [(u8, u8); 4] = [(1, 0), (51, 3), (101, 6), (151, 9)];
    QUADRANTS[..count]
        .iter()
        .map(|&(start_track, sector)| BamCounterSelector {
            start_track,
            start_offset: 0x06,
            bytes_per_track: 5,
            block_track: 38,
            block_sector: sector,
        })
        .collect()
}

fn d82_zone(track: u8) -> u8 {
    match track {
        1..=39 => 29,
        40..=53 => 27,
        54..=64 => 25,
        _ => 23,
    }
}

/// DNP's 32 BAM selectors: `bam[0]` covers tracks `1..=7` out of the first
/// BAM block, `bam[1..32]` each cover 8 tracks out of their own block.
///
/// Grounded on `cbmimage_i_dnp_chdir_partition_init`
/// (`examples/original_source/lib/dnp.c`): the first selector is
/// `CBMIMAGE_BAM_SELECTOR_INIT_REVERSE(1, 0x20, 0x20, 0x20, 1, 2)`; the
/// remaining 31 start from `CBMIMAGE_BAM_SELECTOR_INIT_REVERSE(8, 0x00,
/// 0x20, 0x20, 1, 3)` and are built by a loop that bumps `start_track` by 8
/// and the selector's block sector by 1 each iteration.
fn dnp_bam() -> Vec<BamSelector> {
    let mut selectors = vec![BamSelector {
        start_track: 1,
        start_offset: 0x20,
        bytes_per_track: 0x20,
        data_bytes: 0x20,
        block_track: 1,
        block_sector: 2,
        reverse_bit_order: true,
    }];

    for i in 1..32u8 {
        selectors.push(BamSelector {
            start_track: 8 * i,
            start_offset: 0x00,
            bytes_per_track: 0x20,
            data_bytes: 0x20,
            block_track: 1,
            block_sector: 2 + i,
            reverse_bit_order: true,
        });
    }

    selectors
}

/// What a format's validator "always-used" post-pass marks, independent of
/// any directory entry or on-disk chain.
///
/// Grounded on the four `cbmimage_i_*_set_bam` functions (`lib/d40_d64_d71.c`,
/// `lib/d81.c`, `lib/dnp.c`, `lib/d1m_d2m_d4m.c`); see SPEC_FULL.md §4.10
/// step 3. The D81 and D1M-family variants need state ([`crate::image::Image`]'s
/// active sub-partition, the directory entries) that `Geometry` alone does
/// not carry, so they are descriptors for [`crate::validate::validate`] to
/// act on rather than already-resolved block lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlwaysUsedPostPass {
    /// This format has no always-used post-pass.
    None,
    /// D71: mark every sector of this track used, chained in sector order.
    WholeTrack(u8),
    /// DNP: mark these track/sector blocks used, chained in this order.
    Blocks(Vec<(u8, u8)>),
    /// D81: when a sub-partition is active, mark every block of the parent
    /// outside the sub-partition's declared range as used.
    ParentOutsideActivePartition,
    /// D1M/D2M/D4M: for every non-deleted partition-table entry, mark its
    /// declared range used.
    PartitionTableRanges,
}

/// Per-geometry-kind behavior that does not reduce to a plain data lookup.
///
/// Grounded on SPEC_FULL.md §4.1's `GeometryOps` naming: the original keeps
/// one function-pointer table (`cbmimage_image_settings.fct`) per format;
/// this crate reaches the same per-kind dispatch through a trait
/// implemented once for [`Geometry`], rather than scattering `match
/// geometry.kind` arms through `validate.rs`/`dir.rs`.
pub trait GeometryOps {
    /// Which always-used post-pass (if any) this format's validator runs.
    fn always_used_post_pass(&self) -> AlwaysUsedPostPass;
}

impl GeometryOps for Geometry {
    fn always_used_post_pass(&self) -> AlwaysUsedPostPass {
        match self.kind {
            GeometryKind::D71 => AlwaysUsedPostPass::WholeTrack(18 + 35),
            GeometryKind::Dnp { .. } => {
                let mut blocks = vec![(1, 0)];
                blocks.extend((3..=33).map(|sector| (1, sector)));
                AlwaysUsedPostPass::Blocks(blocks)
            }
            GeometryKind::D81 => AlwaysUsedPostPass::ParentOutsideActivePartition,
            GeometryKind::CmdNative { .. } => AlwaysUsedPostPass::PartitionTableRanges,
            _ => AlwaysUsedPostPass::None,
        }
    }
}

/// Classify a raw buffer by length and build its [`Geometry`], the way
/// `cbmimage_image_guess_type`/the per-format `_image_open` wrappers
/// (`examples/original_source/lib/fileimage.c` and the `lib/d*.c` `_open`
/// functions) dispatch on size before constructing a settings struct.
///
/// Lengths with a trailing per-block error-map byte are accepted the same
/// as their bare counterparts: the error map itself is out of scope for
/// this crate (see SPEC_FULL.md §1 non-goals) but its presence must not
/// make an otherwise-valid image unrecognizable.
pub fn resolve(buffer: &[u8]) -> Result<Geometry, Error> {
    let len = buffer.len();

    let d64_35 = 683usize * 256;
    let d64_40 = 768usize * 256;
    let d64_42 = 802usize * 256;
    let d71_70 = 1366usize * 256;
    let d81_80 = 3200usize * 256;
    let d40_35 = 690usize * 256;
    let d80_77 = 2083usize * 256;
    let d82_154 = 4166usize * 256;

    let with_errormap = |blocks: usize| blocks * 256 + blocks;

    let kind_and_tracks = if len == d64_35 || len == with_errormap(683) {
        Some((GeometryKind::D64 { tracks: 35 }, 35))
    } else if len == d64_40 || len == with_errormap(768) {
        Some((GeometryKind::D64 { tracks: 40 }, 40))
    } else if len == d64_42 || len == with_errormap(802) {
        Some((GeometryKind::D64 { tracks: 42 }, 42))
    } else if len == d71_70 || len == with_errormap(1366) {
        Some((GeometryKind::D71, 70))
    } else if len == d81_80 || len == with_errormap(3200) {
        Some((GeometryKind::D81, 80))
    } else if len == d40_35 || len == with_errormap(690) {
        Some((GeometryKind::D40, 35))
    } else if len == d80_77 || len == with_errormap(2083) {
        Some((GeometryKind::D80, 77))
    } else if len == d82_154 || len == with_errormap(4166) {
        Some((GeometryKind::D82, 154))
    } else if len == 81usize * 40 * 256 {
        Some((GeometryKind::CmdNative { sectors_per_track: 40 }, 81))
    } else if len == 81usize * 80 * 256 {
        Some((GeometryKind::CmdNative { sectors_per_track: 80 }, 81))
    } else if len == 81usize * 160 * 256 {
        Some((GeometryKind::CmdNative { sectors_per_track: 160 }, 81))
    } else {
        None
    };

    if let Some((kind, tracks)) = kind_and_tracks {
        return Ok(build(kind, tracks));
    }

    // DNP: uniform 256 sectors/track, track count is not implied by
    // length alone (it is read from byte 8 of the first BAM block by the
    // caller once the block is accessible); accept any length that is an
    // exact multiple of one track (256 sectors * 256 bytes) up to the
    // format's 255-track ceiling, matching `cbmimage_i_dnp_image_open`'s
    // own length sanity check before it trusts the in-image track count.
    let dnp_track_bytes = 256usize * 256;
    if len % dnp_track_bytes == 0 {
        let tracks = len / dnp_track_bytes;
        if tracks >= 1 && tracks <= 255 {
            return Ok(build(GeometryKind::Dnp { tracks: tracks as u8 }, tracks as u8));
        }
    }

    Err(Error::new(ErrorKind::Geometry(GeometryError::UnknownFormat {
        len,
    })))
}

/// Build the geometry for a 1581-style sub-partition of `tracks` tracks
/// (uniform 40 sectors/track, directory/BAM laid out the same way as a
/// standalone D81).
///
/// Grounded on `cbmimage_i_d81_chdir_partition_init`
/// (`examples/original_source/lib/d81.c`): a partition's own tracks are
/// numbered from 1 just like a standalone D81, independent of its actual
/// size in the parent image.
pub fn d81_shaped(tracks: u8) -> Geometry {
    build(GeometryKind::D81, tracks)
}

/// Build the geometry for a D64-style sub-partition nested inside a
/// D1M-family image, renumbered from track 1 the same way [`d81_shaped`]
/// renumbers a nested 1581 partition.
pub fn d64_shaped(tracks: u8) -> Geometry {
    build(GeometryKind::D64 { tracks }, tracks)
}

/// Build the geometry for a D71-style sub-partition nested inside a
/// D1M-family image. D71 has no variable track count, unlike D64.
pub fn d71_shaped() -> Geometry {
    build(GeometryKind::D71, 70)
}

fn build(kind: GeometryKind, tracks: u8) -> Geometry {
    match kind {
        GeometryKind::D40 => Geometry {
            kind,
            tracks,
            bytes_per_block: 256,
            dir_tracks: [18, 0],
            dir_start: (18, 1),
            info_start: (18, 0),
            info_offset_diskname: 0x90,
            bam: vec![BamSelector {
                start_track: 1,
                start_offset: 0x05,
                bytes_per_track: 4,
                data_bytes: 3,
                block_track: 18,
                block_sector: 0,
                reverse_bit_order: false,
            }],
            bam_counter: vec![BamCounterSelector {
                start_track: 1,
                start_offset: 0x04,
                bytes_per_track: 4,
                block_track: 18,
                block_sector: 0,
            }],
            is_partition_table: false,
            has_super_sidesector: false,
        },
        GeometryKind::D64 { .. } => Geometry {
            kind,
            tracks,
            bytes_per_block: 256,
            dir_tracks: [18, 0],
            dir_start: (18, 1),
            info_start: (18, 0),
            info_offset_diskname: 0x90,
            bam: vec![BamSelector {
                start_track: 1,
                start_offset: 0x05,
                bytes_per_track: 4,
                data_bytes: 3,
                block_track: 18,
                block_sector: 0,
                reverse_bit_order: false,
            }],
            bam_counter: vec![BamCounterSelector {
                start_track: 1,
                start_offset: 0x04,
                bytes_per_track: 4,
                block_track: 18,
                block_sector: 0,
            }],
            is_partition_table: false,
            has_super_sidesector: false,
        },
        GeometryKind::D71 => Geometry {
            kind,
            tracks,
            bytes_per_block: 256,
            dir_tracks: [18, 18 + 35],
            dir_start: (18, 1),
            info_start: (18, 0),
            info_offset_diskname: 0x90,
            bam: vec![
                BamSelector {
                    start_track: 1,
                    start_offset: 0x05,
                    bytes_per_track: 4,
                    data_bytes: 3,
                    block_track: 18,
                    block_sector: 0,
                    reverse_bit_order: false,
                },
                BamSelector {
                    start_track: 36,
                    start_offset: 0x00,
                    bytes_per_track: 3,
                    data_bytes: 3,
                    block_track: 18 + 35,
                    block_sector: 0,
                    reverse_bit_order: false,
                },
            ],
            bam_counter: vec![
                BamCounterSelector {
                    start_track: 1,
                    start_offset: 0x04,
                    bytes_per_track: 4,
                    block_track: 18,
                    block_sector: 0,
                },
                BamCounterSelector {
                    start_track: 36,
                    start_offset: 0xDD,
                    bytes_per_track: 1,
                    block_track: 18 + 35,
                    block_sector: 0,
                },
            ],
            is_partition_table: false,
            has_super_sidesector: false,
        },
        GeometryKind::D81 => Geometry {
            kind,
            tracks,
            bytes_per_block: 256,
            dir_tracks: [40, 0],
            dir_start: (40, 3),
            info_start: (40, 0),
            info_offset_diskname: 0x04,
            bam: vec![
                BamSelector {
                    start_track: 1,
                    start_offset: 0x11,
                    bytes_per_track: 6,
                    data_bytes: 5,
                    block_track: 40,
                    block_sector: 1,
                    reverse_bit_order: false,
                },
                BamSelector {
                    start_track: 41,
                    start_offset: 0x11,
                    bytes_per_track: 6,
                    data_bytes: 5,
                    block_track: 40,
                    block_sector: 2,
                    reverse_bit_order: false,
                },
            ],
            bam_counter: vec![
                BamCounterSelector {
                    start_track: 1,
                    start_offset: 0x10,
                    bytes_per_track: 6,
                    block_track: 40,
                    block_sector: 1,
                },
                BamCounterSelector {
                    start_track: 41,
                    start_offset: 0x10,
                    bytes_per_track: 6,
                    block_track: 40,
                    block_sector: 2,
                },
            ],
            is_partition_table: false,
            has_super_sidesector: true,
        },
        GeometryKind::D80 => Geometry {
            kind,
            tracks,
            bytes_per_block: 256,
            dir_tracks: [39, 38],
            dir_start: (39, 1),
            info_start: (39, 0),
            info_offset_diskname: 0x06,
            bam: d80_d82_bam(2),
            bam_counter: d80_d82_bam_counter(2),
            is_partition_table: false,
            has_super_sidesector: false,
        },
        GeometryKind::D82 => Geometry {
            kind,
            tracks,
            bytes_per_block: 256,
            dir_tracks: [39, 38],
            dir_start: (39, 1),
            info_start: (39, 0),
            info_offset_diskname: 0x06,
            bam: d80_d82_bam(4),
            bam_counter: d80_d82_bam_counter(4),
            is_partition_table: false,
            has_super_sidesector: false,
        },
        GeometryKind::CmdNative { .. } => Geometry {
            kind,
            tracks,
            bytes_per_block: 256,
            dir_tracks: [1, 0],
            dir_start: (1, 0),
            info_start: (1, 0),
            info_offset_diskname: 0xF0,
            bam: vec![],
            bam_counter: vec![],
            is_partition_table: true,
            has_super_sidesector: false,
        },
        GeometryKind::Dnp { .. } => Geometry {
            kind,
            tracks,
            bytes_per_block: 256,
            dir_tracks: [1, 0],
            dir_start: (1, 34),
            info_start: (1, 1),
            info_offset_diskname: 0x04,
            bam: dnp_bam(),
            bam_counter: vec![],
            is_partition_table: false,
            has_super_sidesector: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn resolve_d64_35_track() {
        let buf = vec![0u8; 683 * 256];
        let geom = resolve(&buf).unwrap();
        assert_eq!(geom.tracks, 35);
        assert_eq!(geom.sectors_in_track(1), Some(21));
        assert_eq!(geom.sectors_in_track(18), Some(19));
        assert_eq!(geom.sectors_in_track(35), Some(17));
        assert_eq!(geom.sectors_in_track(36), None);
    }

    #[test]
    fn resolve_d64_with_errormap() {
        let buf = vec![0u8; 683 * 256 + 683];
        let geom = resolve(&buf).unwrap();
        assert_eq!(geom.tracks, 35);
    }

    #[test]
    fn resolve_d71() {
        let buf = vec![0u8; 1366 * 256];
        let geom = resolve(&buf).unwrap();
        assert_eq!(geom.tracks, 70);
        assert_eq!(geom.sectors_in_track(36), Some(21));
        assert_eq!(geom.sectors_in_track(70), Some(17));
        assert_eq!(geom.dir_tracks, [18, 53]);
    }

    #[test]
    fn resolve_d81_uniform_sectors() {
        let buf = vec![0u8; 3200 * 256];
        let geom = resolve(&buf).unwrap();
        assert_eq!(geom.tracks, 80);
        for t in 1..=80 {
            assert_eq!(geom.sectors_in_track(t), Some(40));
        }
    }

    #[test]
    fn resolve_cmd_native_variants() {
        let d1m = resolve(&vec![0u8; 81 * 40 * 256]).unwrap();
        assert_eq!(d1m.sectors_in_track(1), Some(40));
        assert!(d1m.is_partition_table);

        let d2m = resolve(&vec![0u8; 81 * 80 * 256]).unwrap();
        assert_eq!(d2m.sectors_in_track(1), Some(80));

        let d4m = resolve(&vec![0u8; 81 * 160 * 256]).unwrap();
        assert_eq!(d4m.sectors_in_track(1), Some(160));
    }

    #[test]
    fn resolve_unknown_length_errors() {
        let buf = vec![0u8; 12345];
        let err = resolve(&buf).unwrap_err();
        match err.kind() {
            ErrorKind::Geometry(GeometryError::UnknownFormat { len }) => assert_eq!(*len, 12345),
            other => panic!("expected GeometryError::UnknownFormat, got {:?}", other),
        }
    }

    #[test]
    fn bam_selector_for_picks_largest_matching_start() {
        let geom = resolve(&vec![0u8; 1366 * 256]).unwrap();
        assert_eq!(geom.bam_selector_for(10).unwrap().block_track, 18);
        assert_eq!(geom.bam_selector_for(40).unwrap().block_track, 53);
    }

    #[test]
    fn total_blocks_d64_35() {
        let geom = resolve(&vec![0u8; 683 * 256]).unwrap();
        assert_eq!(geom.total_blocks(), 683);
    }

    #[test]
    fn dnp_has_32_bam_selectors() {
        let geom = build(GeometryKind::Dnp { tracks: 255 }, 255);
        assert_eq!(geom.bam.len(), 32);
        assert_eq!(geom.bam[0].start_track, 1);
        assert_eq!(geom.bam[0].block_sector, 2);
        assert_eq!(geom.bam[1].start_track, 8);
        assert_eq!(geom.bam[1].block_sector, 3);
        assert_eq!(geom.bam[31].start_track, 8 * 31);
        assert_eq!(geom.bam[31].block_sector, 33);
        for selector in &geom.bam {
            assert!(selector.reverse_bit_order);
        }
    }

    #[test]
    fn dnp_bam_selector_for_track_9_picks_second_selector() {
        let geom = build(GeometryKind::Dnp { tracks: 255 }, 255);
        let selector = geom.bam_selector_for(9).unwrap();
        assert_eq!(selector.block_sector, 3);
    }

    #[test]
    fn geometry_ops_post_pass_matches_format() {
        let d71 = resolve(&vec![0u8; 1366 * 256]).unwrap();
        assert_eq!(d71.always_used_post_pass(), AlwaysUsedPostPass::WholeTrack(53));

        let dnp = build(GeometryKind::Dnp { tracks: 10 }, 10);
        match dnp.always_used_post_pass() {
            AlwaysUsedPostPass::Blocks(blocks) => {
                assert_eq!(blocks.len(), 32);
                assert_eq!(blocks[0], (1, 0));
                assert_eq!(blocks[1], (1, 3));
                assert_eq!(blocks[31], (1, 33));
            }
            other => panic!("expected Blocks, got {:?}", other),
        }

        let d64 = resolve(&vec![0u8; 683 * 256]).unwrap();
        assert_eq!(d64.always_used_post_pass(), AlwaysUsedPostPass::None);
    }
}
