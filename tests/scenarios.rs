//! End-to-end scenarios exercising the engine the way a caller would: open
//! a buffer, walk its directory, follow chains, validate. Each test name
//! corresponds to one literal scenario from SPEC_FULL.md's testable
//! properties (S1-S6); the constants and offsets below mirror the ones
//! each unit module uses internally (`src/dir.rs`'s directory-entry byte
//! offsets, `src/geometry.rs`'s track/LBA arithmetic).

use cbmimage::address::BlockAddress;
use cbmimage::config::{Config, Configuration};
use cbmimage::dir::{self, DirType};
use cbmimage::image::Image;
use cbmimage::validate::{self, Severity};
use pretty_assertions::assert_eq;

const OFFSET_TYPE: usize = 0x02;
const OFFSET_TRACK: usize = 0x03;
const OFFSET_SECTOR: usize = 0x04;
const OFFSET_NAME: usize = 0x05;
const NAME_LEN: usize = 16;
const OFFSET_REL_SIDESECTOR_TRACK: usize = 0x15;
const OFFSET_REL_SIDESECTOR_SECTOR: usize = 0x16;
const OFFSET_REL_RECORD_LENGTH: usize = 0x17;
const SIDESECTOR_LINKTABLE_START: usize = 0x10;
const OFFSET_BLOCK_COUNT_LOW: usize = 0x1E;
const OFFSET_BLOCK_COUNT_HIGH: usize = 0x1F;
const OFFSET_PARTITION_START_LOW: usize = 0x03;
const OFFSET_PARTITION_START_HIGH: usize = 0x04;
const OFFSET_PARTITION_BLOCK_COUNT_LOW: usize = 0x1E;
const OFFSET_PARTITION_BLOCK_COUNT_HIGH: usize = 0x1F;

fn test_config() -> Config {
    Config::load(config::Config::builder().build().unwrap()).unwrap()
}

fn block_offset(lba: u32) -> usize {
    (lba as usize - 1) * 256
}

/// S1. D64 with no error map: 683 blocks, the classic 21/19/18/17 zoning.
#[test]
fn s1_d64_zoning_and_block_count() {
    let buf = vec![0u8; 683 * 256];
    let image = Image::open(&buf).unwrap();
    let geometry = &image.frame().geometry;

    assert_eq!(geometry.tracks, 35);
    assert_eq!(geometry.total_blocks(), 683);
    for t in 1..=17u8 {
        assert_eq!(geometry.sectors_in_track(t), Some(21), "track {}", t);
    }
    for t in 18..=24u8 {
        assert_eq!(geometry.sectors_in_track(t), Some(19), "track {}", t);
    }
    for t in 25..=30u8 {
        assert_eq!(geometry.sectors_in_track(t), Some(18), "track {}", t);
    }
    for t in 31..=35u8 {
        assert_eq!(geometry.sectors_in_track(t), Some(17), "track {}", t);
    }
}

/// S2. D64 with a trailing per-block error map: still recognized as a
/// 683-block D64, and the engine does not disturb or surface the trailing
/// bytes (reading the very last block must not run into them).
#[test]
fn s2_d64_with_error_map_is_recognized_and_leaves_trailer_untouched() {
    let mut buf = vec![0u8; 683 * 256 + 683];
    for (i, b) in buf[683 * 256..].iter_mut().enumerate() {
        *b = (i + 1) as u8; // recognizable, non-zero error-map filler
    }
    let image = Image::open(&buf).unwrap();
    let geometry = &image.frame().geometry;
    assert_eq!(geometry.total_blocks(), 683);

    let last = image.frame().from_lba(683).unwrap();
    let data = image.read_block(last).unwrap();
    assert_eq!(data.len(), 256);

    // The error map itself is out of scope; it must still be there,
    // untouched, right after the last block's 256 bytes.
    assert_eq!(buf[683 * 256], 1);
    assert_eq!(buf[683 * 256 + 682], 683);
}

/// S3. D71: track 53 is the second BAM/directory track (the C original's
/// `dir_tracks[1]`). Its BAM selector must resolve to that physical track,
/// a directory built only on track 18 is still read correctly (the second
/// side does not need its own directory chain), and the validator's
/// always-used post-pass marks every block of track 53 used on its own,
/// with no directory entry pointing at it.
#[test]
fn s3_d71_second_directory_track_is_53() {
    use cbmimage::geometry::{AlwaysUsedPostPass, GeometryOps};

    let buf = vec![0u8; 1366 * 256];
    let image = Image::open(&buf).unwrap();
    let geometry = &image.frame().geometry;

    assert_eq!(geometry.tracks, 70);
    assert_eq!(geometry.dir_tracks, [18, 53]);

    let selector = geometry.bam_selector_for(53).unwrap();
    assert_eq!(selector.block_track, 53);
    assert_eq!(geometry.always_used_post_pass(), AlwaysUsedPostPass::WholeTrack(53));

    // An empty directory on track 18 still parses to zero entries; the
    // engine never assumes files live on the second side's directory
    // track.
    let dir_lba = image.frame().from_ts(18, 1).unwrap().lba;
    let dir_block_offset = block_offset(dir_lba as u32);
    let mut buf2 = buf.clone();
    buf2[dir_block_offset] = 0;
    buf2[dir_block_offset + 1] = 0xFF;
    let image2 = Image::open(&buf2).unwrap();
    assert_eq!(dir::entries(&image2).unwrap().len(), 0);

    // The fixture's BAM bytes are all zero, i.e. every bit says "used" for
    // every track (the all-zero buffer's default state). No directory
    // entry references track 53, so without the post-pass its blocks
    // would be left unmarked in the reconstructed FAT — a real
    // disagreement against a BAM that calls them used. With the post-pass
    // marking the whole track used on its own, the two agree.
    let config = test_config();
    let report = validate::validate(&image2, &config).unwrap();
    let track_53_mismatches: Vec<_> = report
        .findings
        .iter()
        .filter(|f| f.severity == Severity::Error && f.message.starts_with("block 53/"))
        .collect();
    assert!(
        track_53_mismatches.is_empty(),
        "expected the post-pass to reconcile track 53 with its all-used BAM, got {:?}",
        track_53_mismatches
    );
}

/// S4. D81 chdir: a partition directory entry on track 40 pointing at
/// start LBA 10, 80 blocks (2 tracks), resolves to a 2-track D81-shaped
/// sub-image; `chdir_close` restores the parent frame exactly.
#[test]
fn s4_d81_partition_chdir_and_close_round_trips() {
    let buf_len = 3200 * 256;
    let mut buf = vec![0u8; buf_len];

    let dir_lba = 1564u32; // track 40 sector 3, D81's directory start
    let dir_off = block_offset(dir_lba);
    buf[dir_off] = 0; // end of directory chain
    buf[dir_off + 1] = 0xFF;

    let slot_off = dir_off;
    buf[slot_off + OFFSET_TYPE] = 0x85; // closed, Partition1581
    let raw_start: u16 = 2 * 10 + 1;
    buf[slot_off + OFFSET_PARTITION_START_LOW] = (raw_start & 0xFF) as u8;
    buf[slot_off + OFFSET_PARTITION_START_HIGH] = (raw_start >> 8) as u8;
    let raw_blocks: u16 = 2 * 80;
    buf[slot_off + OFFSET_PARTITION_BLOCK_COUNT_LOW] = (raw_blocks & 0xFF) as u8;
    buf[slot_off + OFFSET_PARTITION_BLOCK_COUNT_HIGH] = (raw_blocks >> 8) as u8;

    let mut image = Image::open(&buf).unwrap();
    let root_tracks = image.frame().geometry.tracks;
    assert_eq!(root_tracks, 80);

    let entries = dir::entries(&image).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].dir_type, DirType::Partition1581);

    dir::chdir(&mut image, &entries[0]).unwrap();
    assert_eq!(image.frames().len(), 2);
    assert_eq!(image.frame().geometry.tracks, 2);
    assert_eq!(image.frame().geometry.kind, cbmimage::geometry::GeometryKind::D81);

    image.chdir_close().unwrap();
    assert_eq!(image.frames().len(), 1);
    assert_eq!(image.frame().geometry.tracks, root_tracks);
}

/// S5. REL file with a side-sector chain: the validator follows the data
/// chain (`start_block`), walks the side-sector's link table (at byte
/// offset 0x10 of the side-sector block), and records an error only when
/// the link table's declared blocks diverge from the file's actual data
/// chain — a side-sector whose link table names exactly the data chain it
/// points at validates clean.
#[test]
fn s5_rel_file_side_sector_chain_is_followed() {
    let mut buf = vec![0u8; 3200 * 256]; // D81

    let dir_lba = 1564u32;
    let dir_off = block_offset(dir_lba);
    buf[dir_off] = 0;
    buf[dir_off + 1] = 0xFF;

    // REL data chain: one block, track 1 sector 0, terminated.
    let data_lba = 1u32;
    let data_off = block_offset(data_lba);
    buf[data_off] = 0;
    buf[data_off + 1] = 10;

    // Side-sector chain: one block, track 1 sector 1, terminated, its
    // own index 0, record length matching the directory entry, and a
    // link table whose first entry names the data block above.
    let side_lba = 2u32;
    let side_off = block_offset(side_lba);
    buf[side_off] = 0; // end of side-sector chain
    buf[side_off + 1] = 0;
    buf[side_off + 0x02] = 0; // own index within its group
    buf[side_off + 0x03] = 100; // record length
    buf[side_off + SIDESECTOR_LINKTABLE_START] = 1; // -> track 1 sector 0
    buf[side_off + SIDESECTOR_LINKTABLE_START + 1] = 0;

    let slot_off = dir_off;
    buf[slot_off + OFFSET_TYPE] = 0x84; // closed, Rel
    buf[slot_off + OFFSET_TRACK] = 1;
    buf[slot_off + OFFSET_SECTOR] = 0;
    buf[slot_off + OFFSET_REL_SIDESECTOR_TRACK] = 1;
    buf[slot_off + OFFSET_REL_SIDESECTOR_SECTOR] = 1;
    buf[slot_off + OFFSET_REL_RECORD_LENGTH] = 100;
    buf[slot_off + OFFSET_BLOCK_COUNT_LOW] = 1;
    for i in 0..NAME_LEN {
        buf[slot_off + OFFSET_NAME + i] = 0xA0;
    }

    let image = Image::open(&buf).unwrap();
    let entries = dir::entries(&image).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].dir_type, DirType::Rel);
    assert_eq!(entries[0].rel_sidesector_block, BlockAddress::new(1, 1, 2));
    assert_eq!(entries[0].rel_record_length, 100);

    let config = test_config();
    let report = validate::validate(&image, &config).unwrap();
    let rel_errors: Vec<_> = report
        .findings
        .iter()
        .filter(|f| f.severity == Severity::Error && f.message.to_lowercase().contains("rel side-sector"))
        .collect();
    assert!(
        rel_errors.is_empty(),
        "expected no REL side-sector findings for a matching link table, got {:?}",
        rel_errors
    );

    // Now corrupt the link table to name a block the data chain never
    // visits: the mismatch must be flagged.
    let mut bad = buf.clone();
    bad[side_off + SIDESECTOR_LINKTABLE_START] = 1;
    bad[side_off + SIDESECTOR_LINKTABLE_START + 1] = 5; // track 1 sector 5, not in the data chain
    let bad_image = Image::open(&bad).unwrap();
    let bad_report = validate::validate(&bad_image, &config).unwrap();
    assert!(bad_report.findings.iter().any(|f| {
        f.severity == Severity::Error && f.message.contains("link table does not match")
    }));
}

/// S6. Loop injection: block 17/0 on a D64 links to itself. Following the
/// chain raises a loop error and the validator records it as a finding
/// rather than hanging or panicking.
#[test]
fn s6_self_linked_block_is_flagged_as_a_loop() {
    let mut buf = vec![0u8; 683 * 256];

    let loop_lba = 337u32; // track 17 sector 0
    let loop_off = block_offset(loop_lba);
    buf[loop_off] = 17; // links to itself
    buf[loop_off + 1] = 0;

    let dir_lba = 359u32; // track 18 sector 1
    let dir_off = block_offset(dir_lba);
    buf[dir_off] = 0;
    buf[dir_off + 1] = 0xFF;

    let slot_off = dir_off;
    buf[slot_off + OFFSET_TYPE] = 0x82; // closed Prg
    buf[slot_off + OFFSET_TRACK] = 17;
    buf[slot_off + OFFSET_SECTOR] = 0;
    buf[slot_off + OFFSET_BLOCK_COUNT_LOW] = 1;
    for i in 0..NAME_LEN {
        buf[slot_off + OFFSET_NAME + i] = 0xA0;
    }

    let image = Image::open(&buf).unwrap();

    // Direct chain-following observes the loop immediately.
    let start = image.frame().from_ts(17, 0).unwrap();
    let mut loops = cbmimage::loop_detector::LoopDetector::new(683);
    let mut visited = Vec::new();
    let result = cbmimage::chain::follow(&image, start, &mut loops, |addr, _| visited.push(addr));
    assert!(result.is_err());
    assert_eq!(visited.len(), 1);

    // The validator reports it as a finding instead of propagating the
    // error or looping forever.
    let config = test_config();
    let report = validate::validate(&image, &config).unwrap();
    assert!(report
        .findings
        .iter()
        .any(|f| f.severity == Severity::Error && f.message.to_lowercase().contains("loop")));
}
