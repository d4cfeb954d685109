//! Structural validation: reconstruct a FAT by following every live chain,
//! then cross-check it against the BAM.
//!
//! Grounded on `examples/original_source/lib/validate.c`
//! (`cbmimage_validate`/`cbmimage_i_mark_global_and_local`/
//! `cbmimage_i_validate_process_file`/`cbmimage_i_bam_check_equality`).
//! Unlike the original's fail-fast error codes, findings here accumulate in
//! a [`ValidationReport`] (see SPEC_FULL.md §4.13): a malformed file does
//! not stop the rest of the image from being checked.
#![warn(missing_docs)]
#![warn(unsafe_code)]

use log::{debug, warn};

use crate::address::BlockAddress;
use crate::bam;
use crate::chain;
use crate::config::Config;
use crate::dir::{self, DirEntry, DirType};
use crate::error::Error;
use crate::fat::Fat;
use crate::geometry::{AlwaysUsedPostPass, Geometry, GeometryOps};
use crate::image::Image;
use crate::loop_detector::LoopDetector;

const REL_SS_LINK_TRACK_OFFSET: usize = 0x00;
const REL_SS_LINK_SECTOR_OFFSET: usize = 0x01;
const REL_SS_INDEX_OFFSET: usize = 0x02;
const REL_SS_RECORD_LEN_OFFSET: usize = 0x03;
const REL_SS_SHARED_START: usize = 0x04;
const REL_SS_SHARED_SLOTS: usize = 6;
const REL_SS_LINKTABLE_START: usize = 0x10;
const REL_SUPER_MARKER: u8 = 0xFE;
const REL_SUPER_TABLE_START: usize = 0x03;

/// How serious a single validation finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational, does not indicate a problem with the image.
    Info,
    /// The image deviates from what a correctly written disk would
    /// contain, but the data involved is still readable.
    Warning,
    /// The image is internally inconsistent in a way that makes some of
    /// its data unreliable or unreachable.
    Error,
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// How serious this finding is.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
}

/// The accumulated result of validating an image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Every finding recorded during the run, in the order they were found.
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    fn push(&mut self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Error => warn!("{}", message),
            Severity::Warning => warn!("{}", message),
            Severity::Info => debug!("{}", message),
        }
        self.findings.push(Finding { severity, message });
    }

    /// True if no finding at [`Severity::Error`] was recorded.
    pub fn is_structurally_sound(&self) -> bool {
        !self.findings.iter().any(|f| f.severity == Severity::Error)
    }
}

/// Validate `image` under `config`'s leniency settings.
///
/// Grounded on `cbmimage_validate`'s top-level orchestration: build a FAT,
/// mark the info/BAM/directory chains and every directory entry's data
/// (dispatching partitions, REL side-sectors and GEOS VLIR record maps
/// each their own way), then compare the reconstructed FAT against the
/// BAM block by block.
pub fn validate(image: &Image, config: &Config) -> Result<ValidationReport, Error> {
    let mut report = ValidationReport::default();
    let geometry = image.frame().geometry.clone();
    let max_lba = geometry.total_blocks();
    let mut fat = Fat::new(max_lba);
    let mut loops = LoopDetector::new(max_lba);

    if geometry.is_partition_table {
        validate_partition_table(image, &mut fat, &mut loops, &mut report)?;
        return Ok(report);
    }

    mark_chain(image, &mut fat, &mut loops, &mut report, "directory", {
        let (t, s) = geometry.dir_start;
        image.frame().from_ts(t, s)?
    });

    let entries = dir::entries(image)?;
    for entry in &entries {
        validate_entry(image, entry, &mut fat, &mut loops, &mut report, config)?;
    }

    format_post_pass(image, &geometry, &mut fat, &mut report)?;

    bam_check_equality(image, &geometry, &fat, &mut report)?;

    Ok(report)
}

/// Mark whatever a format's `set_bam`-style post-pass always considers
/// used, independent of any directory entry.
///
/// Grounded on SPEC_FULL.md §4.10 step 3 and the four
/// `cbmimage_i_*_set_bam` functions it names. `AlwaysUsedPostPass::WholeTrack`/
/// `::Blocks` are genuinely format-fixed ranges (D71's second BAM/directory
/// track, DNP's boot block and unlinked BAM blocks) and are marked here
/// directly. `::ParentOutsideActivePartition` (D81) and
/// `::PartitionTableRanges` (D1M/D2M/D4M) need per-entry data this function
/// does not have; those are instead handled as each
/// [`DirType::Partition1581`]/[`DirType::CmdNative`]/`Part*` entry is
/// processed by [`validate_entry`]/[`validate_partition_table`] — see the
/// Open Question entry in DESIGN.md for why marking a partition's own
/// declared range (rather than literally "everything outside the active
/// one") is the equivalent, single-frame-safe reading of the same rule.
fn format_post_pass(
    image: &Image,
    geometry: &Geometry,
    fat: &mut Fat,
    report: &mut ValidationReport,
) -> Result<(), Error> {
    match geometry.always_used_post_pass() {
        AlwaysUsedPostPass::None => {}
        AlwaysUsedPostPass::WholeTrack(track) => {
            if let Some(count) = geometry.sectors_in_track(track) {
                let blocks: Vec<(u8, u8)> = (0..count).map(|s| (track, s)).collect();
                mark_synthetic_chain(image, fat, &blocks, report);
            }
        }
        AlwaysUsedPostPass::Blocks(blocks) => {
            mark_synthetic_chain(image, fat, &blocks, report);
        }
        AlwaysUsedPostPass::ParentOutsideActivePartition | AlwaysUsedPostPass::PartitionTableRanges => {}
    }

    Ok(())
}

/// Mark a fixed, declared list of track/sector blocks as used, chained in
/// the order given, without reading any on-disk link header — these
/// blocks are reserved by format definition, not by a real chain.
fn mark_synthetic_chain(image: &Image, fat: &mut Fat, blocks: &[(u8, u8)], report: &mut ValidationReport) {
    let mut previous: Option<u16> = None;
    for &(track, sector) in blocks {
        match image.frame().from_ts(track, sector) {
            Ok(addr) => {
                if let Some(prev) = previous {
                    fat.set(prev, addr.lba);
                }
                previous = Some(addr.lba);
            }
            Err(_) => report.push(
                Severity::Error,
                format!(
                    "always-used post-pass names track/sector {}/{} which does not exist",
                    track, sector
                ),
            ),
        }
    }
    if let Some(prev) = previous {
        fat.set(prev, 0);
    }
}

/// Mark LBAs `start_lba..start_lba + block_count` as used, chained in
/// order, clamped to the FAT's own size.
///
/// Grounded on the four `cbmimage_i_*_set_bam` functions' partition-range
/// marking (see [`format_post_pass`]'s doc comment for why this crate
/// marks the range directly rather than "everything outside it").
fn mark_range_used(fat: &mut Fat, start_lba: u32, block_count: u32) {
    if block_count == 0 {
        return;
    }
    let max_lba = fat.len() as u32 - 1;
    let end = (start_lba + block_count - 1).min(max_lba);
    let mut lba = start_lba.max(1);
    while lba <= end {
        let target = if lba == end { 0 } else { (lba + 1) as u16 };
        fat.set(lba as u16, target);
        lba += 1;
    }
}

fn mark_chain(
    image: &Image,
    fat: &mut Fat,
    loops: &mut LoopDetector,
    report: &mut ValidationReport,
    label: &str,
    start: BlockAddress,
) {
    let mut previous: Option<u16> = None;
    let result = chain::follow(image, start, loops, |addr, _data| {
        if let Some(prev) = previous {
            fat.set(prev, addr.lba);
        }
        previous = Some(addr.lba);
    });

    if let Some(prev) = previous {
        fat.set(prev, 0);
    }

    if let Err(e) = result {
        report.push(
            Severity::Error,
            format!("{} chain starting at {}: {}", label, start, e),
        );
    }
}

fn validate_entry(
    image: &Image,
    entry: &DirEntry,
    fat: &mut Fat,
    loops: &mut LoopDetector,
    report: &mut ValidationReport,
    config: &Config,
) -> Result<(), Error> {
    match entry.dir_type {
        DirType::Partition1581 | DirType::CmdNative => {
            // Partition entries are marked used over their declared range
            // without being followed as a chain: the range is opaque to
            // this frame. This stands in for the D81/D1M-family
            // `set_bam`'s cross-frame "mark everything outside the active
            // partition" pass (see `format_post_pass`'s doc comment).
            match (entry.partition_lba, entry.partition_block_count) {
                (Some(lba), Some(count)) => mark_range_used(fat, lba, count),
                _ => report.push(
                    Severity::Warning,
                    "partition entry has no resolvable LBA range".to_string(),
                ),
            }
            Ok(())
        }
        DirType::Del => Ok(()),
        _ => {
            if entry.start_block.is_unused() {
                report.push(
                    Severity::Warning,
                    "directory entry has no start block".to_string(),
                );
                return Ok(());
            }

            if entry.geos_is_vlir && entry.geos_infoblock.is_some() && config.geos_probe() {
                validate_vlir(image, entry, fat, loops, report)?;
            } else {
                mark_chain(image, fat, loops, report, "file", entry.start_block);
            }

            if entry.dir_type == DirType::Rel && !entry.rel_sidesector_block.is_unused() {
                validate_rel_structure(image, entry, fat, report)?;
            }

            Ok(())
        }
    }
}

/// Validate a REL file's side-sector structure and cross-check its
/// link-table entries against the file's actual data chain.
///
/// Grounded on SPEC_FULL.md §4.10's REL/super-side-sector layout and
/// `examples/original_source/lib/validate.c`'s
/// `cbmimage_i_validate_process_rel_file`. A super-side-sector
/// (`header[0] == 0xFE`) names up to 126 group pointers, each the first
/// side-sector of its own 6-sector group; a plain REL file has exactly
/// one such group. Every side-sector's link-table is concatenated in
/// group order and compared against the data chain collected by
/// following `entry.start_block`.
fn validate_rel_structure(
    image: &Image,
    entry: &DirEntry,
    fat: &mut Fat,
    report: &mut ValidationReport,
) -> Result<(), Error> {
    let first = image.read_block(entry.rel_sidesector_block)?;

    let groups: Vec<BlockAddress> = if first.len() > REL_SUPER_TABLE_START && first[0] == REL_SUPER_MARKER {
        fat.set(entry.rel_sidesector_block.lba, 0);
        let own_link = (first[REL_SS_LINK_TRACK_OFFSET], first[REL_SS_LINK_SECTOR_OFFSET]);
        let mut pointers = Vec::new();
        for slot in 0..126 {
            let offset = REL_SUPER_TABLE_START + slot * 2;
            if offset + 1 >= first.len() {
                break;
            }
            let (t, s) = (first[offset], first[offset + 1]);
            if t == 0 && s == 0 {
                continue;
            }
            match image.frame().from_ts(t, s) {
                Ok(addr) => pointers.push(addr),
                Err(_) => report.push(
                    Severity::Error,
                    "REL super-side-sector names a group pointer that does not exist".to_string(),
                ),
            }
        }
        if own_link != (0, 0) && image.frame().from_ts(own_link.0, own_link.1).is_err() {
            report.push(
                Severity::Warning,
                "REL super-side-sector's own link field does not resolve".to_string(),
            );
        }
        pointers
    } else {
        vec![entry.rel_sidesector_block]
    };

    let mut link_table = Vec::new();
    for group_start in groups {
        validate_side_sector_group(image, entry, group_start, fat, &mut link_table, report)?;
    }

    // A fresh detector, not the validation run's shared one: `entry.start_block`
    // was already walked once by `mark_chain` above, which would otherwise
    // read as a loop on this second, read-only pass.
    let mut data_loops = LoopDetector::new(image.frame().geometry.total_blocks());
    let mut data_chain = Vec::new();
    chain::follow(image, entry.start_block, &mut data_loops, |addr, _data| {
        data_chain.push(addr);
    })?;

    if link_table != data_chain {
        report.push(
            Severity::Error,
            "REL side-sector link table does not match the file's actual data chain".to_string(),
        );
    }

    Ok(())
}

/// Walk one 6-sector side-sector group starting at `start`, marking each
/// sector used in `fat` and appending its link-table entries (in file
/// order) to `link_table`.
fn validate_side_sector_group(
    image: &Image,
    entry: &DirEntry,
    start: BlockAddress,
    fat: &mut Fat,
    link_table: &mut Vec<BlockAddress>,
    report: &mut ValidationReport,
) -> Result<(), Error> {
    let mut current = start;
    let mut previous: Option<u16> = None;
    let mut own_index = 0u8;

    loop {
        let block = image.read_block(current)?;
        if let Some(prev) = previous {
            fat.set(prev, current.lba);
        }

        if block.len() <= REL_SS_RECORD_LEN_OFFSET {
            report.push(Severity::Error, "REL side-sector is too short to hold a header".to_string());
            fat.set(current.lba, 0);
            return Ok(());
        }

        if block[REL_SS_RECORD_LEN_OFFSET] != entry.rel_record_length {
            report.push(
                Severity::Error,
                "REL side-sector's record length does not match the directory entry".to_string(),
            );
        }
        if block[REL_SS_INDEX_OFFSET] != own_index {
            report.push(
                Severity::Error,
                "REL side-sector's own index does not match its position in the group".to_string(),
            );
        }

        for slot in 0..((REL_SS_SHARED_SLOTS).min((block.len().saturating_sub(REL_SS_SHARED_START)) / 2)) {
            let offset = REL_SS_SHARED_START + slot * 2;
            let (t, s) = (block[offset], block[offset + 1]);
            if t == 0 && s == 0 {
                continue;
            }
            if image.frame().from_ts(t, s).is_err() {
                report.push(
                    Severity::Warning,
                    "REL side-sector shared area names a block that does not exist".to_string(),
                );
            }
        }

        for offset in (REL_SS_LINKTABLE_START..block.len()).step_by(2).take(120) {
            if offset + 1 >= block.len() {
                break;
            }
            let (t, s) = (block[offset], block[offset + 1]);
            if t == 0 && s == 0 {
                continue;
            }
            match image.frame().from_ts(t, s) {
                Ok(addr) => link_table.push(addr),
                Err(_) => report.push(
                    Severity::Error,
                    "REL side-sector link table names a block that does not exist".to_string(),
                ),
            }
        }

        let link_track = block[REL_SS_LINK_TRACK_OFFSET];
        let link_sector = block[REL_SS_LINK_SECTOR_OFFSET];
        previous = Some(current.lba);
        if link_track == 0 {
            fat.set(current.lba, 0);
            return Ok(());
        }
        own_index += 1;
        if own_index >= 6 {
            fat.set(current.lba, 0);
            return Ok(());
        }
        match image.frame().from_ts(link_track, link_sector) {
            Ok(addr) => current = addr,
            Err(_) => {
                report.push(
                    Severity::Error,
                    "REL side-sector chain link does not resolve".to_string(),
                );
                return Ok(());
            }
        }
    }
}

/// Walk a GEOS VLIR record map: pairs of (track, sector) at offsets
/// `2, 4, 6, ...`; `(0, 0)` ends the map, `(0, 0xFF)` marks a missing
/// stream, anything else must be a followable chain.
///
/// Grounded on `cbmimage_i_validate_geos_file`
/// (`examples/original_source/lib/validate.c`).
fn validate_vlir(
    image: &Image,
    entry: &DirEntry,
    fat: &mut Fat,
    loops: &mut LoopDetector,
    report: &mut ValidationReport,
) -> Result<(), Error> {
    let record_map = image.read_block(entry.start_block)?;
    fat.set(entry.start_block.lba, 0);

    let mut ended = false;
    for slot in 0..127 {
        let offset = 2 + slot * 2;
        if offset + 1 >= record_map.len() {
            break;
        }
        let track = record_map[offset];
        let sector = record_map[offset + 1];

        if track == 0 && sector == 0 {
            ended = true;
            continue;
        }

        if ended {
            report.push(
                Severity::Error,
                "GEOS VLIR record map has a non-terminator entry after its terminator".to_string(),
            );
            continue;
        }

        if track == 0 && sector == 0xFF {
            continue; // declared-missing stream, not an error
        }

        match image.frame().from_ts(track, sector) {
            Ok(addr) => mark_chain(image, fat, loops, report, "GEOS VLIR stream", addr),
            Err(_) => report.push(
                Severity::Error,
                "GEOS VLIR record map names a block that does not exist".to_string(),
            ),
        }
    }

    Ok(())
}

fn validate_partition_table(
    image: &Image,
    fat: &mut Fat,
    loops: &mut LoopDetector,
    report: &mut ValidationReport,
) -> Result<(), Error> {
    let entries = dir::entries(image)?;
    let geometry = &image.frame().geometry;
    let (dir_track, dir_sector) = geometry.dir_start;
    mark_chain(image, fat, loops, report, "partition directory", image.frame().from_ts(dir_track, dir_sector)?);

    for entry in &entries {
        if !matches!(
            entry.dir_type,
            DirType::PartCmdNative | DirType::PartD64 | DirType::PartD71 | DirType::PartD81
        ) {
            continue;
        }
        match (entry.partition_lba, entry.partition_block_count) {
            (Some(lba), Some(count)) => mark_range_used(fat, lba, count),
            _ => report.push(
                Severity::Warning,
                "partition table entry has no resolvable LBA range".to_string(),
            ),
        }
        report.push(
            Severity::Info,
            format!(
                "partition entry of type {:?}, {} declared blocks",
                entry.dir_type, entry.block_count
            ),
        );
    }

    Ok(())
}

/// Compare every block's FAT usage against the BAM's free bit.
///
/// Grounded on `cbmimage_i_bam_check_equality`: a block the FAT marked
/// used but the BAM calls free (or vice versa) is a structural finding,
/// not a hard error — the data is still readable either way.
fn bam_check_equality(
    image: &Image,
    geometry: &crate::geometry::Geometry,
    fat: &Fat,
    report: &mut ValidationReport,
) -> Result<(), Error> {
    for track in 1..=geometry.tracks {
        let track_bam = match bam::read_track_bam(image, geometry, track) {
            Ok(b) => b,
            Err(_) => continue,
        };

        if let Err(e) = bam::check_track_bam(&track_bam) {
            report.push(Severity::Error, e.to_string());
        }

        for sector in 0..track_bam.sector_count {
            let addr = image.frame().from_ts(track, sector)?;
            let fat_used = fat.is_used(addr.lba);
            let bam_free = track_bam.free[sector as usize];

            if fat_used == bam_free {
                report.push(
                    Severity::Error,
                    format!(
                        "block {} disagrees between the reconstructed allocation and the BAM",
                        addr
                    ),
                );
            }
        }
    }

    Ok(())
}
