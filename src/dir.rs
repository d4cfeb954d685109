//! Directory entries and the chain-of-256-byte-sectors, 8-entries-each
//! directory reader.
//!
//! Grounded on `examples/original_source/include/cbmimage.h`'s
//! `cbmimage_dir_entry`/`cbmimage_dir_type` and `lib/dir.c`'s entry walker.
//! The exact dir-entry byte layout below follows the field order implied
//! by that struct and the well-documented CBM DOS directory-sector format;
//! the original's own offset table lives in a header this pack's retrieval
//! did not include, so these offsets are the standard ones rather than a
//! byte-for-byte copy (see DESIGN.md).
#![warn(missing_docs)]
#![warn(unsafe_code)]

use nom::bytes::complete::take;
use nom::IResult;

use crate::address::BlockAddress;
use crate::error::{Error, ErrorKind, StructureError};
use crate::geometry::{self, Geometry};
use crate::image::Image;

const ENTRY_SIZE: usize = 32;
const ENTRIES_PER_BLOCK: usize = 8;

const OFFSET_TYPE: usize = 0x02;
const OFFSET_TRACK: usize = 0x03;
const OFFSET_SECTOR: usize = 0x04;
const OFFSET_NAME: usize = 0x05;
const NAME_LEN: usize = 16;
const OFFSET_REL_SIDESECTOR_TRACK: usize = 0x15;
const OFFSET_REL_SIDESECTOR_SECTOR: usize = 0x16;
const OFFSET_REL_RECORD_LENGTH: usize = 0x17;
const OFFSET_GEOS_FILETYPE: usize = 0x18;
const OFFSET_GEOS_FILESTRUCTURE: usize = 0x19;
const OFFSET_GEOS_INFO_TRACK: usize = 0x1A;
const OFFSET_GEOS_INFO_SECTOR: usize = 0x1B;
const OFFSET_BLOCK_COUNT_LOW: usize = 0x1E;
const OFFSET_BLOCK_COUNT_HIGH: usize = 0x1F;

const OFFSET_PARTITION_START_LOW: usize = 0x03;
const OFFSET_PARTITION_START_HIGH: usize = 0x04;
const OFFSET_PARTITION_BLOCK_COUNT_LOW: usize = 0x1E;
const OFFSET_PARTITION_BLOCK_COUNT_HIGH: usize = 0x1F;

/// The offset past which a partition-table's own directory type byte is
/// shifted, matching `DIR_TYPE_PART_OFFSET` (`cbmimage.h`).
const DIR_TYPE_PART_OFFSET: u16 = 0x100;

/// The type tag of a directory entry.
///
/// Grounded on `cbmimage_dir_type` (`examples/original_source/include/cbmimage.h`).
/// The `Part*` variants (offset `0x100` and up) only ever come from a slot
/// decoded with a partition-table geometry (`Geometry::is_partition_table`);
/// the plain variants come from every other directory, including one that
/// happens to contain a [`DirType::Partition1581`]/[`DirType::CmdNative`]
/// entry naming a nested partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirType {
    /// Deleted/scratched entry.
    Del,
    /// Sequential file.
    Seq,
    /// Program file.
    Prg,
    /// User file.
    Usr,
    /// Relative (record-structured) file.
    Rel,
    /// A 1581-style sub-partition (D81/D1M/D2M/D4M).
    Partition1581,
    /// A CMD native partition (D1M/D2M/D4M only).
    CmdNative,
    /// Some other, unrecognized type nibble.
    Other(u8),
    /// Partition-table slot: unused entry (`DIR_TYPE_PART_NO`).
    PartNone,
    /// Partition-table slot: a CMD native sub-partition (`DIR_TYPE_PART_CMD_NATIVE`).
    PartCmdNative,
    /// Partition-table slot: a nested D64 image (`DIR_TYPE_PART_D64`).
    PartD64,
    /// Partition-table slot: a nested D71 image (`DIR_TYPE_PART_D71`).
    PartD71,
    /// Partition-table slot: a nested D81 image (`DIR_TYPE_PART_D81`).
    PartD81,
    /// Partition-table slot: the reserved system partition (`DIR_TYPE_PART_SYSTEM`).
    PartSystem,
}

impl DirType {
    fn from_nibble(value: u8) -> DirType {
        match value & 0x0F {
            0 => DirType::Del,
            1 => DirType::Seq,
            2 => DirType::Prg,
            3 => DirType::Usr,
            4 => DirType::Rel,
            5 => DirType::Partition1581,
            6 => DirType::CmdNative,
            other => DirType::Other(other),
        }
    }

    /// Grounded on `lib/dir.c:189`'s `dei->entry.type = type + DIR_TYPE_PART_OFFSET`:
    /// the raw type byte is used directly, unmasked, in a partition table's
    /// own directory.
    fn from_partition_table_byte(value: u8) -> DirType {
        match value {
            0x00 => DirType::PartNone,
            0x01 => DirType::PartCmdNative,
            0x02 => DirType::PartD64,
            0x03 => DirType::PartD71,
            0x04 => DirType::PartD81,
            0xFF => DirType::PartSystem,
            other => DirType::Other(other),
        }
    }
}

/// One 32-byte directory slot, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// The file's type.
    pub dir_type: DirType,
    /// True if the CBM DOS "closed" bit is clear (file not properly closed).
    pub is_closed: bool,
    /// True if the "locked" bit is set.
    pub is_locked: bool,
    /// Raw, un-depetscii'd filename bytes (0xA0-padded, as on disk).
    pub name: [u8; NAME_LEN],
    /// First block of the file (or, for a GEOS VLIR file, the record map;
    /// or, for a partition-table slot, the partition's first block).
    pub start_block: BlockAddress,
    /// Declared block count.
    pub block_count: u16,
    /// REL file: first side-sector (or super-side-sector) block.
    pub rel_sidesector_block: BlockAddress,
    /// REL file: record length.
    pub rel_record_length: u8,
    /// GEOS info block, if this looks like a GEOS file (non-zero type byte
    /// at the GEOS filetype offset and a plausible structure byte).
    pub geos_infoblock: Option<BlockAddress>,
    /// True if `geos_infoblock.is_some()` and the file is VLIR-structured.
    pub geos_is_vlir: bool,
    /// For a [`DirType::Partition1581`]/[`DirType::CmdNative`] entry in a
    /// regular directory, or any `Part*` entry in a partition table's own
    /// directory: the partition's declared start LBA.
    ///
    /// Grounded on `cbmimage_i_dir_get_partition_data` (regular directory:
    /// the stored value is `2*lba+1`) and `lib/dir.c`'s `is_partition_table`
    /// branch (partition table: the stored value *is* the LBA, and the
    /// real image LBA is `2*stored+1`).
    pub partition_lba: Option<u32>,
    /// The partition's declared block count, alongside [`partition_lba`](Self::partition_lba).
    pub partition_block_count: Option<u32>,
    /// True if this slot has never held anything (a never-written slot, or
    /// one whose declared type is `0`). Not `pub` past `pub(crate)`: callers
    /// outside this crate read it through [`DirEntry::is_empty_slot`].
    pub(crate) is_empty: bool,
}

impl DirEntry {
    fn decode(slot: &[u8], geometry: &Geometry) -> DirEntry {
        if geometry.is_partition_table {
            Self::decode_partition_table_slot(slot)
        } else {
            Self::decode_regular_slot(slot)
        }
    }

    fn decode_regular_slot(slot: &[u8]) -> DirEntry {
        let (i, _) = take(OFFSET_TYPE)(slot).expect("slot is always >= ENTRY_SIZE bytes");
        let (i, type_byte) = le_u8(i).unwrap();
        let dir_type = DirType::from_nibble(type_byte);
        let is_closed = type_byte & 0x80 != 0;
        let is_locked = type_byte & 0x40 != 0;

        let (i, track) = le_u8(i).unwrap();
        let (i, sector) = le_u8(i).unwrap();
        let (i, name_bytes) = take_name(i).unwrap();
        let mut name = [0u8; NAME_LEN];
        name.copy_from_slice(name_bytes);

        let start_block = BlockAddress::new(track, sector, 0);

        let (i, ss_track) = le_u8(i).unwrap();
        let (i, ss_sector) = le_u8(i).unwrap();
        let (i, rel_record_length) = le_u8(i).unwrap();
        let (i, geos_filetype) = le_u8(i).unwrap();
        let (i, geos_filestructure) = le_u8(i).unwrap();
        let (i, geos_info_track) = le_u8(i).unwrap();
        let (_i, geos_info_sector) = le_u8(i).unwrap();

        let rel_sidesector_block = BlockAddress::new(ss_track, ss_sector, 0);

        let (geos_infoblock, geos_is_vlir) = if geos_filetype != 0 && geos_info_track != 0 {
            (
                Some(BlockAddress::new(geos_info_track, geos_info_sector, 0)),
                geos_filestructure == 1,
            )
        } else {
            (None, false)
        };

        let block_count =
            slot[OFFSET_BLOCK_COUNT_LOW] as u16 | ((slot[OFFSET_BLOCK_COUNT_HIGH] as u16) << 8);

        let (partition_lba, partition_block_count) =
            if matches!(dir_type, DirType::Partition1581 | DirType::CmdNative) {
                partition_data_from_slot(slot)
            } else {
                (None, None)
            };

        DirEntry {
            dir_type,
            is_closed,
            is_locked,
            name,
            start_block,
            block_count,
            rel_sidesector_block,
            rel_record_length,
            geos_infoblock,
            geos_is_vlir,
            partition_lba,
            partition_block_count,
            is_empty: type_byte == 0,
        }
    }

    /// Grounded on `lib/dir.c:189-211`'s `is_partition_table` branch: the
    /// type byte is used unmasked, lock/closed are fixed rather than
    /// read from bits, the name field is read the same way, and the
    /// start/block-count fields encode an LBA and a doubled block count
    /// instead of the regular-directory doubled-and-offset scheme.
    fn decode_partition_table_slot(slot: &[u8]) -> DirEntry {
        let type_byte = slot[OFFSET_TYPE];
        let dir_type = DirType::from_partition_table_byte(type_byte);

        let mut name = [0u8; NAME_LEN];
        name.copy_from_slice(&slot[OFFSET_NAME..OFFSET_NAME + NAME_LEN]);

        let lba_raw = slot[OFFSET_PARTITION_START_LOW] as u32
            | ((slot[OFFSET_PARTITION_START_HIGH] as u32) << 8);
        let blocks_raw = slot[OFFSET_PARTITION_BLOCK_COUNT_LOW] as u32
            | ((slot[OFFSET_PARTITION_BLOCK_COUNT_HIGH] as u32) << 8);

        let partition_lba = lba_raw * 2 + 1;
        let partition_block_count = blocks_raw * 2;

        DirEntry {
            dir_type,
            is_closed: true,
            is_locked: false,
            name,
            start_block: BlockAddress::new(0, 0, 0),
            block_count: partition_block_count.min(u16::MAX as u32) as u16,
            rel_sidesector_block: BlockAddress::UNUSED,
            rel_record_length: 0,
            geos_infoblock: None,
            geos_is_vlir: false,
            partition_lba: Some(partition_lba),
            partition_block_count: Some(partition_block_count),
            is_empty: type_byte == 0,
        }
    }

    /// True if this slot has never held a file (a never-written directory
    /// slot past the end of the used entries, or one whose type byte is
    /// literally `0`).
    ///
    /// Grounded on `lib/dir.c`'s `dei->is_empty = type == 0`: evaluated on
    /// the raw type byte before any masking or partition-table offsetting,
    /// so a scratched (`DirType::Del`) entry that still carries start-block
    /// or length data is not treated as empty.
    pub fn is_empty_slot(&self) -> bool {
        self.is_empty
    }

    /// Resolve this entry's Track/Sector-only address fields (as produced
    /// by [`DirEntry::decode`], which has no geometry to compute an LBA
    /// with) against `frame`'s geometry.
    ///
    /// Without this step every [`BlockAddress`] on a freshly decoded entry
    /// has `lba == 0`, which [`BlockAddress::is_unused`] treats the same as
    /// "no block" regardless of its track/sector — so chain-following would
    /// reject every real file's start block. A track/sector that does not
    /// exist in `frame`'s geometry resolves to an LBA-less address, which
    /// callers then correctly see as unused/unreachable rather than a false
    /// track 0/1.
    fn resolve_addresses(&mut self, frame: &crate::image::Frame) {
        let resolve = |addr: BlockAddress| -> BlockAddress {
            if addr.track == 0 {
                return BlockAddress::UNUSED;
            }
            frame
                .from_ts(addr.track, addr.sector)
                .unwrap_or(BlockAddress::new(addr.track, addr.sector, 0))
        };

        if let Some(lba) = self.partition_lba {
            if lba > 0 && lba <= u16::MAX as u32 {
                self.start_block = frame
                    .from_lba(lba as u16)
                    .unwrap_or(BlockAddress::UNUSED);
            }
        } else {
            self.start_block = resolve(self.start_block);
        }

        self.rel_sidesector_block = resolve(self.rel_sidesector_block);
        if let Some(geos) = self.geos_infoblock {
            self.geos_infoblock = Some(resolve(geos));
        }
    }

    /// For [`DirType::Partition1581`]/[`DirType::CmdNative`] entries: the
    /// declared start LBA and block count of the partition.
    ///
    /// Grounded on `cbmimage_i_dir_get_partition_data`
    /// (`examples/original_source/lib/dir.c`): the low/high bytes at the
    /// file-start offset encode `2 * lba + 1`, and the block-count bytes
    /// encode `2 * block_count`, matching the doubled/offset-by-one
    /// partition-table convention used by D1M/D2M/D4M and D81 partitions.
    pub fn partition_data(&self, slot: &[u8]) -> Option<(u32, u32)> {
        if !matches!(self.dir_type, DirType::Partition1581 | DirType::CmdNative) {
            return None;
        }
        partition_data_from_slot(slot)
    }
}

fn le_u8(i: &[u8]) -> IResult<&[u8], u8> {
    nom::number::complete::le_u8(i)
}

fn take_name(i: &[u8]) -> IResult<&[u8], &[u8]> {
    take(NAME_LEN)(i)
}

fn partition_data_from_slot(slot: &[u8]) -> (Option<u32>, Option<u32>) {
    let start = slot[OFFSET_PARTITION_START_LOW] as u32
        | ((slot[OFFSET_PARTITION_START_HIGH] as u32) << 8);
    let blocks = slot[OFFSET_PARTITION_BLOCK_COUNT_LOW] as u32
        | ((slot[OFFSET_PARTITION_BLOCK_COUNT_HIGH] as u32) << 8);

    let lba = match start.checked_sub(1) {
        Some(v) => v / 2,
        None => return (None, None),
    };
    (Some(lba), Some(blocks / 2))
}

/// Iterate the directory chain starting at `image.frame().geometry.dir_start`,
/// yielding every non-empty slot across every 256-byte directory block.
///
/// Grounded on `cbmimage_dir_get_first`/`cbmimage_dir_get_next`: the chain
/// link at the front of each directory block is followed the same way any
/// other block chain is, and each block holds 8 fixed-size slots.
pub fn entries(image: &Image) -> Result<Vec<DirEntry>, Error> {
    let geometry = &image.frame().geometry;
    let (track, sector) = geometry.dir_start;
    let mut current = image.frame().from_ts(track, sector)?;

    let mut out = Vec::new();
    let mut visited = std::collections::HashSet::new();

    loop {
        if !visited.insert(current.lba) {
            return Err(Error::new(ErrorKind::Chain(crate::error::ChainError::LoopDetected)));
        }

        let data = image.read_block(current)?;
        for i in 0..ENTRIES_PER_BLOCK {
            let slot = &data[i * ENTRY_SIZE..(i + 1) * ENTRY_SIZE];
            let mut entry = DirEntry::decode(slot, &image.frame().geometry);
            if !entry.is_empty_slot() {
                entry.resolve_addresses(image.frame());
                out.push(entry);
            }
        }

        let link_track = data[0];
        let link_sector = data[1];
        if link_track == 0 {
            break;
        }
        current = image
            .frame()
            .from_ts(link_track, link_sector)
            .map_err(|_| Error::new(ErrorKind::Chain(crate::error::ChainError::MalformedLink)))?;
    }

    Ok(out)
}

/// Descend into a partition-table entry, pushing a new frame onto `image`.
///
/// Grounded on `cbmimage_i_d81_chdir`/`cbmimage_i_d1m_d2m_d4m_chdir`
/// (`examples/original_source/lib/d81.c`/`lib/d1m_d2m_d4m.c`): a
/// [`DirType::Partition1581`]/[`DirType::PartD81`] entry names a
/// self-contained D81-shaped image, rebased to start at its declared LBA;
/// [`DirType::PartD64`]/[`DirType::PartD71`] (only reachable from a
/// partition table's own directory) name nested D64/D71-shaped images the
/// same way.
///
/// A [`DirType::CmdNative`]/[`DirType::PartCmdNative`] entry names the
/// other container's own native partition layout, whose directory-descent
/// path is incomplete in the original implementation this was ported from;
/// this returns [`ErrorKind::Unimplemented`] rather than guess at its
/// semantics.
pub fn chdir(image: &mut Image, entry: &DirEntry) -> Result<(), Error> {
    match entry.dir_type {
        DirType::CmdNative | DirType::PartCmdNative => Err(Error::new(ErrorKind::Unimplemented(
            "CMD native partition directory descent".into(),
        ))),
        DirType::Partition1581 | DirType::PartD81 => {
            let (lba, block_count) = partition_bounds(entry)?;

            if block_count % 40 != 0 || block_count == 0 {
                return Err(Error::new(ErrorKind::Structure(StructureError::InvalidPartition(
                    format!("partition block count {} is not a multiple of 40", block_count),
                ))));
            }

            let tracks = (block_count / 40) as u8;
            let child = geometry::d81_shaped(tracks);
            image.chdir_relative(child, lba);
            Ok(())
        }
        DirType::PartD64 => {
            let (lba, block_count) = partition_bounds(entry)?;
            let tracks = match block_count {
                683 => 35,
                768 => 40,
                802 => 42,
                other => {
                    return Err(Error::new(ErrorKind::Structure(StructureError::InvalidPartition(
                        format!("partition block count {} does not match a known D64 size", other),
                    ))))
                }
            };
            let child = geometry::d64_shaped(tracks);
            image.chdir_relative(child, lba);
            Ok(())
        }
        DirType::PartD71 => {
            let (lba, block_count) = partition_bounds(entry)?;
            if block_count != 1366 {
                return Err(Error::new(ErrorKind::Structure(StructureError::InvalidPartition(
                    format!("partition block count {} does not match a D71's 1366 blocks", block_count),
                ))));
            }
            let child = geometry::d71_shaped();
            image.chdir_relative(child, lba);
            Ok(())
        }
        DirType::PartNone | DirType::PartSystem => Err(Error::new(ErrorKind::Input(
            "chdir called on a non-partition directory entry".into(),
        ))),
        _ => Err(Error::new(ErrorKind::Input(
            "chdir called on a non-partition directory entry".into(),
        ))),
    }
}

fn partition_bounds(entry: &DirEntry) -> Result<(u32, u32), Error> {
    let lba = entry.partition_lba.ok_or_else(|| {
        Error::new(ErrorKind::Structure(StructureError::InvalidPartition(
            "partition entry has no start/block-count data".into(),
        )))
    })?;
    let block_count = entry.partition_block_count.ok_or_else(|| {
        Error::new(ErrorKind::Structure(StructureError::InvalidPartition(
            "partition entry has no start/block-count data".into(),
        )))
    })?;
    Ok((lba, block_count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn d64_with_one_prg() -> Vec<u8> {
        let mut buf = vec![0u8; 683 * 256];
        // track 18 sector 1 is lba 358+1=359 -> offset (359-1)*256
        let dir_block_offset = (359 - 1) * 256;
        buf[dir_block_offset] = 0; // end of dir chain
        buf[dir_block_offset + 1] = 0xFF;

        let slot = dir_block_offset + 0 * ENTRY_SIZE;
        buf[slot + OFFSET_TYPE] = 0x82; // closed PRG
        buf[slot + OFFSET_TRACK] = 1;
        buf[slot + OFFSET_SECTOR] = 0;
        buf[slot + OFFSET_NAME..slot + OFFSET_NAME + 4].copy_from_slice(b"TEST");
        for i in 4..NAME_LEN {
            buf[slot + OFFSET_NAME + i] = 0xA0;
        }
        buf[slot + OFFSET_BLOCK_COUNT_LOW] = 3;

        buf
    }

    #[test]
    fn entries_decodes_a_single_prg_file() {
        let buf = d64_with_one_prg();
        let image = Image::open(&buf).unwrap();
        let all = entries(&image).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].dir_type, DirType::Prg);
        assert!(all[0].is_closed);
        assert_eq!(all[0].block_count, 3);
        assert_eq!(&all[0].name[..4], b"TEST");
    }

    #[test]
    fn empty_directory_yields_no_entries() {
        let mut buf = vec![0u8; 683 * 256];
        let dir_block_offset = (359 - 1) * 256;
        buf[dir_block_offset] = 0;
        buf[dir_block_offset + 1] = 0xFF;
        let image = Image::open(&buf).unwrap();
        assert_eq!(entries(&image).unwrap().len(), 0);
    }

    #[test]
    fn dir_type_from_nibble_covers_partition_types() {
        assert_eq!(DirType::from_nibble(5), DirType::Partition1581);
        assert_eq!(DirType::from_nibble(6), DirType::CmdNative);
    }

    #[test]
    fn dir_type_from_partition_table_byte_covers_known_kinds() {
        assert_eq!(DirType::from_partition_table_byte(0x00), DirType::PartNone);
        assert_eq!(DirType::from_partition_table_byte(0x01), DirType::PartCmdNative);
        assert_eq!(DirType::from_partition_table_byte(0x02), DirType::PartD64);
        assert_eq!(DirType::from_partition_table_byte(0x03), DirType::PartD71);
        assert_eq!(DirType::from_partition_table_byte(0x04), DirType::PartD81);
        assert_eq!(DirType::from_partition_table_byte(0xFF), DirType::PartSystem);
    }

    #[test]
    fn chdir_pushes_a_d81_shaped_frame() {
        let buf = vec![0u8; 3200 * 256]; // D81, room for an 80-block partition
        let mut image = Image::open(&buf).unwrap();

        let mut slot = [0u8; ENTRY_SIZE];
        slot[OFFSET_TYPE] = 0x85; // closed, DirType::Partition1581
        let raw_start: u16 = 2 * 10 + 1; // declared lba 10
        slot[OFFSET_PARTITION_START_LOW] = (raw_start & 0xFF) as u8;
        slot[OFFSET_PARTITION_START_HIGH] = (raw_start >> 8) as u8;
        let raw_blocks: u16 = 2 * 80; // 80-block (2-track) partition
        slot[OFFSET_PARTITION_BLOCK_COUNT_LOW] = (raw_blocks & 0xFF) as u8;
        slot[OFFSET_PARTITION_BLOCK_COUNT_HIGH] = (raw_blocks >> 8) as u8;

        let geometry = image.frame().geometry.clone();
        let mut entry = DirEntry::decode(&slot, &geometry);
        assert_eq!(entry.dir_type, DirType::Partition1581);
        entry.resolve_addresses(image.frame());

        chdir(&mut image, &entry).unwrap();
        assert_eq!(image.frames().len(), 2);
        assert_eq!(image.frame().geometry.tracks, 2);
    }

    #[test]
    fn chdir_on_cmd_native_is_unimplemented() {
        let buf = vec![0u8; 81 * 40 * 256];
        let mut image = Image::open(&buf).unwrap();

        let mut slot = [0u8; ENTRY_SIZE];
        slot[OFFSET_TYPE] = 0x86; // closed, DirType::CmdNative
        let geometry = image.frame().geometry.clone();
        let mut entry = DirEntry::decode(&slot, &geometry);
        entry.resolve_addresses(image.frame());

        let result = chdir(&mut image, &entry);
        assert!(matches!(result.unwrap_err().kind(), ErrorKind::Unimplemented(_)));
    }

    #[test]
    fn decode_partition_table_slot_uses_lba_and_doubled_fields() {
        let mut slot = [0u8; ENTRY_SIZE];
        slot[OFFSET_TYPE] = 0x02; // PartD64, raw byte not masked
        slot[OFFSET_PARTITION_START_LOW] = 5; // raw lba 5 -> real lba 11
        slot[OFFSET_PARTITION_BLOCK_COUNT_LOW] = 170; // raw 170 -> 340 (ld)
        slot[OFFSET_PARTITION_BLOCK_COUNT_HIGH] = 1; // raw 0x1AA = 426 -> 852

        let geom = crate::geometry::resolve(&vec![0u8; 81 * 40 * 256]).unwrap();
        let entry = DirEntry::decode(&slot, &geom);

        assert_eq!(entry.dir_type, DirType::PartD64);
        assert!(entry.is_closed);
        assert!(!entry.is_locked);
        assert_eq!(entry.partition_lba, Some(5 * 2 + 1));
        let raw_blocks = 170u32 | (1u32 << 8);
        assert_eq!(entry.partition_block_count, Some(raw_blocks * 2));
    }

    #[test]
    fn partition_table_slot_with_zero_type_is_empty() {
        let slot = [0u8; ENTRY_SIZE];
        let geom = crate::geometry::resolve(&vec![0u8; 81 * 40 * 256]).unwrap();
        let entry = DirEntry::decode(&slot, &geom);
        assert!(entry.is_empty_slot());
        assert_eq!(entry.dir_type, DirType::PartNone);
    }
}
