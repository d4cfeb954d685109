//! Error results that can occur while parsing, addressing or validating
//! a disk image.
#![warn(missing_docs)]
#![warn(unsafe_code)]
use std::{
    fmt::{Debug, Display, Formatter, Result},
    io,
};

/// An error that can occur when processing a disk image.
pub struct Error {
    kind: ErrorKind,
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "{}", self.kind)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Create a new Error with a given ErrorKind variant
    pub fn new(kind: ErrorKind) -> Error {
        Error { kind }
    }

    /// The kind of error that occurred.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for Error {
    fn from(e: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        Error::new(ErrorKind::Message(e.to_string()))
    }
}

impl<'a> nom::error::ParseError<&'a [u8]> for Error {
    fn from_error_kind(_input: &'a [u8], kind: nom::error::ErrorKind) -> Self {
        Error::new(ErrorKind::Message(kind.description().to_string()))
    }

    fn append(_input: &'a [u8], _kind: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::new(ErrorKind::Io(e))
    }
}

/// The kinds of errors that can occur when processing a disk image.
pub enum ErrorKind {
    /// Generic error type, used for free-form diagnostics.
    Message(String),

    /// An error that occurs while reading image data from the host
    /// filesystem (test/example scaffolding only; the core engine never
    /// touches the filesystem itself).
    Io(io::Error),

    /// Geometry/format resolution failed.
    Geometry(GeometryError),

    /// Track/sector/LBA addressing failed.
    Address(AddressError),

    /// Following a block chain failed.
    Chain(ChainError),

    /// A structural inconsistency was found (BAM/FAT divergence, REL or
    /// VLIR inconsistency, malformed partition).
    Structure(StructureError),

    /// Invalid arguments were passed to a public API.
    Input(String),

    /// The feature exists in the original format but is deliberately not
    /// implemented here (see SPEC_FULL.md Open Questions: CMD native
    /// partition directory descent).
    Unimplemented(String),
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter) -> Result {
        match self {
            ErrorKind::Message(message) => write!(f, "{}", message),
            ErrorKind::Io(e) => write!(f, "{}", e),
            ErrorKind::Geometry(e) => write!(f, "{}", e),
            ErrorKind::Address(e) => write!(f, "{}", e),
            ErrorKind::Chain(e) => write!(f, "{}", e),
            ErrorKind::Structure(e) => write!(f, "{}", e),
            ErrorKind::Input(message) => write!(f, "invalid input: {}", message),
            ErrorKind::Unimplemented(message) => write!(f, "unimplemented: {}", message),
        }
    }
}

/// Errors raised while resolving a buffer to a [`crate::geometry::Geometry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    /// The buffer length matched no known image kind.
    UnknownFormat {
        /// The length of the buffer that could not be classified.
        len: usize,
    },
    /// The image kind is recognized but not supported by this crate.
    UnsupportedKind(&'static str),
}

impl Display for GeometryError {
    fn fmt(&self, f: &mut Formatter) -> Result {
        match self {
            GeometryError::UnknownFormat { len } => {
                write!(f, "no known disk image format has a length of {} bytes", len)
            }
            GeometryError::UnsupportedKind(kind) => {
                write!(f, "disk image kind {} is not supported", kind)
            }
        }
    }
}

/// Errors raised while translating or advancing a [`crate::address::BlockAddress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressError {
    /// track/sector or LBA named a block outside the active frame.
    OutOfRange,
    /// `advance` ran past the last block of the visible region.
    EndOfImage,
    /// `advance_in_track` ran past the last sector of the current track.
    EndOfTrack,
    /// advancing would cross out of an active relative sub-partition.
    EndOfPartition,
}

impl Display for AddressError {
    fn fmt(&self, f: &mut Formatter) -> Result {
        let s = match self {
            AddressError::OutOfRange => "track/sector or LBA is out of range",
            AddressError::EndOfImage => "reached the end of the image",
            AddressError::EndOfTrack => "reached the end of the current track",
            AddressError::EndOfPartition => "reached the end of the active partition",
        };
        write!(f, "{}", s)
    }
}

/// Errors raised while following a block chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainError {
    /// The chain revisited a block it had already marked.
    LoopDetected,
    /// The link names a track that exists but a sector that doesn't.
    MalformedLink,
}

impl Display for ChainError {
    fn fmt(&self, f: &mut Formatter) -> Result {
        let s = match self {
            ChainError::LoopDetected => "a loop was detected while following a block chain",
            ChainError::MalformedLink => "a block's link names a sector that does not exist",
        };
        write!(f, "{}", s)
    }
}

/// Structural problems found by the BAM engine, directory reader or
/// validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureError {
    /// The BAM counter byte does not equal the popcount of its bitmap.
    BamCounterMismatch {
        /// track the mismatch was found on
        track: u8,
    },
    /// A BAM bit is set for a sector index that does not exist on its track.
    BamBitOnNonexistentSector {
        /// track the mismatch was found on
        track: u8,
    },
    /// The reconstructed FAT and the BAM disagree about a block's state.
    FatBamDivergence {
        /// the LBA of the disputed block
        lba: u16,
    },
    /// A REL file's side-sector structure is inconsistent.
    RelSideSectorInconsistency(String),
    /// A GEOS VLIR record map is malformed.
    VlirRecordMapMalformed(String),
    /// A partition is not track-aligned, crosses the directory track, or
    /// extends past the end of the image.
    InvalidPartition(String),
}

impl Display for StructureError {
    fn fmt(&self, f: &mut Formatter) -> Result {
        match self {
            StructureError::BamCounterMismatch { track } => {
                write!(f, "BAM counter on track {} does not match its popcount", track)
            }
            StructureError::BamBitOnNonexistentSector { track } => {
                write!(f, "BAM on track {} marks a sector that does not exist", track)
            }
            StructureError::FatBamDivergence { lba } => {
                write!(f, "block {:#05X} disagrees between the reconstructed FAT and the BAM", lba)
            }
            StructureError::RelSideSectorInconsistency(msg) => write!(f, "{}", msg),
            StructureError::VlirRecordMapMalformed(msg) => write!(f, "{}", msg),
            StructureError::InvalidPartition(msg) => write!(f, "{}", msg),
        }
    }
}
