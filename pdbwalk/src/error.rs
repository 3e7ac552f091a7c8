//! Error kinds reported by the PDB reader.

use crate::parser::ParserError;
use crate::types::TypeIndex;
use pdbwalk_msf::MsfError;

/// Convenience alias used throughout this crate.
pub type Result<A, E = Error> = std::result::Result<A, E>;

/// Errors reported while opening a PDB or querying its model.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The file signature is not the PDB 7 (MSF 7.00) signature.
    #[error("file does not have the PDB 7 signature")]
    UnsupportedVersion,

    /// The MSF container is internally inconsistent.
    #[error("corrupt MSF container: {0}")]
    CorruptMsf(String),

    /// A stream required by the reader is absent.
    #[error("stream {0} does not exist")]
    NoSuchStream(u32),

    /// A record's declared length exceeds the remaining stream bytes, or a
    /// record payload is shorter than its fixed part.
    #[error("record extends beyond the end of its stream")]
    TruncatedRecord,

    /// A type index is not present in the graph.
    #[error("unknown type index {0:?}")]
    UnknownTypeIndex(TypeIndex),

    /// A type name is not present in the graph.
    #[error("unknown type name {0:?}")]
    UnknownTypeName(String),

    /// A symbol name could not be resolved to a type or address.
    #[error("unknown symbol {0:?}")]
    UnknownSymbol(String),

    /// A forward reference has no matching definition. This is warning-grade:
    /// it is logged during resolution and the record is kept.
    #[error("forward reference {0:?} has no definition")]
    UnresolvedFwdref(String),

    /// A leaf kind that must be decoded could not be decoded.
    #[error("required leaf kind 0x{0:04x} could not be decoded")]
    UnsupportedLeaf(u16),

    /// `deref_pointer` was applied to a type with no pointee.
    #[error("type is not a pointer")]
    NotAPointer,

    /// A symbol names a section index outside the section table.
    #[error("section index {0} is out of range")]
    BadSectionIndex(u16),

    /// The underlying file could not be read.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<MsfError> for Error {
    fn from(e: MsfError) -> Self {
        match e {
            MsfError::UnsupportedVersion => Error::UnsupportedVersion,
            MsfError::Corrupt(msg) => Error::CorruptMsf(msg),
            MsfError::NoSuchStream(s) => Error::NoSuchStream(s),
            MsfError::Io(e) => Error::Io(e),
        }
    }
}

impl From<ParserError> for Error {
    fn from(_: ParserError) -> Self {
        Error::TruncatedRecord
    }
}
