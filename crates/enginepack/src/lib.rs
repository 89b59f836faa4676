//! # Enginepack
//!
//! The byte-level format spoken between the bridge and the engine process.
//!
//! Every value is tag, optional length, then body, so a reader can step over
//! a field it has no use for. The `Encoder` keeps a stack of open scopes and
//! patches each container's length when it closes. The `Decoder` borrows the
//! input and checks every read against what is left.
//!
//! ## Layout
//!
//! | value            | bytes                              |
//! |------------------|------------------------------------|
//! | fixed-width      | `tag`, then 0, 4 or 8 data bytes   |
//! | string           | `tag`, `u32` length, UTF-8 bytes   |
//! | container        | `tag`, `u32` length, nested values |
//!
//! Numbers are little-endian.

mod decoder;
mod encoder;

#[cfg(test)]
mod tests;

pub use decoder::Decoder;
pub use decoder::ListIter;
pub use decoder::MapIter;
pub use encoder::Encoder;

/// Failures while writing or reading a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The byte at the cursor is not a known tag.
    InvalidTag(u8),
    /// The reader asked for one kind of value and found another.
    UnexpectedTag { expected: Tag, found: Tag },
    InvalidUtf8,
    /// `Encoder::end` was called for a different scope than the innermost one.
    ScopeMismatch { expected: Scope, actual: Scope },
    /// `Encoder::end` was called with nothing open.
    ScopeUnderflow,
    /// `Encoder::finish` was called before every scope was closed.
    ScopeStillOpen,
    /// Ran out of bytes mid-value.
    UnexpectedEnd,
    /// A string or container body longer than a `u32` length can express.
    TooLarge(usize),
    /// A single-slot scope received a second item.
    TooManyItems(Scope),
    /// A single-slot scope was closed empty.
    EmptyAdt(Scope),
    /// Map bodies hold named variants only.
    InvalidMapEntry,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTag(b) => write!(f, "unknown tag byte {:#04x}", b),
            Self::UnexpectedTag { expected, found } => {
                write!(f, "wanted {:?} but the buffer holds {:?}", expected, found)
            }
            Self::InvalidUtf8 => write!(f, "string is not valid utf-8"),
            Self::ScopeMismatch { expected, actual } => {
                write!(f, "cannot close {:?} while {:?} is open", expected, actual)
            }
            Self::ScopeUnderflow => write!(f, "no open scope to close"),
            Self::ScopeStillOpen => write!(f, "encoder finished with open scopes"),
            Self::UnexpectedEnd => write!(f, "buffer ended mid-value"),
            Self::TooLarge(n) => write!(f, "length {} does not fit in a u32", n),
            Self::TooManyItems(s) => write!(f, "{:?} holds exactly one item", s),
            Self::EmptyAdt(s) => write!(f, "{:?} closed without its item", s),
            Self::InvalidMapEntry => write!(f, "map entries must be variants"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// First byte of every encoded value.
///
/// Fixed-width values sit below `0x40`, length-prefixed ones at or above it.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Unit = 0x00,
    BoolFalse = 0x01,
    BoolTrue = 0x02,
    OptionNone = 0x03,
    U32 = 0x10,
    U64 = 0x11,
    S64 = 0x12,
    F64 = 0x18,

    String = 0x40,
    List = 0x50,
    Map = 0x51,
    OptionSome = 0x60,
    ResultOk = 0x61,
    ResultErr = 0x62,
    Variant = 0x63,
}

const TAGS: [Tag; 15] = [
    Tag::Unit,
    Tag::BoolFalse,
    Tag::BoolTrue,
    Tag::OptionNone,
    Tag::U32,
    Tag::U64,
    Tag::S64,
    Tag::F64,
    Tag::String,
    Tag::List,
    Tag::Map,
    Tag::OptionSome,
    Tag::ResultOk,
    Tag::ResultErr,
    Tag::Variant,
];

impl TryFrom<u8> for Tag {
    type Error = Error;

    fn try_from(b: u8) -> Result<Self> {
        TAGS.iter().copied().find(|tag| *tag as u8 == b).ok_or(Error::InvalidTag(b))
    }
}

impl Tag {
    /// Bytes of payload after a fixed-width tag. `None` means a `u32` length
    /// follows instead.
    pub(crate) fn fixed_width(self) -> Option<usize> {
        match self {
            Self::Unit | Self::BoolFalse | Self::BoolTrue | Self::OptionNone => Some(0),
            Self::U32 => Some(4),
            Self::U64 | Self::S64 | Self::F64 => Some(8),
            _ => None,
        }
    }
}

/// What the `Encoder` currently has open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Top level. Takes any number of items.
    Root,
    List,
    /// Named variants only.
    Map,
    /// `Option`, `Result` and `Variant` each carry exactly one item.
    Option,
    Result,
    Variant,
}
