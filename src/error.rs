use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Location of a byte within the parsed input, tracked by the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}, column {} (offset {})",
            self.line, self.column, self.offset
        )
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// An Object has the wrong type, e.g. the Object is an Array where a Name would be expected.
    #[error("object has wrong type; expected type {expected} but found type {found}")]
    ObjectType {
        expected: &'static str,
        found: &'static str,
    },
    /// Dictionary key was not found.
    #[error("missing required dictionary key \"{0}\"")]
    DictKey(String),
    /// The Object ID was not found in the context.
    #[error("object not found")]
    ObjectNotFound,
    /// No file header marker anywhere in the input.
    #[error("invalid file header")]
    MissingHeader,
    /// The cursor met a byte other than the one a grammar rule requires.
    #[error("expected byte {expected:#04x} at {pos}, found {found:?}")]
    UnexpectedByte {
        pos: Position,
        expected: u8,
        found: Option<u8>,
    },
    /// A value started with a byte no object grammar rule accepts.
    #[error("no object starts with byte {byte:?} at {pos}")]
    ObjectParse { pos: Position, byte: Option<u8> },
    /// A number token was empty or failed to convert.
    #[error("failed to parse number {text:?} at {pos}")]
    InvalidNumber { pos: Position, text: String },
    /// A literal string ran out of input before its parentheses balanced.
    #[error("unbalanced string literal at {pos}")]
    UnbalancedString { pos: Position },
    /// A required keyword is absent.
    #[error("missing keyword \"{keyword}\" at {pos}")]
    MissingKeyword {
        pos: Position,
        keyword: &'static str,
    },
    /// Neither the declared length nor the fallback scan produced a
    /// balanced stream extent.
    #[error("could not determine stream extent for stream starting at {pos}")]
    StreamExtent { pos: Position },
    /// An indirect object that could not be parsed, even by scanning
    /// forward for its closing keyword.
    #[error("unrecoverable indirect object at {pos}")]
    InvalidObject { pos: Position },
    /// The section loop made no forward progress.
    #[error("parser stalled at {pos}")]
    Stalled { pos: Position },
    /// A stream declared a filter this library does not implement.
    #[error("unsupported stream encoding /{0}")]
    UnsupportedEncoding(String),
    /// The stream couldn't be decoded.
    #[error("couldn't decode stream: {0}")]
    Decode(String),
    /// An object stream or cross-reference stream had inconsistent structure.
    #[error("invalid packed stream: {0}")]
    PackedStream(String),
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
