//! Filesync wire format — the on-wire frame layout.
//!
//! These definitions ARE the protocol. Every field width, every flag bit,
//! and every limit here is part of the wire format; changing anything after
//! a release is a breaking change.
//!
//! Frame layout (all multi-byte integers big-endian):
//!
//! ```text
//! byte  0        : version (=1)
//! byte  1        : flags   (bit0 ERROR, bit1 HUFFMAN, bit2 TRANSACTION_ID)
//! bytes 2..3     : type id (u16)
//! bytes 4..19    : transaction id (16 bytes), present iff bit2 set
//! next  2 bytes  : body length (u16)
//! then           : body
//! ```

use crate::codec::Value;

// ── Sizes ────────────────────────────────────────────────────────────────────

pub const VERSION_SIZE: usize = 1;
pub const FLAGS_SIZE: usize = 1;
pub const TYPE_ID_SIZE: usize = 2;
pub const TRANSACTION_ID_SIZE: usize = 16;
pub const LENGTH_SIZE: usize = 2;

/// Fixed header size without the optional transaction id.
pub const HEADER_SIZE: usize = VERSION_SIZE + FLAGS_SIZE + TYPE_ID_SIZE + LENGTH_SIZE;

/// Header size when the transaction id is present.
pub const HEADER_SIZE_WITH_TRANSACTION_ID: usize = HEADER_SIZE + TRANSACTION_ID_SIZE;

/// Maximum body length in bytes. A frame must fit a 64 KB TCP segment,
/// minus the largest possible header.
pub const MAX_BODY_SIZE: usize = (1 << 16) - HEADER_SIZE_WITH_TRANSACTION_ID;

/// Current wire format version.
pub const VERSION: u8 = 1;

// ── Flags ────────────────────────────────────────────────────────────────────

/// The body carries an error payload.
pub const FLAG_ERROR: u8 = 1 << 0;

/// Reserved for Huffman-compressed bodies. Receivers must ignore it.
pub const FLAG_HUFFMAN: u8 = 1 << 1;

/// The header carries a 16-byte transaction id.
pub const FLAG_TRANSACTION_ID: u8 = 1 << 2;

// ── Identifiers ──────────────────────────────────────────────────────────────

/// Stable 16-bit identifier of a payload shape in the process-wide registry.
pub type TypeId = u16;

/// Identifies a logical exchange. Frames sharing a transaction id are routed
/// to the same handler. All-zero means "no transaction".
pub type TransactionId = [u8; TRANSACTION_ID_SIZE];

/// The all-zero transaction id.
pub const NO_TRANSACTION: TransactionId = [0u8; TRANSACTION_ID_SIZE];

// ── Frame ────────────────────────────────────────────────────────────────────

/// Frame header. `type_id` and `length` are derived from the body during
/// encode; a hand-filled value is overwritten on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Header {
    pub version: u8,
    pub flags: u8,
    pub type_id: TypeId,
    pub transaction_id: TransactionId,
    pub length: u16,
}

impl Header {
    pub fn has_transaction_id(&self) -> bool {
        self.flags & FLAG_TRANSACTION_ID != 0
    }

    pub fn is_error(&self) -> bool {
        self.flags & FLAG_ERROR != 0
    }
}

/// The atomic unit of communication: a header plus a dynamically-shaped body.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub header: Header,
    pub body: Value,
}

impl Frame {
    /// A frame outside any transaction.
    pub fn new(body: Value) -> Self {
        Self {
            header: Header {
                version: VERSION,
                ..Header::default()
            },
            body,
        }
    }

    /// A frame belonging to the given transaction.
    pub fn with_transaction(transaction_id: TransactionId, body: Value) -> Self {
        let mut frame = Self::new(body);
        frame.header.transaction_id = transaction_id;
        frame
    }

    /// Set the ERROR flag and return self, for builder-style use.
    pub fn error(mut self) -> Self {
        self.header.flags |= FLAG_ERROR;
        self
    }
}

// ── Errors ───────────────────────────────────────────────────────────────────

/// Errors arising while interpreting wire-format data.
///
/// Framing errors (`Truncated`, `UnsupportedVersion`, `UnregisteredType`,
/// `BodyTooLarge`) leave the stream unframed and are fatal to the session.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("unexpected end of frame")]
    Truncated,

    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),

    #[error("unregistered type id: {0}")]
    UnregisteredType(TypeId),

    #[error("shape not registered: {0}")]
    UnregisteredShape(String),

    #[error("body too large: {0} bytes, max {MAX_BODY_SIZE}")]
    BodyTooLarge(usize),

    #[error("malformed payload: {0}")]
    BadEncoding(&'static str),

    #[error("codec misuse: {0}")]
    Internal(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl WireError {
    /// Collapse EOF-while-reading into `Truncated`; the distinction carries
    /// no information for callers.
    pub(crate) fn from_read(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            WireError::Truncated
        } else {
            WireError::Io(err)
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
