//! Protocol payloads — actions, result tags, and the record types that
//! cross the wire.
//!
//! The type id in the frame header is authoritative: every action has a
//! dedicated request record, and the dispatcher derives the action from the
//! request record's id. The `sender` byte rides in each record rather than
//! in the header. Authentication frames are the exception — they carry
//! primitive bodies (byte sequences and result tags) and never reach the
//! dispatcher.

use crate::codec::{Record, Value};
use crate::registry::{self, FieldShape, RecordShape, Shape};
use crate::wire::WireError;

// ── Actions ──────────────────────────────────────────────────────────────────

/// Semantic tag of a frame. Stable 8-bit values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Action {
    Status = 0,
    Upload = 1,
    Download = 2,
    Delete = 3,
    Chunk = 4,
    List = 5,
    Auth = 6,
    Error = 7,
    Cancel = 8,
    Echo = 9,
}

impl Action {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Status),
            1 => Some(Self::Upload),
            2 => Some(Self::Download),
            3 => Some(Self::Delete),
            4 => Some(Self::Chunk),
            5 => Some(Self::List),
            6 => Some(Self::Auth),
            7 => Some(Self::Error),
            8 => Some(Self::Cancel),
            9 => Some(Self::Echo),
            _ => None,
        }
    }

    /// The request record shape that identifies this action on the wire.
    /// `Auth` has none: its frames carry primitive bodies during the
    /// handshake only.
    pub fn request_shape(self) -> Option<Shape> {
        match self {
            Action::Status => Some(StatusRequest::shape()),
            Action::Upload => Some(UploadRequest::shape()),
            Action::Download => Some(DownloadRequest::shape()),
            Action::Delete => Some(DeleteRequest::shape()),
            Action::Chunk => Some(ChunkData::shape()),
            Action::List => Some(ListRequest::shape()),
            Action::Error => Some(ErrorResponse::shape()),
            Action::Cancel => Some(CancelRequest::shape()),
            Action::Echo => Some(EchoRequest::shape()),
            Action::Auth => None,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Action::Status => "Status",
            Action::Upload => "Upload",
            Action::Download => "Download",
            Action::Delete => "Delete",
            Action::Chunk => "Chunk",
            Action::List => "List",
            Action::Auth => "Auth",
            Action::Error => "Error",
            Action::Cancel => "Cancel",
            Action::Echo => "Echo",
        };
        f.write_str(name)
    }
}

// ── Tags ─────────────────────────────────────────────────────────────────────

/// Which side produced a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Sender {
    Server = 0,
    Client = 1,
}

impl Sender {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Server),
            1 => Some(Self::Client),
            _ => None,
        }
    }
}

/// One-byte result tag of the authentication exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AuthResult {
    Authenticated = 0,
    NewUser = 1,
    Unauthorized = 2,
}

impl AuthResult {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Authenticated),
            1 => Some(Self::NewUser),
            2 => Some(Self::Unauthorized),
            _ => None,
        }
    }
}

/// Sync state of a file as the server sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FileStatus {
    Unknown = 0,
    Stale = 1,
    Dirty = 2,
    Syncing = 3,
    Synced = 4,
}

impl FileStatus {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Unknown),
            1 => Some(Self::Stale),
            2 => Some(Self::Dirty),
            3 => Some(Self::Syncing),
            4 => Some(Self::Synced),
            _ => None,
        }
    }
}

/// One-byte completion tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Done {
    No = 0,
    Yes = 1,
}

// ── Field shapes ─────────────────────────────────────────────────────────────

fn shape_u8() -> Shape {
    Shape::U8
}

fn shape_u16() -> Shape {
    Shape::U16
}

fn shape_bool() -> Shape {
    Shape::Bool
}

fn shape_str() -> Shape {
    Shape::Str
}

fn shape_bytes() -> Shape {
    Shape::bytes()
}

fn shape_file_info() -> Shape {
    Shape::Record(&FILE_INFO_SHAPE)
}

fn shape_file_info_seq() -> Shape {
    Shape::Seq(Box::new(shape_file_info()))
}

fn next(values: &mut std::vec::IntoIter<Value>) -> Result<Value, WireError> {
    values.next().ok_or(WireError::BadEncoding("missing record field"))
}

fn sender_from(value: Value) -> Result<Sender, WireError> {
    Sender::from_u8(value.into_u8()?).ok_or(WireError::BadEncoding("unknown sender"))
}

// ── File descriptor ──────────────────────────────────────────────────────────

pub const FILE_HASH_SIZE: usize = 8;
pub const CHECKSUM_SIZE: usize = 32;

/// Content-addressed file descriptor: 8-byte content hash, 32-character
/// checksum, and a coarse 16-bit modification stamp. The core never looks
/// inside the hash or checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub hash: Vec<u8>,
    pub checksum: Vec<u8>,
    pub timestamp: u16,
}

static FILE_INFO_SHAPE: RecordShape = RecordShape {
    name: "FileInfo",
    fields: &[
        FieldShape {
            name: "hash",
            shape: shape_bytes,
            exported: true,
        },
        FieldShape {
            name: "checksum",
            shape: shape_bytes,
            exported: true,
        },
        FieldShape {
            name: "timestamp",
            shape: shape_u16,
            exported: true,
        },
    ],
};

impl FileInfo {
    pub fn new(hash: Vec<u8>, checksum: Vec<u8>, timestamp: u16) -> Self {
        Self {
            hash,
            checksum,
            timestamp,
        }
    }

    /// Hex spelling of the content hash, used as the on-disk file name.
    pub fn hash_hex(&self) -> String {
        hex::encode(&self.hash)
    }

    pub fn checksum_str(&self) -> String {
        String::from_utf8_lossy(&self.checksum).into_owned()
    }
}

impl Record for FileInfo {
    fn record_shape() -> &'static RecordShape {
        &FILE_INFO_SHAPE
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Bytes(self.hash.clone()),
            Value::Bytes(self.checksum.clone()),
            Value::U16(self.timestamp),
        ]
    }

    fn from_values(values: Vec<Value>) -> Result<Self, WireError> {
        let mut values = values.into_iter();
        let hash = next(&mut values)?.into_bytes()?;
        let checksum = next(&mut values)?.into_bytes()?;
        let timestamp = next(&mut values)?.into_u16()?;
        if hash.len() != FILE_HASH_SIZE {
            return Err(WireError::BadEncoding("file hash must be 8 bytes"));
        }
        if checksum.len() != CHECKSUM_SIZE {
            return Err(WireError::BadEncoding("file checksum must be 32 bytes"));
        }
        Ok(Self {
            hash,
            checksum,
            timestamp,
        })
    }
}

// ── Request / response records ───────────────────────────────────────────────

macro_rules! record_shape {
    ($static_name:ident, $name:literal, [$(($field:literal, $shape:path)),+ $(,)?]) => {
        static $static_name: RecordShape = RecordShape {
            name: $name,
            fields: &[
                $(FieldShape {
                    name: $field,
                    shape: $shape,
                    exported: true,
                },)+
            ],
        };
    };
}

record_shape!(STATUS_REQUEST_SHAPE, "StatusRequest", [
    ("sender", shape_u8),
    ("file", shape_file_info),
]);

record_shape!(STATUS_RESPONSE_SHAPE, "StatusResponse", [
    ("sender", shape_u8),
    ("status", shape_u8),
]);

record_shape!(UPLOAD_REQUEST_SHAPE, "UploadRequest", [
    ("sender", shape_u8),
    ("file", shape_file_info),
    ("data", shape_bytes),
]);

record_shape!(UPLOAD_RESPONSE_SHAPE, "UploadResponse", [
    ("sender", shape_u8),
    ("done", shape_u8),
]);

record_shape!(DOWNLOAD_REQUEST_SHAPE, "DownloadRequest", [
    ("sender", shape_u8),
    ("hash", shape_bytes),
]);

record_shape!(DOWNLOAD_RESPONSE_SHAPE, "DownloadResponse", [
    ("sender", shape_u8),
    ("data", shape_bytes),
]);

record_shape!(DELETE_REQUEST_SHAPE, "DeleteRequest", [
    ("sender", shape_u8),
    ("hash", shape_bytes),
]);

record_shape!(DELETE_RESPONSE_SHAPE, "DeleteResponse", [
    ("sender", shape_u8),
    ("done", shape_u8),
]);

record_shape!(CHUNK_DATA_SHAPE, "ChunkData", [
    ("sender", shape_u8),
    ("data", shape_bytes),
    ("last", shape_bool),
]);

record_shape!(LIST_REQUEST_SHAPE, "ListRequest", [
    ("sender", shape_u8),
]);

record_shape!(LIST_RESPONSE_SHAPE, "ListResponse", [
    ("sender", shape_u8),
    ("files", shape_file_info_seq),
]);

record_shape!(ECHO_REQUEST_SHAPE, "EchoRequest", [
    ("sender", shape_u8),
    ("data", shape_bytes),
]);

record_shape!(ERROR_RESPONSE_SHAPE, "ErrorResponse", [
    ("sender", shape_u8),
    ("message", shape_str),
]);

record_shape!(CANCEL_REQUEST_SHAPE, "CancelRequest", [
    ("sender", shape_u8),
]);

/// Ask for the sync state of one file.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRequest {
    pub sender: Sender,
    pub file: FileInfo,
}

impl Record for StatusRequest {
    fn record_shape() -> &'static RecordShape {
        &STATUS_REQUEST_SHAPE
    }

    fn to_values(&self) -> Vec<Value> {
        vec![Value::U8(self.sender as u8), self.file.to_value()]
    }

    fn from_values(values: Vec<Value>) -> Result<Self, WireError> {
        let mut values = values.into_iter();
        Ok(Self {
            sender: sender_from(next(&mut values)?)?,
            file: FileInfo::from_value(next(&mut values)?)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusResponse {
    pub sender: Sender,
    pub status: FileStatus,
}

impl Record for StatusResponse {
    fn record_shape() -> &'static RecordShape {
        &STATUS_RESPONSE_SHAPE
    }

    fn to_values(&self) -> Vec<Value> {
        vec![Value::U8(self.sender as u8), Value::U8(self.status as u8)]
    }

    fn from_values(values: Vec<Value>) -> Result<Self, WireError> {
        let mut values = values.into_iter();
        Ok(Self {
            sender: sender_from(next(&mut values)?)?,
            status: FileStatus::from_u8(next(&mut values)?.into_u8()?)
                .ok_or(WireError::BadEncoding("unknown file status"))?,
        })
    }
}

/// Store a file. An empty `data` announces a chunked upload: the blob
/// follows as `ChunkData` frames on the same transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub sender: Sender,
    pub file: FileInfo,
    pub data: Vec<u8>,
}

impl Record for UploadRequest {
    fn record_shape() -> &'static RecordShape {
        &UPLOAD_REQUEST_SHAPE
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::U8(self.sender as u8),
            self.file.to_value(),
            Value::Bytes(self.data.clone()),
        ]
    }

    fn from_values(values: Vec<Value>) -> Result<Self, WireError> {
        let mut values = values.into_iter();
        Ok(Self {
            sender: sender_from(next(&mut values)?)?,
            file: FileInfo::from_value(next(&mut values)?)?,
            data: next(&mut values)?.into_bytes()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadResponse {
    pub sender: Sender,
    pub done: Done,
}

impl Record for UploadResponse {
    fn record_shape() -> &'static RecordShape {
        &UPLOAD_RESPONSE_SHAPE
    }

    fn to_values(&self) -> Vec<Value> {
        vec![Value::U8(self.sender as u8), Value::U8(self.done as u8)]
    }

    fn from_values(values: Vec<Value>) -> Result<Self, WireError> {
        let mut values = values.into_iter();
        let sender = sender_from(next(&mut values)?)?;
        let done = match next(&mut values)?.into_u8()? {
            0 => Done::No,
            _ => Done::Yes,
        };
        Ok(Self { sender, done })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
    pub sender: Sender,
    pub hash: Vec<u8>,
}

impl Record for DownloadRequest {
    fn record_shape() -> &'static RecordShape {
        &DOWNLOAD_REQUEST_SHAPE
    }

    fn to_values(&self) -> Vec<Value> {
        vec![Value::U8(self.sender as u8), Value::Bytes(self.hash.clone())]
    }

    fn from_values(values: Vec<Value>) -> Result<Self, WireError> {
        let mut values = values.into_iter();
        Ok(Self {
            sender: sender_from(next(&mut values)?)?,
            hash: next(&mut values)?.into_bytes()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadResponse {
    pub sender: Sender,
    pub data: Vec<u8>,
}

impl Record for DownloadResponse {
    fn record_shape() -> &'static RecordShape {
        &DOWNLOAD_RESPONSE_SHAPE
    }

    fn to_values(&self) -> Vec<Value> {
        vec![Value::U8(self.sender as u8), Value::Bytes(self.data.clone())]
    }

    fn from_values(values: Vec<Value>) -> Result<Self, WireError> {
        let mut values = values.into_iter();
        Ok(Self {
            sender: sender_from(next(&mut values)?)?,
            data: next(&mut values)?.into_bytes()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRequest {
    pub sender: Sender,
    pub hash: Vec<u8>,
}

impl Record for DeleteRequest {
    fn record_shape() -> &'static RecordShape {
        &DELETE_REQUEST_SHAPE
    }

    fn to_values(&self) -> Vec<Value> {
        vec![Value::U8(self.sender as u8), Value::Bytes(self.hash.clone())]
    }

    fn from_values(values: Vec<Value>) -> Result<Self, WireError> {
        let mut values = values.into_iter();
        Ok(Self {
            sender: sender_from(next(&mut values)?)?,
            hash: next(&mut values)?.into_bytes()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteResponse {
    pub sender: Sender,
    pub done: Done,
}

impl Record for DeleteResponse {
    fn record_shape() -> &'static RecordShape {
        &DELETE_RESPONSE_SHAPE
    }

    fn to_values(&self) -> Vec<Value> {
        vec![Value::U8(self.sender as u8), Value::U8(self.done as u8)]
    }

    fn from_values(values: Vec<Value>) -> Result<Self, WireError> {
        let mut values = values.into_iter();
        let sender = sender_from(next(&mut values)?)?;
        let done = match next(&mut values)?.into_u8()? {
            0 => Done::No,
            _ => Done::Yes,
        };
        Ok(Self { sender, done })
    }
}

/// One piece of a chunked upload; continuation frames of an Upload
/// transaction. `last` closes the blob.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkData {
    pub sender: Sender,
    pub data: Vec<u8>,
    pub last: bool,
}

impl Record for ChunkData {
    fn record_shape() -> &'static RecordShape {
        &CHUNK_DATA_SHAPE
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::U8(self.sender as u8),
            Value::Bytes(self.data.clone()),
            Value::Bool(self.last),
        ]
    }

    fn from_values(values: Vec<Value>) -> Result<Self, WireError> {
        let mut values = values.into_iter();
        Ok(Self {
            sender: sender_from(next(&mut values)?)?,
            data: next(&mut values)?.into_bytes()?,
            last: next(&mut values)?.into_bool()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListRequest {
    pub sender: Sender,
}

impl Record for ListRequest {
    fn record_shape() -> &'static RecordShape {
        &LIST_REQUEST_SHAPE
    }

    fn to_values(&self) -> Vec<Value> {
        vec![Value::U8(self.sender as u8)]
    }

    fn from_values(values: Vec<Value>) -> Result<Self, WireError> {
        let mut values = values.into_iter();
        Ok(Self {
            sender: sender_from(next(&mut values)?)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListResponse {
    pub sender: Sender,
    pub files: Vec<FileInfo>,
}

impl Record for ListResponse {
    fn record_shape() -> &'static RecordShape {
        &LIST_RESPONSE_SHAPE
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::U8(self.sender as u8),
            Value::Seq(
                shape_file_info(),
                self.files.iter().map(|f| f.to_value()).collect(),
            ),
        ]
    }

    fn from_values(values: Vec<Value>) -> Result<Self, WireError> {
        let mut values = values.into_iter();
        let sender = sender_from(next(&mut values)?)?;
        let files = next(&mut values)?
            .into_seq()?
            .into_iter()
            .map(FileInfo::from_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { sender, files })
    }
}

/// Development-only loopback payload.
#[derive(Debug, Clone, PartialEq)]
pub struct EchoRequest {
    pub sender: Sender,
    pub data: Vec<u8>,
}

impl Record for EchoRequest {
    fn record_shape() -> &'static RecordShape {
        &ECHO_REQUEST_SHAPE
    }

    fn to_values(&self) -> Vec<Value> {
        vec![Value::U8(self.sender as u8), Value::Bytes(self.data.clone())]
    }

    fn from_values(values: Vec<Value>) -> Result<Self, WireError> {
        let mut values = values.into_iter();
        Ok(Self {
            sender: sender_from(next(&mut values)?)?,
            data: next(&mut values)?.into_bytes()?,
        })
    }
}

/// User-visible failure, sent with the ERROR flag set.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub sender: Sender,
    pub message: String,
}

impl Record for ErrorResponse {
    fn record_shape() -> &'static RecordShape {
        &ERROR_RESPONSE_SHAPE
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::U8(self.sender as u8),
            Value::Str(self.message.clone()),
        ]
    }

    fn from_values(values: Vec<Value>) -> Result<Self, WireError> {
        let mut values = values.into_iter();
        Ok(Self {
            sender: sender_from(next(&mut values)?)?,
            message: next(&mut values)?.into_string()?,
        })
    }
}

/// Tears down the whole session, open transactions included.
#[derive(Debug, Clone, PartialEq)]
pub struct CancelRequest {
    pub sender: Sender,
}

impl Record for CancelRequest {
    fn record_shape() -> &'static RecordShape {
        &CANCEL_REQUEST_SHAPE
    }

    fn to_values(&self) -> Vec<Value> {
        vec![Value::U8(self.sender as u8)]
    }

    fn from_values(values: Vec<Value>) -> Result<Self, WireError> {
        let mut values = values.into_iter();
        Ok(Self {
            sender: sender_from(next(&mut values)?)?,
        })
    }
}

// ── Registration ─────────────────────────────────────────────────────────────

/// Register every payload record. Call once at process start, before any
/// frame is encoded or decoded; both peers must agree on the order.
pub fn register_payloads() {
    registry::register(FileInfo::shape());
    registry::register(StatusRequest::shape());
    registry::register(StatusResponse::shape());
    registry::register(UploadRequest::shape());
    registry::register(UploadResponse::shape());
    registry::register(DownloadRequest::shape());
    registry::register(DownloadResponse::shape());
    registry::register(DeleteRequest::shape());
    registry::register(DeleteResponse::shape());
    registry::register(ChunkData::shape());
    registry::register(ListRequest::shape());
    registry::register(ListResponse::shape());
    registry::register(EchoRequest::shape());
    registry::register(ErrorResponse::shape());
    registry::register(CancelRequest::shape());
}

// ── Tests ────────────────────────────────────────────────────────────────────
