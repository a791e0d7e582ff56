//! Wire codec — encodes and decodes frames over a byte stream.
//!
//! The body of a frame is a dynamically-shaped [`Value`] walked according to
//! a [`Shape`] from the registry. Encoding rules (network byte order
//! throughout):
//!
//! | shape        | representation                                      |
//! |--------------|-----------------------------------------------------|
//! | fixed ints   | fixed-width big-endian                              |
//! | `int`/`uint` | 4 bytes big-endian, zero/sign-extended              |
//! | `f32`/`f64`  | IEEE-754 big-endian                                 |
//! | `bool`       | 1 byte, 0 or 1                                      |
//! | `string`     | u16 length, then UTF-8 bytes                        |
//! | `seq<T>`     | u32 element count, then the elements                |
//! | record       | exported fields in declaration order                |
//! | `null`       | zero bytes                                          |
//!
//! Non-exported record fields are skipped on encode and left at their
//! default on decode. Strings are opaque: invalid UTF-8 never fails decode.

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::registry::{self, RecordShape, Shape};
use crate::wire::{
    Frame, Header, WireError, FLAG_TRANSACTION_ID, HEADER_SIZE_WITH_TRANSACTION_ID, MAX_BODY_SIZE,
    NO_TRANSACTION, VERSION,
};

// ── Values ───────────────────────────────────────────────────────────────────

/// A dynamically-typed payload value.
///
/// `Bytes` is the concrete form of `seq<u8>`; `Seq` carries its element
/// shape so empty sequences still know what they hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(isize),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    UInt(usize),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Str(String),
    Bytes(Vec<u8>),
    Seq(Shape, Vec<Value>),
    Record(&'static RecordShape, Vec<Value>),
}

impl Value {
    /// The shape this value encodes as.
    pub fn shape(&self) -> Shape {
        match self {
            Value::Null => Shape::Null,
            Value::Int(_) => Shape::Int,
            Value::I8(_) => Shape::I8,
            Value::I16(_) => Shape::I16,
            Value::I32(_) => Shape::I32,
            Value::I64(_) => Shape::I64,
            Value::UInt(_) => Shape::UInt,
            Value::U8(_) => Shape::U8,
            Value::U16(_) => Shape::U16,
            Value::U32(_) => Shape::U32,
            Value::U64(_) => Shape::U64,
            Value::F32(_) => Shape::F32,
            Value::F64(_) => Shape::F64,
            Value::Bool(_) => Shape::Bool,
            Value::Str(_) => Shape::Str,
            Value::Bytes(_) => Shape::bytes(),
            Value::Seq(elem, _) => Shape::Seq(Box::new(elem.clone())),
            Value::Record(shape, _) => Shape::Record(shape),
        }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>, WireError> {
        match self {
            Value::Bytes(b) => Ok(b),
            _ => Err(WireError::BadEncoding("expected byte sequence")),
        }
    }

    pub fn into_string(self) -> Result<String, WireError> {
        match self {
            Value::Str(s) => Ok(s),
            _ => Err(WireError::BadEncoding("expected string")),
        }
    }

    pub fn into_u8(self) -> Result<u8, WireError> {
        match self {
            Value::U8(v) => Ok(v),
            _ => Err(WireError::BadEncoding("expected u8")),
        }
    }

    pub fn into_u16(self) -> Result<u16, WireError> {
        match self {
            Value::U16(v) => Ok(v),
            _ => Err(WireError::BadEncoding("expected u16")),
        }
    }

    pub fn into_bool(self) -> Result<bool, WireError> {
        match self {
            Value::Bool(v) => Ok(v),
            _ => Err(WireError::BadEncoding("expected bool")),
        }
    }

    pub fn into_seq(self) -> Result<Vec<Value>, WireError> {
        match self {
            Value::Seq(_, items) => Ok(items),
            _ => Err(WireError::BadEncoding("expected sequence")),
        }
    }
}

/// A typed payload that crosses the wire as a record.
///
/// Implementations convert between the struct and its exported field values
/// in declaration order; the codec handles the byte layout.
pub trait Record: Sized {
    fn record_shape() -> &'static RecordShape;

    /// Exported field values, in declaration order.
    fn to_values(&self) -> Vec<Value>;

    /// Rebuild from exported field values; non-exported fields default.
    fn from_values(values: Vec<Value>) -> Result<Self, WireError>;

    fn shape() -> Shape {
        Shape::Record(Self::record_shape())
    }

    fn to_value(&self) -> Value {
        Value::Record(Self::record_shape(), self.to_values())
    }

    fn from_value(value: Value) -> Result<Self, WireError> {
        match value {
            Value::Record(shape, values) if shape == Self::record_shape() => {
                Self::from_values(values)
            }
            _ => Err(WireError::BadEncoding("unexpected payload record")),
        }
    }
}

// ── Body encoding ────────────────────────────────────────────────────────────

pub(crate) fn encode_value(buf: &mut BytesMut, value: &Value) -> Result<(), WireError> {
    match value {
        Value::Null => {}
        Value::Int(v) => buf.put_i32(*v as i32),
        Value::I8(v) => buf.put_i8(*v),
        Value::I16(v) => buf.put_i16(*v),
        Value::I32(v) => buf.put_i32(*v),
        Value::I64(v) => buf.put_i64(*v),
        Value::UInt(v) => buf.put_u32(*v as u32),
        Value::U8(v) => buf.put_u8(*v),
        Value::U16(v) => buf.put_u16(*v),
        Value::U32(v) => buf.put_u32(*v),
        Value::U64(v) => buf.put_u64(*v),
        Value::F32(v) => buf.put_f32(*v),
        Value::F64(v) => buf.put_f64(*v),
        Value::Bool(v) => buf.put_u8(u8::from(*v)),
        Value::Str(s) => {
            let len = u16::try_from(s.len()).map_err(|_| WireError::BodyTooLarge(s.len()))?;
            buf.put_u16(len);
            buf.put_slice(s.as_bytes());
        }
        Value::Bytes(b) => {
            let len = u32::try_from(b.len()).map_err(|_| WireError::BodyTooLarge(b.len()))?;
            buf.put_u32(len);
            buf.put_slice(b);
        }
        Value::Seq(elem, items) => {
            let len = u32::try_from(items.len()).map_err(|_| WireError::BodyTooLarge(items.len()))?;
            buf.put_u32(len);
            for item in items {
                if item.shape() != *elem {
                    return Err(WireError::Internal("sequence element shape mismatch"));
                }
                encode_value(buf, item)?;
            }
        }
        Value::Record(shape, values) => {
            let mut values = values.iter();
            for field in shape.fields {
                if !field.exported {
                    continue;
                }
                let value = values
                    .next()
                    .ok_or(WireError::Internal("record value count mismatch"))?;
                if value.shape() != (field.shape)() {
                    return Err(WireError::Internal("record field shape mismatch"));
                }
                encode_value(buf, value)?;
            }
            if values.next().is_some() {
                return Err(WireError::Internal("record value count mismatch"));
            }
        }
    }
    Ok(())
}

// ── Body decoding ────────────────────────────────────────────────────────────

struct BodyReader<'a> {
    buf: &'a [u8],
}

impl<'a> BodyReader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.buf.len() < n {
            return Err(WireError::Truncated);
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, WireError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, WireError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, WireError> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }
}

pub(crate) fn decode_body(body: &[u8], shape: &Shape) -> Result<Value, WireError> {
    let mut reader = BodyReader { buf: body };
    decode_value(&mut reader, shape)
}

fn decode_value(r: &mut BodyReader<'_>, shape: &Shape) -> Result<Value, WireError> {
    Ok(match shape {
        Shape::Null => Value::Null,
        Shape::Int => Value::Int(r.u32()? as i32 as isize),
        Shape::I8 => Value::I8(r.u8()? as i8),
        Shape::I16 => Value::I16(r.u16()? as i16),
        Shape::I32 => Value::I32(r.u32()? as i32),
        Shape::I64 => Value::I64(r.u64()? as i64),
        Shape::UInt => Value::UInt(r.u32()? as usize),
        Shape::U8 => Value::U8(r.u8()?),
        Shape::U16 => Value::U16(r.u16()?),
        Shape::U32 => Value::U32(r.u32()?),
        Shape::U64 => Value::U64(r.u64()?),
        Shape::F32 => Value::F32(f32::from_bits(r.u32()?)),
        Shape::F64 => Value::F64(f64::from_bits(r.u64()?)),
        Shape::Bool => Value::Bool(r.u8()? != 0),
        Shape::Str => {
            let len = r.u16()? as usize;
            let raw = r.take(len)?;
            // Strings are opaque on the wire; never reject their bytes.
            Value::Str(String::from_utf8_lossy(raw).into_owned())
        }
        Shape::Seq(elem) if **elem == Shape::U8 => {
            let len = r.u32()? as usize;
            Value::Bytes(r.take(len)?.to_vec())
        }
        Shape::Seq(elem) => {
            let count = r.u32()? as usize;
            // Every element costs at least one byte; a wild count cannot
            // force a wild allocation.
            let mut items = Vec::with_capacity(count.min(r.buf.len()));
            for _ in 0..count {
                items.push(decode_value(r, elem)?);
            }
            Value::Seq((**elem).clone(), items)
        }
        Shape::Record(record) => {
            let mut values = Vec::with_capacity(record.fields.len());
            for field in record.fields {
                if !field.exported {
                    continue;
                }
                values.push(decode_value(r, &(field.shape)())?);
            }
            Value::Record(record, values)
        }
    })
}

// ── Frame encoder ────────────────────────────────────────────────────────────

/// Writes frames to an async byte sink. Each frame goes out as one write.
pub struct Encoder<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> Encoder<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Encode and write one frame.
    ///
    /// `type_id` and `length` are derived from the body; a non-zero
    /// transaction id sets the TRANSACTION_ID flag automatically. Other
    /// flags pass through unchanged.
    pub async fn encode(&mut self, frame: &Frame) -> Result<(), WireError> {
        let mut body = BytesMut::new();
        encode_value(&mut body, &frame.body)?;
        if body.len() > MAX_BODY_SIZE {
            return Err(WireError::BodyTooLarge(body.len()));
        }
        let type_id = registry::id_of(&frame.body.shape())?;

        let mut flags = frame.header.flags;
        if frame.header.transaction_id != NO_TRANSACTION {
            flags |= FLAG_TRANSACTION_ID;
        }

        let mut out = BytesMut::with_capacity(HEADER_SIZE_WITH_TRANSACTION_ID + body.len());
        out.put_u8(VERSION);
        out.put_u8(flags);
        out.put_u16(type_id);
        if flags & FLAG_TRANSACTION_ID != 0 {
            out.put_slice(&frame.header.transaction_id);
        }
        out.put_u16(body.len() as u16);
        out.put_slice(&body);

        self.writer.write_all(&out).await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

// ── Frame decoder ────────────────────────────────────────────────────────────

/// Reads frames from an async byte source.
pub struct Decoder<R> {
    reader: R,
}

impl<R: AsyncRead + Unpin> Decoder<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Read and decode one frame. Short reads surface as `Truncated`; once
    /// any error is returned the stream can no longer be trusted to be
    /// framed.
    pub async fn decode(&mut self) -> Result<Frame, WireError> {
        let mut fixed = [0u8; 4];
        self.reader
            .read_exact(&mut fixed)
            .await
            .map_err(WireError::from_read)?;

        let version = fixed[0];
        if version != VERSION {
            return Err(WireError::UnsupportedVersion(version));
        }
        let flags = fixed[1];
        let type_id = u16::from_be_bytes([fixed[2], fixed[3]]);

        let mut transaction_id = NO_TRANSACTION;
        if flags & FLAG_TRANSACTION_ID != 0 {
            self.reader
                .read_exact(&mut transaction_id)
                .await
                .map_err(WireError::from_read)?;
        }

        let mut len_bytes = [0u8; 2];
        self.reader
            .read_exact(&mut len_bytes)
            .await
            .map_err(WireError::from_read)?;
        let length = u16::from_be_bytes(len_bytes);

        let mut body = vec![0u8; length as usize];
        self.reader
            .read_exact(&mut body)
            .await
            .map_err(WireError::from_read)?;

        let shape = registry::shape_of(type_id)?;
        let value = decode_body(&body, &shape)?;

        Ok(Frame {
            header: Header {
                version,
                flags,
                type_id,
                transaction_id,
                length,
            },
            body: value,
        })
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
