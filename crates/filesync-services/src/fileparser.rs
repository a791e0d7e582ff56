//! Parsing of stored content files.
//!
//! On-disk layout: 32 hex characters of checksum, a newline, then the raw
//! payload. The checksum line lets a startup scan rebuild metadata without
//! reading whole blobs.

use std::io::Read;

/// Length of the checksum header, excluding the newline.
pub const CHECKSUM_HEX_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("missing newline separator")]
    MissingSeparator,

    #[error("invalid checksum format")]
    InvalidChecksum,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Split a content file into its checksum and payload.
pub fn parse(content: &[u8]) -> Result<(String, &[u8]), ParseError> {
    let newline = content
        .iter()
        .position(|&b| b == b'\n')
        .ok_or(ParseError::MissingSeparator)?;
    let header = &content[..newline];
    if header.len() != CHECKSUM_HEX_LEN {
        return Err(ParseError::InvalidChecksum);
    }
    let checksum = std::str::from_utf8(header).map_err(|_| ParseError::InvalidChecksum)?;
    if !checksum.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ParseError::InvalidChecksum);
    }
    Ok((checksum.to_string(), &content[newline + 1..]))
}

/// Extract only the checksum.
pub fn extract_checksum(content: &[u8]) -> Result<String, ParseError> {
    parse(content).map(|(checksum, _)| checksum)
}

/// Extract only the payload.
pub fn extract_blob(content: &[u8]) -> Result<&[u8], ParseError> {
    parse(content).map(|(_, blob)| blob)
}

/// Read just enough of a reader to extract the checksum. Spares the scan
/// from pulling whole blobs into memory.
pub fn extract_checksum_from_reader(reader: &mut impl Read) -> Result<String, ParseError> {
    let mut header = [0u8; CHECKSUM_HEX_LEN + 1];
    reader.read_exact(&mut header)?;
    if header[CHECKSUM_HEX_LEN] != b'\n' {
        return Err(ParseError::MissingSeparator);
    }
    let checksum =
        std::str::from_utf8(&header[..CHECKSUM_HEX_LEN]).map_err(|_| ParseError::InvalidChecksum)?;
    if !checksum.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ParseError::InvalidChecksum);
    }
    Ok(checksum.to_string())
}

// ── Tests ────────────────────────────────────────────────────────────────────
