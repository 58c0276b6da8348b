//! Binary report codec for the terminal record set.
//!
//! Layout: a 4-byte big-endian record count, then per record the request
//! id, part id, quantity (4-byte big-endian), and status name. Strings are
//! 2-byte big-endian length followed by modified UTF-8 bytes (NUL as
//! `C0 80`, supplementary code points as CESU-8 surrogate pairs), matching
//! the JVM `DataOutputStream.writeUTF` wire format so existing report
//! consumers keep working. There is no trailing padding.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use crate::types::{PartRequest, RequestStatus};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("string of {len} encoded bytes exceeds the 65535-byte field limit")]
    StringTooLong { len: usize },
    #[error("report data truncated at offset {offset}")]
    Truncated { offset: usize },
    #[error("malformed string encoding at offset {offset}")]
    MalformedString { offset: usize },
    #[error("unknown status name: {0}")]
    UnknownStatus(String),
    #[error("{0} bytes of trailing data after the last record")]
    TrailingData(usize),
}

/// One decoded report record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub request_id: String,
    pub part_id: String,
    pub qty: i32,
    pub status: RequestStatus,
}

impl From<&PartRequest> for ReportEntry {
    fn from(request: &PartRequest) -> Self {
        Self {
            request_id: request.id.clone(),
            part_id: request.part.id.clone(),
            qty: request.qty,
            status: request.status,
        }
    }
}

/// Encode the record set into the report wire format.
pub fn encode(requests: &[PartRequest]) -> Result<Vec<u8>, ReportError> {
    let mut buf = Vec::with_capacity(4 + requests.len() * 32);
    buf.extend_from_slice(&(requests.len() as u32).to_be_bytes());
    for request in requests {
        put_string(&mut buf, &request.id)?;
        put_string(&mut buf, &request.part.id)?;
        buf.extend_from_slice(&request.qty.to_be_bytes());
        put_string(&mut buf, request.status.as_str())?;
    }
    Ok(buf)
}

/// Decode a full report. Trailing bytes after the last record are an error.
pub fn decode(bytes: &[u8]) -> Result<Vec<ReportEntry>, ReportError> {
    let mut cursor = Cursor { bytes, offset: 0 };
    let count = cursor.take_u32()?;

    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let request_id = cursor.take_string()?;
        let part_id = cursor.take_string()?;
        let qty = cursor.take_u32()? as i32;
        let status_name = cursor.take_string()?;
        let status = RequestStatus::from_name(&status_name)
            .ok_or(ReportError::UnknownStatus(status_name))?;
        entries.push(ReportEntry {
            request_id,
            part_id,
            qty,
            status,
        });
    }

    if cursor.offset != bytes.len() {
        return Err(ReportError::TrailingData(bytes.len() - cursor.offset));
    }
    Ok(entries)
}

/// Write the record set to `path`, replacing any existing report.
pub fn write_report(path: &Path, requests: &[PartRequest]) -> Result<usize, ReportError> {
    let encoded = encode(requests)?;
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&encoded)?;
    writer.flush()?;
    Ok(requests.len())
}

/// Read a report file back into records.
pub fn read_report(path: &Path) -> Result<Vec<ReportEntry>, ReportError> {
    let bytes = std::fs::read(path)?;
    decode(&bytes)
}

/// Append a length-prefixed modified UTF-8 string.
fn put_string(buf: &mut Vec<u8>, s: &str) -> Result<(), ReportError> {
    let mut bytes = Vec::with_capacity(s.len());
    for ch in s.chars() {
        let c = ch as u32;
        match c {
            0x0001..=0x007F => bytes.push(c as u8),
            // NUL uses the two-byte form so no encoded string contains 0x00.
            0x0000 | 0x0080..=0x07FF => {
                bytes.push(0xC0 | ((c >> 6) & 0x1F) as u8);
                bytes.push(0x80 | (c & 0x3F) as u8);
            }
            0x0800..=0xFFFF => put_three_byte(&mut bytes, c),
            _ => {
                // Supplementary plane: encode each UTF-16 surrogate separately.
                let v = c - 0x1_0000;
                put_three_byte(&mut bytes, 0xD800 + (v >> 10));
                put_three_byte(&mut bytes, 0xDC00 + (v & 0x3FF));
            }
        }
    }

    let len = bytes.len();
    if len > u16::MAX as usize {
        return Err(ReportError::StringTooLong { len });
    }
    buf.extend_from_slice(&(len as u16).to_be_bytes());
    buf.extend_from_slice(&bytes);
    Ok(())
}

fn put_three_byte(bytes: &mut Vec<u8>, c: u32) {
    bytes.push(0xE0 | ((c >> 12) & 0x0F) as u8);
    bytes.push(0x80 | ((c >> 6) & 0x3F) as u8);
    bytes.push(0x80 | (c & 0x3F) as u8);
}

struct Cursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl Cursor<'_> {
    fn take(&mut self, n: usize) -> Result<&[u8], ReportError> {
        let end = self.offset + n;
        if end > self.bytes.len() {
            return Err(ReportError::Truncated {
                offset: self.offset,
            });
        }
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn take_u32(&mut self) -> Result<u32, ReportError> {
        let raw = self.take(4)?;
        Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn take_u16(&mut self) -> Result<u16, ReportError> {
        let raw = self.take(2)?;
        Ok(u16::from_be_bytes([raw[0], raw[1]]))
    }

    /// Read a length-prefixed modified UTF-8 string.
    fn take_string(&mut self) -> Result<String, ReportError> {
        let start = self.offset;
        let len = self.take_u16()? as usize;
        let raw = self.take(len)?;

        let malformed = || ReportError::MalformedString { offset: start };
        let mut units: Vec<u16> = Vec::with_capacity(len);
        let mut i = 0;
        while i < raw.len() {
            let b0 = raw[i];
            let unit = match b0 {
                0x01..=0x7F => {
                    i += 1;
                    b0 as u16
                }
                0xC0..=0xDF => {
                    if i + 1 >= raw.len() || raw[i + 1] & 0xC0 != 0x80 {
                        return Err(malformed());
                    }
                    let unit = ((b0 as u16 & 0x1F) << 6) | (raw[i + 1] as u16 & 0x3F);
                    i += 2;
                    unit
                }
                0xE0..=0xEF => {
                    if i + 2 >= raw.len()
                        || raw[i + 1] & 0xC0 != 0x80
                        || raw[i + 2] & 0xC0 != 0x80
                    {
                        return Err(malformed());
                    }
                    let unit = ((b0 as u16 & 0x0F) << 12)
                        | ((raw[i + 1] as u16 & 0x3F) << 6)
                        | (raw[i + 2] as u16 & 0x3F);
                    i += 3;
                    unit
                }
                _ => return Err(malformed()),
            };
            units.push(unit);
        }

        // The units are UTF-16 code units (surrogate pairs included).
        String::from_utf16(&units).map_err(|_| malformed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Part;

    fn request(id: &str, part_id: &str, qty: i32, status: RequestStatus) -> PartRequest {
        PartRequest {
            id: id.to_string(),
            part: Part::new(part_id, "part", ""),
            qty,
            status,
        }
    }

    #[test]
    fn empty_report_is_just_a_count() {
        let bytes = encode(&[]).unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 0]);
        assert!(decode(&bytes).unwrap().is_empty());
    }

    #[test]
    fn ascii_record_has_exact_byte_layout() {
        let bytes = encode(&[request("Task-1", "P1001", 5, RequestStatus::Completed)]).unwrap();

        let mut expected = vec![0, 0, 0, 1];
        expected.extend_from_slice(&[0, 6]);
        expected.extend_from_slice(b"Task-1");
        expected.extend_from_slice(&[0, 5]);
        expected.extend_from_slice(b"P1001");
        expected.extend_from_slice(&[0, 0, 0, 5]);
        expected.extend_from_slice(&[0, 9]);
        expected.extend_from_slice(b"COMPLETED");
        assert_eq!(bytes, expected);
    }

    #[test]
    fn round_trip_preserves_every_tuple() {
        let requests = vec![
            request("Task-1", "P1001", 5, RequestStatus::Completed),
            request("Task-2", "P1A008", 20, RequestStatus::Failed),
            request("Task-3", "P1S11", 1, RequestStatus::InProgress),
        ];
        let decoded = decode(&encode(&requests).unwrap()).unwrap();
        let expected: Vec<ReportEntry> = requests.iter().map(ReportEntry::from).collect();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn nul_encodes_as_two_bytes() {
        let bytes = encode(&[request("a\0b", "P", 1, RequestStatus::Failed)]).unwrap();
        // Length 4: 'a', C0 80, 'b'. No raw zero byte inside the string body.
        assert_eq!(&bytes[4..10], &[0, 4, b'a', 0xC0, 0x80, b'b']);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded[0].request_id, "a\0b");
    }

    #[test]
    fn supplementary_code_points_use_surrogate_pairs() {
        let id = "Task-\u{1F600}";
        let bytes = encode(&[request(id, "P", 1, RequestStatus::Completed)]).unwrap();
        // "Task-" is 5 bytes, the emoji is two 3-byte surrogates.
        assert_eq!(&bytes[4..6], &[0, 11]);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded[0].request_id, id);
    }

    #[test]
    fn bmp_code_points_use_three_bytes() {
        let bytes = encode(&[request("\u{20AC}", "P", 1, RequestStatus::Completed)]).unwrap();
        assert_eq!(&bytes[4..9], &[0, 3, 0xE2, 0x82, 0xAC]);
        assert_eq!(decode(&bytes).unwrap()[0].request_id, "\u{20AC}");
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = encode(&[request("Task-1", "P1001", 5, RequestStatus::Failed)]).unwrap();
        bytes.push(0);
        assert!(matches!(
            decode(&bytes).unwrap_err(),
            ReportError::TrailingData(1)
        ));
    }

    #[test]
    fn truncated_report_is_rejected() {
        let bytes = encode(&[request("Task-1", "P1001", 5, RequestStatus::Failed)]).unwrap();
        assert!(matches!(
            decode(&bytes[..bytes.len() - 3]).unwrap_err(),
            ReportError::Truncated { .. }
        ));
    }

    #[test]
    fn unknown_status_name_is_rejected() {
        let mut bytes = vec![0, 0, 0, 1];
        for s in ["Task-1", "P1001"] {
            bytes.extend_from_slice(&(s.len() as u16).to_be_bytes());
            bytes.extend_from_slice(s.as_bytes());
        }
        bytes.extend_from_slice(&5i32.to_be_bytes());
        bytes.extend_from_slice(&(7u16).to_be_bytes());
        bytes.extend_from_slice(b"UNKNOWN");
        assert!(matches!(
            decode(&bytes).unwrap_err(),
            ReportError::UnknownStatus(_)
        ));
    }

    #[test]
    fn write_and_read_report_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("completed_report.dat");

        let requests = vec![
            request("Task-1", "P1001", 5, RequestStatus::Completed),
            request("Task-2", "P1002", 9, RequestStatus::Failed),
        ];
        let written = write_report(&path, &requests).unwrap();
        assert_eq!(written, 2);

        let entries = read_report(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].part_id, "P1002");
        assert_eq!(entries[1].status, RequestStatus::Failed);
    }
}
