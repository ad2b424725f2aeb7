//! Bounds-checked little-endian field access for packed protocol structures.

use crate::{Result, XippError};

fn field<'a>(data: &'a [u8], offset: usize, len: usize, context: &str) -> Result<&'a [u8]> {
    let end = offset.checked_add(len).unwrap_or(usize::MAX);
    data.get(offset..end).ok_or_else(|| XippError::Parse {
        context: context.to_string(),
        details: format!(
            "Field at offset {} needs {} bytes, payload has {}",
            offset,
            len,
            data.len()
        ),
    })
}

pub(crate) fn read_u8(data: &[u8], offset: usize, context: &str) -> Result<u8> {
    Ok(field(data, offset, 1, context)?[0])
}

pub(crate) fn read_u16_le(data: &[u8], offset: usize, context: &str) -> Result<u16> {
    let bytes = field(data, offset, 2, context)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

pub(crate) fn read_u32_le(data: &[u8], offset: usize, context: &str) -> Result<u32> {
    let bytes = field(data, offset, 4, context)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub(crate) fn read_i32_le(data: &[u8], offset: usize, context: &str) -> Result<i32> {
    let bytes = field(data, offset, 4, context)?;
    Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub(crate) fn read_f32_le(data: &[u8], offset: usize, context: &str) -> Result<f32> {
    let bytes = field(data, offset, 4, context)?;
    Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Read a fixed-width, NUL-padded character array.
pub(crate) fn read_fixed_str(data: &[u8], offset: usize, len: usize, context: &str) -> Result<String> {
    Ok(extract_null_terminated_string(field(data, offset, len, context)?))
}

/// Borrow `len` raw bytes at `offset`.
pub(crate) fn read_bytes<'a>(
    data: &'a [u8],
    offset: usize,
    len: usize,
    context: &str,
) -> Result<&'a [u8]> {
    field(data, offset, len, context)
}

pub(crate) fn extract_null_terminated_string(bytes: &[u8]) -> String {
    let null_pos = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..null_pos]).to_string()
}

pub(crate) fn put_u16_le(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub(crate) fn put_u32_le(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub(crate) fn put_i32_le(buf: &mut Vec<u8>, value: i32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub(crate) fn put_f32_le(buf: &mut Vec<u8>, value: f32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Write `value` into a `len`-byte character array, always leaving room for a NUL.
pub(crate) fn put_fixed_str(buf: &mut Vec<u8>, value: &str, len: usize) {
    if len == 0 {
        return;
    }
    let text = truncate_to_boundary(value, len - 1);
    buf.extend_from_slice(text.as_bytes());
    buf.resize(buf.len() + (len - text.len()), 0);
}

/// Longest prefix of `value` that fits in `max_bytes` without splitting a character.
pub(crate) fn truncate_to_boundary(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = max_bytes;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_fields() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x00, 0x00, 0x80, 0x3F];
        assert_eq!(read_u8(&data, 1, "test").unwrap(), 0x02);
        assert_eq!(read_u16_le(&data, 0, "test").unwrap(), 0x0201);
        assert_eq!(read_u32_le(&data, 0, "test").unwrap(), 0x0403_0201);
        assert_eq!(read_f32_le(&data, 4, "test").unwrap(), 1.0);
    }

    #[test]
    fn out_of_range_reads_are_parse_errors() {
        let data = [0u8; 6];
        let err = read_u32_le(&data, 4, "trial descriptor").unwrap_err();
        match err {
            XippError::Parse { context, details } => {
                assert_eq!(context, "trial descriptor");
                assert!(details.contains("offset 4"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(read_u16_le(&data, usize::MAX - 1, "overflow").is_err());
    }

    #[test]
    fn fixed_strings_stop_at_nul_and_keep_terminator_room() {
        let mut buf = Vec::new();
        put_fixed_str(&mut buf, "grapevine", 6);
        assert_eq!(buf.len(), 6);
        assert_eq!(&buf[..5], b"grape");
        assert_eq!(buf[5], 0);
        assert_eq!(read_fixed_str(&buf, 0, 6, "label").unwrap(), "grape");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_to_boundary("héllo", 2), "h");
        assert_eq!(truncate_to_boundary("héllo", 3), "hé");
        assert_eq!(truncate_to_boundary("abc", 10), "abc");
    }
}
