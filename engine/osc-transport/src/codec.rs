//! OSC 1.0 packet decoding
//!
//! A packet is either a message (address, type tags, arguments) or a `#bundle` holding
//! size-prefixed elements. Strings are NUL-terminated and padded to four bytes; numbers are
//! big-endian. Bundle time tags are read and ignored: every message is dispatched at once.

use event_batcher::ArgValue;

use crate::error::DecodeError;
use crate::MAX_BUNDLE_DEPTH;

const BUNDLE_TAG: &[u8; 8] = b"#bundle\0";

/// One decoded OSC message
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub arguments: Vec<ArgValue>,
}

/// Decode a datagram into the messages it carries, in packet order.
///
/// Arguments the engine cannot represent (blobs, time tags, chars, colours, MIDI, nil,
/// infinitum, array brackets) are skipped. Any structural problem rejects the whole packet.
pub fn decode_packet(bytes: &[u8]) -> Result<Vec<OscMessage>, DecodeError> {
    let mut messages = Vec::new();
    decode_into(bytes, 0, &mut messages)?;
    Ok(messages)
}

fn decode_into(bytes: &[u8], depth: usize, out: &mut Vec<OscMessage>) -> Result<(), DecodeError> {
    match bytes.first() {
        None => Err(DecodeError::Truncated(0)),
        Some(b'/') => {
            out.push(decode_message(bytes)?);
            Ok(())
        }
        Some(b'#') => decode_bundle(bytes, depth, out),
        Some(_) => Err(DecodeError::BadAddress(String::from_utf8_lossy(bytes).chars().take(32).collect())),
    }
}

fn decode_bundle(bytes: &[u8], depth: usize, out: &mut Vec<OscMessage>) -> Result<(), DecodeError> {
    if depth >= MAX_BUNDLE_DEPTH {
        return Err(DecodeError::BadBundleElement(format!("nested deeper than {MAX_BUNDLE_DEPTH}")));
    }

    let mut reader = Reader::new(bytes);
    if reader.take(8)? != BUNDLE_TAG {
        return Err(DecodeError::BadAddress("#bundle".to_string()));
    }
    let _time_tag = reader.take(8)?;

    while !reader.is_empty() {
        let size = reader.read_i32()?;
        if size < 0 || size as usize > reader.remaining() {
            return Err(DecodeError::BadBundleElement(format!(
                "element size {} with {} bytes left",
                size,
                reader.remaining()
            )));
        }
        let element = reader.take(size as usize)?;
        decode_into(element, depth + 1, out)?;
    }

    Ok(())
}

fn decode_message(bytes: &[u8]) -> Result<OscMessage, DecodeError> {
    let mut reader = Reader::new(bytes);
    let address = reader.read_str()?;
    if !address.starts_with('/') {
        return Err(DecodeError::BadAddress(address.to_string()));
    }

    // Some senders omit the type tag string entirely when there are no arguments
    if reader.is_empty() {
        return Ok(OscMessage { address: address.to_string(), arguments: Vec::new() });
    }

    let tags = reader.read_str()?;
    let tags = tags.strip_prefix(',').ok_or(DecodeError::MissingTypeTags)?;

    let mut arguments = Vec::with_capacity(tags.len());
    for tag in tags.chars() {
        match tag {
            'T' => arguments.push(ArgValue::Bool(true)),
            'F' => arguments.push(ArgValue::Bool(false)),
            'i' => arguments.push(ArgValue::Int32(reader.read_i32()?)),
            'h' => arguments.push(ArgValue::Int64(reader.read_i64()?)),
            'f' => arguments.push(ArgValue::Float32(f32::from_bits(reader.read_u32()?))),
            'd' => arguments.push(ArgValue::Float64(f64::from_bits(reader.read_u64()?))),
            's' | 'S' => arguments.push(ArgValue::String(reader.read_str()?.to_string())),
            'b' => {
                let len = reader.read_i32()?;
                if len < 0 {
                    return Err(DecodeError::Truncated(reader.pos));
                }
                reader.take(padded(len as usize))?;
            }
            't' => {
                reader.take(8)?;
            }
            'c' | 'r' | 'm' => {
                reader.take(4)?;
            }
            'N' | 'I' | '[' | ']' => {}
            other => return Err(DecodeError::UnknownTypeTag(other)),
        }
    }

    Ok(OscMessage { address: address.to_string(), arguments })
}

/// Round up to the next multiple of four
fn padded(len: usize) -> usize {
    (len + 3) & !3
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::Truncated(self.pos));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    fn read_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    fn read_u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    fn read_i64(&mut self) -> Result<i64, DecodeError> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }

    /// NUL-terminated string plus its padding
    fn read_str(&mut self) -> Result<&'a str, DecodeError> {
        let start = self.pos;
        let rest = &self.buf[start..];
        let nul = rest.iter().position(|&b| b == 0).ok_or(DecodeError::Truncated(start))?;
        let text = std::str::from_utf8(&rest[..nul]).map_err(|_| DecodeError::InvalidUtf8(start))?;
        self.take(padded(nul + 1))?;
        Ok(text)
    }
}
