//! OSC 1.0 packet encoding
//!
//! Used by tests and by tools that feed the listener; the service itself only decodes.

use event_batcher::ArgValue;

/// Encode a single OSC message
pub fn encode_message(address: &str, arguments: &[ArgValue]) -> Vec<u8> {
    let mut out = Vec::with_capacity(32 + arguments.len() * 8);
    push_str(&mut out, address);

    let mut tags = String::with_capacity(arguments.len() + 1);
    tags.push(',');
    for arg in arguments {
        tags.push(match arg {
            ArgValue::Bool(true) => 'T',
            ArgValue::Bool(false) => 'F',
            ArgValue::Int32(_) => 'i',
            ArgValue::Int64(_) => 'h',
            ArgValue::Float32(_) => 'f',
            ArgValue::Float64(_) => 'd',
            ArgValue::String(_) => 's',
        });
    }
    push_str(&mut out, &tags);

    for arg in arguments {
        match arg {
            ArgValue::Bool(_) => {}
            ArgValue::Int32(v) => out.extend_from_slice(&v.to_be_bytes()),
            ArgValue::Int64(v) => out.extend_from_slice(&v.to_be_bytes()),
            ArgValue::Float32(v) => out.extend_from_slice(&v.to_bits().to_be_bytes()),
            ArgValue::Float64(v) => out.extend_from_slice(&v.to_bits().to_be_bytes()),
            ArgValue::String(s) => push_str(&mut out, s),
        }
    }

    out
}

/// Wrap already-encoded packets in a bundle with an "immediately" time tag
pub fn encode_bundle(elements: &[Vec<u8>]) -> Vec<u8> {
    let body: usize = elements.iter().map(|e| e.len() + 4).sum();
    let mut out = Vec::with_capacity(16 + body);
    out.extend_from_slice(b"#bundle\0");
    out.extend_from_slice(&1u64.to_be_bytes());
    for element in elements {
        out.extend_from_slice(&(element.len() as i32).to_be_bytes());
        out.extend_from_slice(element);
    }
    out
}

fn push_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    let pad = 4 - (s.len() % 4);
    out.extend(std::iter::repeat(0u8).take(pad));
}
