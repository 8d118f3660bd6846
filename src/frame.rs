//! MLLP framing: `<VT> payload <FS><CR>`.

use crate::encoding::{Encoding, EncodingError};

pub const START_BLOCK: u8 = 0x0B;
pub const END_BLOCK: u8 = 0x1C;
pub const CARRIAGE_RETURN: u8 = 0x0D;

const TRAILER: [u8; 2] = [END_BLOCK, CARRIAGE_RETURN];

/// Wraps `message` in an MLLP frame after encoding it with `encoding`.
pub fn encode_frame(message: &str, encoding: Encoding) -> Result<Vec<u8>, EncodingError> {
    let payload = encoding.encode(message)?;
    let mut frame = Vec::with_capacity(payload.len() + 3);
    frame.push(START_BLOCK);
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(&TRAILER);
    Ok(frame)
}

/// True when `buffer` ends with the end block followed by a carriage return.
pub fn is_terminated(buffer: &[u8]) -> bool {
    buffer.ends_with(&TRAILER)
}

/// Strips the frame markers, if present.
pub fn unwrap_frame(bytes: &[u8]) -> &[u8] {
    let bytes = bytes.strip_prefix(&[START_BLOCK]).unwrap_or(bytes);
    bytes.strip_suffix(&TRAILER).unwrap_or(bytes)
}
