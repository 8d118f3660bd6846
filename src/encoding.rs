use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("character {character:?} at position {position} cannot be encoded as {encoding}")]
pub struct EncodingError {
    pub encoding: Encoding,
    pub character: char,
    pub position: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown encoding: {0}")]
pub struct UnknownEncoding(pub String);

/// Text encodings accepted for HL7 payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Ascii,
    Latin1,
    Utf16Le,
    Utf16Be,
}

impl Encoding {
    /// Encodes `text` strictly: the first character the encoding cannot
    /// represent fails the whole operation.
    pub fn encode(self, text: &str) -> Result<Vec<u8>, EncodingError> {
        match self {
            Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
            Encoding::Ascii => self.encode_single_byte(text, 0x7F),
            Encoding::Latin1 => self.encode_single_byte(text, 0xFF),
            Encoding::Utf16Le => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
            Encoding::Utf16Be => Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
        }
    }

    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            Encoding::Utf8 => String::from_utf8(bytes.to_vec()).ok(),
            Encoding::Ascii => bytes
                .iter()
                .map(|&b| b.is_ascii().then_some(b as char))
                .collect(),
            Encoding::Latin1 => Some(bytes.iter().map(|&b| b as char).collect()),
            Encoding::Utf16Le => decode_utf16(bytes, u16::from_le_bytes),
            Encoding::Utf16Be => decode_utf16(bytes, u16::from_be_bytes),
        }
    }

    fn encode_single_byte(self, text: &str, max: u32) -> Result<Vec<u8>, EncodingError> {
        text.chars()
            .enumerate()
            .map(|(position, character)| {
                let code = character as u32;
                if code <= max {
                    Ok(code as u8)
                } else {
                    Err(EncodingError {
                        encoding: self,
                        character,
                        position,
                    })
                }
            })
            .collect()
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    char::decode_utf16(units).collect::<Result<String, _>>().ok()
}

impl FromStr for Encoding {
    type Err = UnknownEncoding;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        let normalized: String = label
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "utf8" => Ok(Encoding::Utf8),
            "ascii" | "usascii" => Ok(Encoding::Ascii),
            "latin1" | "iso88591" | "l1" => Ok(Encoding::Latin1),
            "utf16le" => Ok(Encoding::Utf16Le),
            "utf16" | "utf16be" => Ok(Encoding::Utf16Be),
            _ => Err(UnknownEncoding(label.to_string())),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Ascii => "ascii",
            Encoding::Latin1 => "latin-1",
            Encoding::Utf16Le => "utf-16le",
            Encoding::Utf16Be => "utf-16be",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_labels() {
        assert_eq!("UTF-8".parse(), Ok(Encoding::Utf8));
        assert_eq!("utf8".parse(), Ok(Encoding::Utf8));
        assert_eq!("latin-1".parse(), Ok(Encoding::Latin1));
        assert_eq!("ISO-8859-1".parse(), Ok(Encoding::Latin1));
        assert_eq!("us-ascii".parse(), Ok(Encoding::Ascii));
        assert_eq!("utf_16le".parse(), Ok(Encoding::Utf16Le));
        assert_eq!(
            "ebcdic".parse::<Encoding>(),
            Err(UnknownEncoding("ebcdic".to_string()))
        );
    }

    #[test]
    fn latin1_is_strict() {
        assert_eq!(Encoding::Latin1.encode("José"), Ok(b"Jos\xE9".to_vec()));
        let err = Encoding::Latin1.encode("Zoë €5").unwrap_err();
        assert_eq!(err.character, '€');
        assert_eq!(err.position, 4);
    }

    #[test]
    fn ascii_rejects_accents() {
        let err = Encoding::Ascii.encode("PID|1||Müller").unwrap_err();
        assert_eq!(err.character, 'ü');
        assert_eq!(err.encoding, Encoding::Ascii);
    }

    #[test]
    fn utf16_byte_order() {
        assert_eq!(Encoding::Utf16Le.encode("M").unwrap(), vec![b'M', 0]);
        assert_eq!(Encoding::Utf16Be.encode("M").unwrap(), vec![0, b'M']);
        assert_eq!(Encoding::Utf16Be.decode(&[0, b'M', 0, b'S']).as_deref(), Some("MS"));
        assert_eq!(Encoding::Utf16Le.decode(&[b'M']), None);
    }
}
