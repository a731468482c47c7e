//! Hex dump codec
//!
//! Renders a byte buffer as the two panes of the viewer (hex with offsets,
//! and the ASCII gutter) and parses an edited hex pane back into bytes.

use thiserror::Error;

/// Bytes shown on one dump row.
pub const BYTES_PER_ROW: usize = 16;

/// Width of the byte-group column ("XX " * 16 without the trailing space).
pub const HEX_GROUP_WIDTH: usize = BYTES_PER_ROW * 3 - 1;

/// Width of the offset column including its two separating spaces.
const OFFSET_COLUMN_WIDTH: usize = 10;

/// Why a hex text could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    OddLength,
    InvalidHexCharacter,
}

impl DecodeErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecodeErrorKind::OddLength => "odd-length",
            DecodeErrorKind::InvalidHexCharacter => "invalid-hex-character",
        }
    }
}

/// Decode failure. `position` is a byte offset into the text handed to
/// [`decode`], not into the whitespace-stripped digits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot decode hex text ({}) at byte {position}", reason.as_str())]
pub struct DecodeError {
    pub reason: DecodeErrorKind,
    pub position: usize,
}

/// One row of the dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexRow {
    pub offset: usize,
    /// Byte group, padded to [`HEX_GROUP_WIDTH`].
    pub hex: String,
    pub ascii: String,
    pub len: usize,
}

impl HexRow {
    fn new(offset: usize, chunk: &[u8]) -> Self {
        let group = chunk
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            offset,
            hex: format!("{:<width$}", group, width = HEX_GROUP_WIDTH),
            ascii: chunk.iter().map(|&b| printable(b)).collect(),
            len: chunk.len(),
        }
    }

    /// Offset column as shown in the hex pane.
    pub fn offset_label(&self) -> String {
        format!("{:08X}", self.offset)
    }

    /// Full hex pane line: offset, two spaces, padded byte group.
    pub fn hex_line(&self) -> String {
        format!("{}  {}", self.offset_label(), self.hex)
    }
}

/// Both panes of a dump. Line n of `hex` and `ascii` describe the same row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HexDump {
    pub hex: String,
    pub ascii: String,
}

/// Map a byte to its ASCII gutter character.
pub fn printable(byte: u8) -> char {
    if (0x20..=0x7E).contains(&byte) {
        byte as char
    } else {
        '.'
    }
}

/// Rows of the dump in buffer order.
pub fn rows(data: &[u8]) -> impl Iterator<Item = HexRow> + '_ {
    data.chunks(BYTES_PER_ROW)
        .enumerate()
        .map(|(i, chunk)| HexRow::new(i * BYTES_PER_ROW, chunk))
}

/// Row starting at `offset`, if the buffer reaches that far.
pub fn row_at(data: &[u8], offset: usize) -> Option<HexRow> {
    if offset >= data.len() {
        return None;
    }
    let end = (offset + BYTES_PER_ROW).min(data.len());
    Some(HexRow::new(offset, &data[offset..end]))
}

/// Render the hex and ASCII panes.
pub fn encode(data: &[u8]) -> HexDump {
    let (hex, ascii): (Vec<String>, Vec<String>) =
        rows(data).map(|row| (row.hex_line(), row.ascii)).unzip();
    HexDump {
        hex: hex.join("\n"),
        ascii: ascii.join("\n"),
    }
}

/// Parse an edited hex pane (byte groups only) back into bytes.
///
/// Spaces and line breaks are ignored. Offset labels must already be
/// removed; see [`strip_offsets`]. A non-hex character is reported before
/// an odd digit count.
pub fn decode(text: &str) -> Result<Vec<u8>, DecodeError> {
    let mut digits = String::with_capacity(text.len());
    let mut last = 0;
    for (pos, ch) in text.char_indices() {
        if matches!(ch, ' ' | '\n' | '\r') {
            continue;
        }
        if !ch.is_ascii_hexdigit() {
            return Err(DecodeError {
                reason: DecodeErrorKind::InvalidHexCharacter,
                position: pos,
            });
        }
        digits.push(ch);
        last = pos;
    }

    let odd_length = DecodeError {
        reason: DecodeErrorKind::OddLength,
        position: last,
    };
    if digits.len() % 2 != 0 {
        return Err(odd_length);
    }
    hex::decode(&digits).map_err(|_| odd_length)
}

/// Remove the `XXXXXXXX  ` offset column from every line that has one.
pub fn strip_offsets(text: &str) -> String {
    text.lines()
        .map(|line| {
            let bytes = line.as_bytes();
            let has_offset = bytes.len() >= OFFSET_COLUMN_WIDTH
                && bytes[..8].iter().all(u8::is_ascii_hexdigit)
                && &bytes[8..OFFSET_COLUMN_WIDTH] == b"  ";
            if has_offset {
                &line[OFFSET_COLUMN_WIDTH..]
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group_only(hex_pane: &str) -> String {
        strip_offsets(hex_pane)
    }

    #[test]
    fn empty_buffer_has_no_lines() {
        assert_eq!(encode(&[]), HexDump::default());
        assert_eq!(rows(&[]).count(), 0);
    }

    #[test]
    fn short_row_is_padded() {
        let dump = encode(b"ABC");
        assert_eq!(dump.hex, format!("00000000  {:<47}", "41 42 43"));
        assert!(dump.hex.starts_with("00000000  41 42 43"));
        assert_eq!(dump.hex.len(), 10 + HEX_GROUP_WIDTH);
        assert_eq!(dump.ascii, "ABC");
    }

    #[test]
    fn seventeen_bytes_make_two_rows() {
        let mut data: Vec<u8> = (0x00..=0x0F).collect();
        data.push(0x41);
        let dump = encode(&data);

        let hex: Vec<&str> = dump.hex.lines().collect();
        assert_eq!(hex.len(), 2);
        assert_eq!(
            hex[0],
            "00000000  00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F"
        );
        assert_eq!(hex[1], format!("00000010  {:<47}", "41"));

        let ascii: Vec<&str> = dump.ascii.lines().collect();
        assert_eq!(ascii, vec!["................", "A"]);
    }

    #[test]
    fn full_row_needs_no_padding() {
        let data = [0x7Eu8; 16];
        let dump = encode(&data);
        assert_eq!(dump.hex.lines().count(), 1);
        assert_eq!(dump.ascii, "~".repeat(16));
        assert!(!dump.hex.ends_with(' '));
    }

    #[test]
    fn gutter_boundaries() {
        assert_eq!(printable(0x1F), '.');
        assert_eq!(printable(0x20), ' ');
        assert_eq!(printable(0x7E), '~');
        assert_eq!(printable(0x7F), '.');
        assert_eq!(printable(0xFF), '.');
    }

    #[test]
    fn decode_inverts_encode() {
        let data: Vec<u8> = (0..=255u8).chain(0..37).collect();
        let dump = encode(&data);
        assert_eq!(decode(&group_only(&dump.hex)).unwrap(), data);
    }

    #[test]
    fn decode_accepts_lowercase_and_crlf() {
        assert_eq!(decode("de ad\r\nbe EF").unwrap(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn decode_rejects_invalid_character() {
        let err = decode("0g").unwrap_err();
        assert_eq!(err.reason, DecodeErrorKind::InvalidHexCharacter);
        assert_eq!(err.position, 1);

        // 位置は元のテキスト上のオフセット
        let err = decode("00 11\nzz").unwrap_err();
        assert_eq!(err.reason, DecodeErrorKind::InvalidHexCharacter);
        assert_eq!(err.position, 6);
    }

    #[test]
    fn decode_rejects_non_ascii_before_length_check() {
        let err = decode("0é").unwrap_err();
        assert_eq!(err.reason, DecodeErrorKind::InvalidHexCharacter);
        assert_eq!(err.position, 1);

        let err = decode("ü1").unwrap_err();
        assert_eq!(err.reason, DecodeErrorKind::InvalidHexCharacter);
        assert_eq!(err.position, 0);

        // 奇数長でも不正文字を優先する
        let err = decode("41 4 日").unwrap_err();
        assert_eq!(err.reason, DecodeErrorKind::InvalidHexCharacter);
        assert_eq!(err.position, 5);
    }

    #[test]
    fn decode_rejects_odd_length() {
        let err = decode("0").unwrap_err();
        assert_eq!(err.reason, DecodeErrorKind::OddLength);
        assert_eq!(err.reason.as_str(), "odd-length");
        assert_eq!(err.position, 0);
    }

    #[test]
    fn decode_empty_text() {
        assert_eq!(decode("").unwrap(), Vec::<u8>::new());
        assert_eq!(decode(" \n ").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn strip_offsets_leaves_plain_groups() {
        assert_eq!(strip_offsets("41 42\n43"), "41 42\n43");
        assert_eq!(strip_offsets("00000010  41"), "41");
    }

    #[test]
    fn row_at_clamps_to_buffer() {
        let data = [1u8; 20];
        let row = row_at(&data, 16).unwrap();
        assert_eq!(row.len, 4);
        assert_eq!(row.offset_label(), "00000010");
        assert!(row_at(&data, 20).is_none());
    }
}
