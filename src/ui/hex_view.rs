use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::Widget,
};

use super::Colors;
use crate::codec::{self, BYTES_PER_ROW, HEX_GROUP_WIDTH, HexRow};

/// オフセット列の幅（"XXXXXXXX" + 区切り2文字）
const ADDR_WIDTH: u16 = 10;

/// HEX/ASCII 2ペイン表示ウィジェット
///
/// 各行の文字列は `codec` の出力をそのまま使い、色とカーソルだけを重ねる。
pub struct HexView<'a> {
    /// 表示するデータ
    data: &'a [u8],
    /// 表示開始オフセット（行頭）
    offset: usize,
    /// カーソル位置
    cursor: usize,
}

impl<'a> HexView<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            cursor: 0,
        }
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn cursor(mut self, cursor: usize) -> Self {
        self.cursor = cursor;
        self
    }

    /// バイト値に応じた色を取得
    fn byte_color(byte: u8) -> Color {
        match byte {
            0x00 => Colors::HEX_ZERO,
            0xFF => Colors::HEX_HIGH,
            0x20..=0x7E => Colors::HEX_PRINTABLE,
            _ => Colors::HEX_NORMAL,
        }
    }

    /// 1行分を描画
    fn render_row(&self, row: &HexRow, x: u16, y: u16, buf: &mut Buffer) {
        buf.set_string(x, y, row.offset_label(), Style::default().fg(Colors::ADDR));

        // HEXペイン（桁区切りのスペースはcodecの出力に含まれる）
        let hex_x = x + ADDR_WIDTH;
        for i in 0..row.len {
            let pos = row.offset + i;
            let byte = self.data[pos];
            let mut style = Style::default().fg(Self::byte_color(byte));
            if pos == self.cursor {
                style = style.bg(Colors::CURSOR_BG).fg(Colors::CURSOR);
            }
            buf.set_string(hex_x + (i * 3) as u16, y, &row.hex[i * 3..i * 3 + 2], style);
        }

        // ASCIIペイン
        let ascii_x = hex_x + HEX_GROUP_WIDTH as u16 + 2;
        for (i, ch) in row.ascii.chars().enumerate() {
            let pos = row.offset + i;
            let fg = if ch == '.' && self.data[pos] != b'.' {
                Colors::ASCII_CONTROL
            } else {
                Colors::ASCII_NORMAL
            };
            let mut style = Style::default().fg(fg);
            if pos == self.cursor {
                style = style.bg(Colors::CURSOR_MIRROR_BG);
            }
            buf.set_string(ascii_x + i as u16, y, ch.to_string(), style);
        }
    }
}

impl Widget for HexView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 {
            return;
        }

        // ヘッダー行
        let header = format!(
            "{:8}  {:width$}  {}",
            "Offset",
            (0..BYTES_PER_ROW)
                .map(|i| format!("{:02X}", i))
                .collect::<Vec<_>>()
                .join(" "),
            "ASCII",
            width = HEX_GROUP_WIDTH
        );
        buf.set_string(
            area.x,
            area.y,
            &header,
            Style::default()
                .fg(Colors::HEADER)
                .add_modifier(Modifier::BOLD),
        );

        // データ行
        let visible_rows = (area.height as usize).saturating_sub(1);
        for row_idx in 0..visible_rows {
            let start = self.offset + row_idx * BYTES_PER_ROW;
            let Some(row) = codec::row_at(self.data, start) else {
                break;
            };
            self.render_row(&row, area.x, area.y + 1 + row_idx as u16, buf);
        }
    }
}
