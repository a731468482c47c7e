use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
    style::Style,
    widgets::Paragraph,
};
use unicode_width::UnicodeWidthChar;

use super::{Action, InputState, KeyMod, PrefixKey};
use crate::buffer::Document;
use crate::codec::{self, BYTES_PER_ROW};
use crate::ui::{Colors, HexView};

/// ビューアの状態
pub struct App {
    /// 表示中のドキュメント
    document: Document,
    /// カーソル位置
    cursor: usize,
    /// 表示オフセット（行頭）
    offset: usize,
    /// 表示可能な行数
    visible_rows: usize,
    /// 入力状態
    input_state: InputState,
    /// プレフィックスキー状態（C-x等）
    prefix_key: PrefixKey,
    /// 未保存で終了しようとしている
    confirm_quit: bool,
    /// 終了フラグ
    should_quit: bool,
    /// ステータスメッセージ
    status_message: Option<String>,
}

impl App {
    pub fn new() -> Self {
        Self::with_document(Document::new())
    }

    pub fn with_document(document: Document) -> Self {
        Self {
            document,
            cursor: 0,
            offset: 0,
            visible_rows: 24,
            input_state: InputState::Normal,
            prefix_key: PrefixKey::None,
            confirm_quit: false,
            should_quit: false,
            status_message: None,
        }
    }

    /// ファイルを開く
    pub fn open(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        self.document = Document::open(path)?;
        self.cursor = 0;
        self.offset = 0;
        self.input_state = InputState::Normal;
        Ok(())
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn filename(&self) -> Option<&str> {
        self.document.filename()
    }

    pub fn is_modified(&self) -> bool {
        self.document.is_modified()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// 表示可能行数を設定（ヘッダーとステータスバーを除く）
    pub fn set_visible_rows(&mut self, rows: usize) {
        self.visible_rows = rows.saturating_sub(2).max(1);
    }

    /// カーソルが移動できる最後の位置
    fn last_pos(&self) -> usize {
        self.document.len().saturating_sub(1)
    }

    fn move_cursor(&mut self, pos: usize) {
        self.cursor = pos.min(self.last_pos());
        self.input_state = InputState::Normal;
        self.ensure_cursor_visible();
    }

    /// カーソル位置が表示範囲内になるようにスクロール
    fn ensure_cursor_visible(&mut self) {
        let cursor_row = self.cursor / BYTES_PER_ROW;
        let offset_row = self.offset / BYTES_PER_ROW;

        if cursor_row < offset_row {
            self.offset = cursor_row * BYTES_PER_ROW;
        } else if cursor_row >= offset_row + self.visible_rows {
            self.offset = (cursor_row + 1 - self.visible_rows) * BYTES_PER_ROW;
        }
    }

    fn cursor_up(&mut self) {
        if self.cursor >= BYTES_PER_ROW {
            self.move_cursor(self.cursor - BYTES_PER_ROW);
        }
    }

    fn cursor_down(&mut self) {
        let new_pos = self.cursor + BYTES_PER_ROW;
        if new_pos < self.document.len() {
            self.move_cursor(new_pos);
        }
    }

    fn page_up(&mut self) {
        let page_size = self.visible_rows * BYTES_PER_ROW;
        self.offset = self.offset.saturating_sub(page_size);
        self.move_cursor(self.cursor.saturating_sub(page_size));
    }

    fn page_down(&mut self) {
        let page_size = self.visible_rows * BYTES_PER_ROW;
        self.move_cursor(self.cursor + page_size);
    }

    fn cursor_home(&mut self) {
        self.move_cursor(self.cursor / BYTES_PER_ROW * BYTES_PER_ROW);
    }

    fn cursor_end(&mut self) {
        self.move_cursor(self.cursor / BYTES_PER_ROW * BYTES_PER_ROW + BYTES_PER_ROW - 1);
    }

    /// HEX入力（上書き）。1桁目で上位ニブル、2桁目で下位ニブルを書き換える
    fn input_hex(&mut self, ch: char) {
        let Some(digit) = ch.to_digit(16).map(|d| d as u8) else {
            return;
        };
        let Some(current) = self.document.get(self.cursor) else {
            self.status_message = Some("Buffer is empty".to_string());
            return;
        };

        let result = match self.input_state {
            InputState::Normal => {
                self.input_state = InputState::HexFirstDigit(digit);
                self.document.set(self.cursor, (digit << 4) | (current & 0x0F))
            }
            InputState::HexFirstDigit(first) => {
                self.input_state = InputState::Normal;
                let result = self.document.set(self.cursor, (first << 4) | digit);
                if self.cursor < self.last_pos() {
                    self.move_cursor(self.cursor + 1);
                }
                result
            }
        };
        if let Err(e) = result {
            self.status_message = Some(format!("Edit failed: {}", e));
        }
    }

    fn save(&mut self) -> bool {
        match self.document.save() {
            Ok(()) => {
                self.status_message = Some("Saved".to_string());
                true
            }
            Err(e) => {
                self.status_message = Some(format!("Save failed: {}", e));
                false
            }
        }
    }

    /// HEXペインの書き出し先（`fw.bin` なら `fw.bin.hex`）
    fn pane_path(&self) -> Option<PathBuf> {
        let path = self.document.path()?;
        let mut name = path.as_os_str().to_owned();
        name.push(".hex");
        Some(PathBuf::from(name))
    }

    fn export_hex(&mut self) {
        let Some(pane) = self.pane_path() else {
            self.status_message = Some("No file path".to_string());
            return;
        };
        self.status_message = Some(match self.document.export_hex(&pane) {
            Ok(()) => format!("Wrote {}", pane.display()),
            Err(e) => format!("Export failed: {}", e),
        });
    }

    /// 外部で編集したHEXペインを取り込む（保存はC-x C-sで行う）
    fn import_hex(&mut self) {
        let Some(pane) = self.pane_path() else {
            self.status_message = Some("No file path".to_string());
            return;
        };
        match self.document.import_hex(&pane) {
            Ok(()) => {
                self.input_state = InputState::Normal;
                self.move_cursor(self.cursor);
                self.status_message = Some(format!(
                    "Loaded {} ({} bytes)",
                    pane.display(),
                    self.document.len()
                ));
            }
            Err(e) => self.status_message = Some(format!("Import failed: {}", e)),
        }
    }

    /// アクションを実行
    pub fn execute(&mut self, action: Action) {
        if !matches!(action, Action::EnterCtrlX) {
            self.status_message = None;
        }

        match action {
            Action::Quit => {
                if self.document.is_modified() {
                    self.confirm_quit = true;
                } else {
                    self.should_quit = true;
                }
            }
            Action::Save => {
                self.save();
            }
            Action::ExportHex => self.export_hex(),
            Action::ImportHex => self.import_hex(),
            Action::CursorUp => self.cursor_up(),
            Action::CursorDown => self.cursor_down(),
            Action::CursorLeft => self.move_cursor(self.cursor.saturating_sub(1)),
            Action::CursorRight => self.move_cursor(self.cursor + 1),
            Action::CursorHome => self.cursor_home(),
            Action::CursorEnd => self.cursor_end(),
            Action::PageUp => self.page_up(),
            Action::PageDown => self.page_down(),
            Action::GotoBeginning => {
                self.offset = 0;
                self.move_cursor(0);
            }
            Action::GotoEnd => self.move_cursor(self.last_pos()),
            Action::InputHex(ch) => self.input_hex(ch),
            Action::EnterCtrlX => {
                self.prefix_key = PrefixKey::CtrlX;
                self.status_message = Some("C-x-".to_string());
            }
            Action::Cancel => {
                self.prefix_key = PrefixKey::None;
                self.input_state = InputState::Normal;
                self.status_message = Some("Quit".to_string());
            }
            Action::None => {}
        }
    }

    /// イベントを1つ処理（100msでタイムアウト）
    pub fn handle_event(&mut self) -> Result<()> {
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    self.handle_key(key);
                }
            }
        }
        Ok(())
    }

    /// キー入力を処理
    pub fn handle_key(&mut self, key: KeyEvent) {
        if self.confirm_quit {
            self.handle_confirm_key(key);
            return;
        }

        let mods = KeyMod {
            ctrl: key.modifiers.contains(KeyModifiers::CONTROL),
            alt: key.modifiers.contains(KeyModifiers::ALT),
        };

        let action = match self.prefix_key {
            PrefixKey::None => Action::from_key(key.code, mods),
            PrefixKey::CtrlX => {
                self.prefix_key = PrefixKey::None;
                Action::from_key_after_ctrl_x(key.code, mods)
            }
        };
        self.execute(action);
    }

    /// 未保存終了の確認（y: 保存して終了, n: 破棄して終了, c: キャンセル）
    fn handle_confirm_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                self.confirm_quit = false;
                if self.save() {
                    self.should_quit = true;
                }
            }
            KeyCode::Char('n') | KeyCode::Char('N') => {
                self.confirm_quit = false;
                self.should_quit = true;
            }
            KeyCode::Char('c') | KeyCode::Char('C') | KeyCode::Esc => {
                self.confirm_quit = false;
                self.status_message = Some("Cancelled".to_string());
            }
            KeyCode::Char('g') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.confirm_quit = false;
                self.status_message = Some("Cancelled".to_string());
            }
            _ => {}
        }
    }

    /// ステータスバーの文字列
    fn status_line(&self) -> String {
        if self.confirm_quit {
            return "Save changes? (y)es (n)o (c)ancel".to_string();
        }

        let filename = self.document.filename().unwrap_or("[No file]");
        let modified = if self.document.is_modified() { "[+]" } else { "" };
        if let Some(ref msg) = self.status_message {
            return format!(" {}{} | {}", filename, modified, msg);
        }

        let byte = match self.document.get(self.cursor) {
            Some(b) => format!("{:02X} '{}'", b, codec::printable(b)),
            None => "--".to_string(),
        };
        format!(
            " {}{} | {:08X}/{:08X} | {}",
            filename,
            modified,
            self.cursor,
            self.document.len(),
            byte
        )
    }

    /// UIを描画
    pub fn draw(&mut self, frame: &mut Frame) {
        let size = frame.area();
        self.set_visible_rows(size.height as usize);
        self.ensure_cursor_visible();

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),    // メイン
                Constraint::Length(1), // ステータス
            ])
            .split(size);

        let hex_view = HexView::new(self.document.data())
            .offset(self.offset)
            .cursor(self.cursor);
        frame.render_widget(hex_view, layout[0]);

        let status = fit_width(&self.status_line(), size.width as usize);
        let status_widget =
            Paragraph::new(status).style(Style::default().bg(Colors::STATUS_BG).fg(Colors::STATUS_FG));
        frame.render_widget(status_widget, layout[1]);
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

/// 表示幅に収まるように末尾を切り詰める（全角文字は2桁として数える）
fn fit_width(s: &str, width: usize) -> String {
    let mut used = 0;
    let mut out = String::new();
    for ch in s.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    fn app_with(data: &[u8]) -> (TempDir, App) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fw.bin");
        fs::write(&path, data).unwrap();
        let mut app = App::new();
        app.open(&path).unwrap();
        (dir, app)
    }

    #[test]
    fn two_digits_overwrite_one_byte() {
        let (_dir, mut app) = app_with(&[0x00, 0x11]);
        app.handle_key(key(KeyCode::Char('a')));
        assert_eq!(app.document().data(), &[0xA0, 0x11]);
        assert_eq!(app.cursor(), 0);
        app.handle_key(key(KeyCode::Char('B')));
        assert_eq!(app.document().data(), &[0xAB, 0x11]);
        assert_eq!(app.cursor(), 1);
        assert!(app.is_modified());
    }

    #[test]
    fn cursor_stays_inside_buffer() {
        let (_dir, mut app) = app_with(&[0u8; 20]);
        app.handle_key(key(KeyCode::Down));
        assert_eq!(app.cursor(), 16);
        app.handle_key(key(KeyCode::Down));
        assert_eq!(app.cursor(), 16);
        app.handle_key(ctrl('e'));
        assert_eq!(app.cursor(), 19);
        app.handle_key(ctrl('a'));
        assert_eq!(app.cursor(), 16);
        app.handle_key(KeyEvent::new(KeyCode::Char('<'), KeyModifiers::ALT));
        assert_eq!(app.cursor(), 0);
        app.handle_key(key(KeyCode::Left));
        assert_eq!(app.cursor(), 0);
    }

    #[test]
    fn ctrl_x_ctrl_s_saves() {
        let (dir, mut app) = app_with(&[0x00]);
        app.handle_key(key(KeyCode::Char('f')));
        app.handle_key(key(KeyCode::Char('f')));
        app.handle_key(ctrl('x'));
        app.handle_key(ctrl('s'));
        assert!(!app.is_modified());
        assert_eq!(fs::read(dir.path().join("fw.bin")).unwrap(), [0xFF]);
    }

    #[test]
    fn quitting_with_changes_asks_first() {
        let (dir, mut app) = app_with(&[0x00]);
        app.handle_key(key(KeyCode::Char('1')));
        app.handle_key(ctrl('x'));
        app.handle_key(ctrl('c'));
        assert!(!app.should_quit());
        assert_eq!(app.status_line(), "Save changes? (y)es (n)o (c)ancel");

        app.handle_key(key(KeyCode::Char('c')));
        assert!(!app.should_quit());

        app.handle_key(ctrl('x'));
        app.handle_key(ctrl('c'));
        app.handle_key(key(KeyCode::Char('n')));
        assert!(app.should_quit());
        assert_eq!(fs::read(dir.path().join("fw.bin")).unwrap(), [0x00]);
    }

    #[test]
    fn hex_pane_round_trip_through_file() {
        let (dir, mut app) = app_with(&[0x00; 20]);
        app.handle_key(ctrl('x'));
        app.handle_key(ctrl('w'));
        let pane = dir.path().join("fw.bin.hex");
        assert!(pane.exists());

        fs::write(&pane, "00000000  DE AD\n").unwrap();
        app.handle_key(KeyEvent::new(KeyCode::Char('>'), KeyModifiers::ALT));
        app.handle_key(ctrl('x'));
        app.handle_key(key(KeyCode::Char('i')));
        assert_eq!(app.document().data(), &[0xDE, 0xAD]);
        assert_eq!(app.cursor(), 1);

        app.handle_key(ctrl('x'));
        app.handle_key(ctrl('s'));
        assert_eq!(fs::read(dir.path().join("fw.bin")).unwrap(), [0xDE, 0xAD]);
    }

    #[test]
    fn bad_hex_pane_is_rejected() {
        let (dir, mut app) = app_with(&[0x01, 0x02]);
        fs::write(dir.path().join("fw.bin.hex"), "01 0G\n").unwrap();
        app.handle_key(ctrl('x'));
        app.handle_key(key(KeyCode::Char('i')));
        assert_eq!(app.document().data(), &[0x01, 0x02]);
        assert!(!app.is_modified());
        assert!(app.status_line().contains("invalid-hex-character"));
    }

    #[test]
    fn status_line_shows_cursor_byte() {
        let (_dir, app) = app_with(b"A");
        assert_eq!(app.status_line(), " fw.bin | 00000000/00000001 | 41 'A'");
    }

    #[test]
    fn fit_width_counts_wide_chars() {
        assert_eq!(fit_width("abcdef", 4), "abcd");
        assert_eq!(fit_width("日本語", 5), "日本");
    }
}
