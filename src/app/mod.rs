mod state;

pub use state::App;

use crossterm::event::KeyCode;

/// 入力状態（HEX入力は2桁で1バイト）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputState {
    #[default]
    Normal,
    /// HEX入力の1桁目を入力済み
    HexFirstDigit(u8),
}

/// プレフィックスキー状態（Emacs 2ストローク用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrefixKey {
    #[default]
    None,
    /// C-x を押した状態
    CtrlX,
}

/// ビューアのアクション
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    Save,
    /// HEXペインを `<file>.hex` に書き出す
    ExportHex,
    /// `<file>.hex` を読み込んでバッファを置き換える
    ImportHex,

    // カーソル移動
    CursorUp,
    CursorDown,
    CursorLeft,
    CursorRight,
    CursorHome,
    CursorEnd,
    PageUp,
    PageDown,
    GotoBeginning,
    GotoEnd,

    // 編集（上書きのみ）
    InputHex(char),

    // プレフィックスキー
    EnterCtrlX,
    Cancel,

    None,
}

/// キー修飾子
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyMod {
    pub ctrl: bool,
    pub alt: bool,
}

impl Action {
    /// キーコードからアクションに変換（Emacsキーバインド）
    pub fn from_key(key: KeyCode, mods: KeyMod) -> Self {
        let KeyMod { ctrl, alt } = mods;

        match (key, ctrl, alt) {
            (KeyCode::Char('x'), true, false) => Action::EnterCtrlX,
            (KeyCode::Char('g'), true, false) => Action::Cancel,
            (KeyCode::Esc, _, _) => Action::Cancel,

            // Emacsカーソル移動
            (KeyCode::Char('f'), true, false) => Action::CursorRight,
            (KeyCode::Char('b'), true, false) => Action::CursorLeft,
            (KeyCode::Char('n'), true, false) => Action::CursorDown,
            (KeyCode::Char('p'), true, false) => Action::CursorUp,
            (KeyCode::Char('a'), true, false) => Action::CursorHome,
            (KeyCode::Char('e'), true, false) => Action::CursorEnd,
            (KeyCode::Char('v'), true, false) => Action::PageDown,
            (KeyCode::Char('v'), false, true) => Action::PageUp,
            (KeyCode::Char('<'), false, true) => Action::GotoBeginning,
            (KeyCode::Char('>'), false, true) => Action::GotoEnd,

            (KeyCode::Up, false, false) => Action::CursorUp,
            (KeyCode::Down, false, false) => Action::CursorDown,
            (KeyCode::Left, false, false) => Action::CursorLeft,
            (KeyCode::Right, false, false) => Action::CursorRight,
            (KeyCode::Home, _, _) => Action::CursorHome,
            (KeyCode::End, _, _) => Action::CursorEnd,
            (KeyCode::PageUp, _, _) => Action::PageUp,
            (KeyCode::PageDown, _, _) => Action::PageDown,

            (KeyCode::Char(ch), false, false) if ch.is_ascii_hexdigit() => Action::InputHex(ch),

            _ => Action::None,
        }
    }

    /// C-x の後のキーを処理
    pub fn from_key_after_ctrl_x(key: KeyCode, mods: KeyMod) -> Self {
        match (key, mods.ctrl) {
            // C-x C-c: 終了
            (KeyCode::Char('c'), true) => Action::Quit,
            // C-x C-s: 保存
            (KeyCode::Char('s'), true) => Action::Save,
            // C-x C-w: HEXペイン書き出し
            (KeyCode::Char('w'), true) => Action::ExportHex,
            // C-x i: HEXペイン読み込み
            (KeyCode::Char('i'), false) => Action::ImportHex,
            _ => Action::Cancel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTRL: KeyMod = KeyMod { ctrl: true, alt: false };
    const ALT: KeyMod = KeyMod { ctrl: false, alt: true };
    const NONE: KeyMod = KeyMod { ctrl: false, alt: false };

    #[test]
    fn emacs_bindings() {
        assert_eq!(Action::from_key(KeyCode::Char('f'), CTRL), Action::CursorRight);
        assert_eq!(Action::from_key(KeyCode::Char('v'), ALT), Action::PageUp);
        assert_eq!(Action::from_key(KeyCode::Char('x'), CTRL), Action::EnterCtrlX);
        assert_eq!(
            Action::from_key_after_ctrl_x(KeyCode::Char('s'), CTRL),
            Action::Save
        );
        assert_eq!(
            Action::from_key_after_ctrl_x(KeyCode::Char('w'), CTRL),
            Action::ExportHex
        );
        assert_eq!(
            Action::from_key_after_ctrl_x(KeyCode::Char('i'), NONE),
            Action::ImportHex
        );
        assert_eq!(
            Action::from_key_after_ctrl_x(KeyCode::Char('k'), NONE),
            Action::Cancel
        );
    }

    #[test]
    fn only_hex_digits_are_input() {
        assert_eq!(Action::from_key(KeyCode::Char('a'), NONE), Action::InputHex('a'));
        assert_eq!(Action::from_key(KeyCode::Char('7'), NONE), Action::InputHex('7'));
        assert_eq!(Action::from_key(KeyCode::Char('z'), NONE), Action::None);
    }
}
