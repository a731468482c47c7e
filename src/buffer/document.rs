use std::fs;
use std::path::{Path, PathBuf};

use super::BufferError;
use crate::codec::{self, HexDump};

/// ビューアで開いているファイル
pub struct Document {
    /// ファイルパス
    path: Option<PathBuf>,
    /// ファイル内容
    data: Vec<u8>,
    /// 変更フラグ
    modified: bool,
}

impl Document {
    /// 空のドキュメント
    pub fn new() -> Self {
        Self::from_bytes(Vec::new())
    }

    /// バイト列から作成（パスなし）
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            path: None,
            data,
            modified: false,
        }
    }

    /// ファイルを丸ごと読み込む
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, BufferError> {
        let path = path.into();
        let data = fs::read(&path)?;
        tracing::debug!(path = %path.display(), len = data.len(), "opened document");
        Ok(Self {
            path: Some(path),
            data,
            modified: false,
        })
    }

    /// 元のファイルに保存
    pub fn save(&mut self) -> Result<(), BufferError> {
        let path = self.path.as_ref().ok_or(BufferError::NoPath)?;
        fs::write(path, &self.data)?;
        tracing::info!(path = %path.display(), len = self.data.len(), "saved document");
        self.modified = false;
        Ok(())
    }

    /// 別名で保存（書き込みに成功した場合のみパスを切り替える）
    pub fn save_as(&mut self, path: impl Into<PathBuf>) -> Result<(), BufferError> {
        let path = path.into();
        fs::write(&path, &self.data)?;
        tracing::info!(path = %path.display(), len = self.data.len(), "saved document");
        self.path = Some(path);
        self.modified = false;
        Ok(())
    }

    /// HEXペイン（オフセット付き）をテキストファイルに書き出す
    pub fn export_hex(&self, path: &Path) -> Result<(), BufferError> {
        let mut text = self.hex_dump().hex;
        if !text.is_empty() {
            text.push('\n');
        }
        fs::write(path, text)?;
        tracing::debug!(path = %path.display(), "exported hex pane");
        Ok(())
    }

    /// 外部で編集したHEXペインを読み込み、バッファ全体を置き換える
    pub fn import_hex(&mut self, path: &Path) -> Result<(), BufferError> {
        let text = fs::read_to_string(path)?;
        self.apply_hex_text(&codec::strip_offsets(&text))?;
        tracing::debug!(path = %path.display(), len = self.data.len(), "imported hex pane");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, pos: usize) -> Option<u8> {
        self.data.get(pos).copied()
    }

    /// 1バイト上書き
    pub fn set(&mut self, pos: usize, value: u8) -> Result<(), BufferError> {
        let slot = self.data.get_mut(pos).ok_or(BufferError::OutOfBounds(pos))?;
        if *slot != value {
            *slot = value;
            self.modified = true;
        }
        Ok(())
    }

    /// HEX/ASCIIの2ペイン表示
    pub fn hex_dump(&self) -> HexDump {
        codec::encode(&self.data)
    }

    /// 編集済みのHEXテキスト（オフセット列を除く）でバッファ全体を置き換える
    ///
    /// デコードに失敗した場合、バッファは変更されない。
    pub fn apply_hex_text(&mut self, text: &str) -> Result<(), BufferError> {
        let data = codec::decode(text)?;
        if data != self.data {
            self.data = data;
            self.modified = true;
        }
        Ok(())
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// ファイル名部分
    pub fn filename(&self) -> Option<&str> {
        self.path
            .as_ref()
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
