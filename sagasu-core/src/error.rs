//! スキャンエンジンのエラー型

use sagasu_target::TargetError;
use thiserror::Error;

/// スキャン・セッション操作のエラー
#[derive(Debug, Error)]
pub enum ScanError {
    /// ターゲット操作のエラー
    #[error(transparent)]
    Target(#[from] TargetError),

    /// プロセスにアタッチしていない
    #[error("Not attached to a process")]
    NotAttached,

    /// 空のパターンは検索できない
    #[error("Search pattern is empty")]
    EmptyPattern,

    /// 1文字あたりのバイト数が不正
    #[error("Invalid character width {0} (expected 1 to 4 bytes)")]
    InvalidCharWidth(usize),

    /// 指定幅のコードユニットに収まらない文字
    #[error("Character {ch:?} does not fit in {width} byte(s) per character")]
    Unencodable { ch: char, width: usize },

    /// 終端と区別できないNUL文字
    #[error("String contains a NUL character")]
    InteriorNul,

    /// 不正な引数
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// 値を型として解釈できない
    #[error("Invalid {ty} value '{value}'")]
    InvalidValue { ty: &'static str, value: String },
}

impl ScanError {
    /// 読み取り失敗かどうか
    pub fn is_read_fault(&self) -> bool {
        matches!(self, ScanError::Target(e) if e.is_read_fault())
    }
}
