//! ターゲット操作のエラー型

use std::io;
use thiserror::Error;

/// ターゲットプロセス操作のエラー
#[derive(Debug, Error)]
pub enum TargetError {
    /// プロセス一覧を取得できなかった
    #[error("Failed to enumerate processes: {source}")]
    Enumeration {
        #[source]
        source: io::Error,
    },

    /// メモリ領域の問い合わせに失敗した
    #[error("Failed to query memory regions of process {pid}: {source}")]
    Query {
        pid: u32,
        #[source]
        source: io::Error,
    },

    /// /proc/pid/maps の行を解釈できなかった
    #[error("Malformed memory mapping of process {pid}: '{line}'")]
    MalformedMapping { pid: u32, line: String },

    /// プロセスが存在しない
    #[error("No such process: {pid}")]
    NoSuchProcess { pid: u32 },

    /// 権限不足
    #[error("Access denied to process {pid} ({operation})")]
    AccessDenied { pid: u32, operation: &'static str },

    /// 必要なアクセス権を持つハンドルがない
    #[error("Not attached to a process with the required access")]
    NotAttached,

    /// 読み取り失敗
    #[error("Failed to read {length} bytes at 0x{address:x}: {source}")]
    ReadFault {
        address: usize,
        length: usize,
        #[source]
        source: io::Error,
    },

    /// 書き込み失敗
    #[error("Failed to write {length} bytes at 0x{address:x}: {source}")]
    WriteFault {
        address: usize,
        length: usize,
        #[source]
        source: io::Error,
    },
}

impl TargetError {
    /// I/Oエラーを開いた操作に応じて分類する
    ///
    /// ENOENT/ESRCH はプロセス消失、EACCES/EPERM は権限不足として扱います。
    pub(crate) fn from_open(pid: u32, operation: &'static str, err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(code) if code == nix::libc::ENOENT || code == nix::libc::ESRCH => {
                TargetError::NoSuchProcess { pid }
            }
            Some(code) if code == nix::libc::EACCES || code == nix::libc::EPERM => {
                TargetError::AccessDenied { pid, operation }
            }
            _ => match err.kind() {
                io::ErrorKind::NotFound => TargetError::NoSuchProcess { pid },
                io::ErrorKind::PermissionDenied => TargetError::AccessDenied { pid, operation },
                _ => TargetError::Query { pid, source: err },
            },
        }
    }

    /// 範囲外などで読み取れない場合のエラーを作る
    pub fn read_fault(address: usize, length: usize, reason: &str) -> Self {
        TargetError::ReadFault {
            address,
            length,
            source: io::Error::new(io::ErrorKind::UnexpectedEof, reason.to_string()),
        }
    }

    /// 読み取り失敗かどうか
    pub fn is_read_fault(&self) -> bool {
        matches!(self, TargetError::ReadFault { .. })
    }
}
