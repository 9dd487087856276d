//! sagasu のスキャンエンジン
//!
//! このクレートは、ターゲットプロセスのメモリに対するパターン検索と
//! 型付きの読み書き、アタッチ状態の管理、シェルコマンドの解釈を提供します。

pub mod command;
pub mod error;
pub mod parse;
pub mod progress;
pub mod scanner;
pub mod search;
pub mod session;
pub mod string;
pub mod value;

#[cfg(test)]
mod mock;

pub use command::{AttachTarget, Command};
pub use error::ScanError;
pub use progress::{NoProgress, ScanProgress};
pub use scanner::{MemoryDump, ScanOptions, Scanner};
pub use session::Session;
pub use string::CharWidth;
pub use value::{TypedValue, ValueType};

// 他のクレートから使用するために再エクスポート
pub use sagasu_target::{
    Access, MemoryRegion, Process, ProcessDirectory, ProcessHandle, TargetError, TargetMemory,
};

/// スキャンエンジンの結果型
pub type Result<T> = std::result::Result<T, ScanError>;
