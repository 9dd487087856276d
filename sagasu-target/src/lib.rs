//! sagasu ターゲットプロセス制御
//!
//! このクレートは、別プロセスのメモリへアクセスするための低レベル機能を提供します。
//! プロセスの列挙、アタッチ、メモリ領域の列挙、/proc/pid/mem 経由の読み書きを行います。

pub mod error;
pub mod process;
pub mod handle;
pub mod regions;
pub mod memory;

pub use error::TargetError;
pub use process::{Process, ProcessDirectory};
pub use handle::{Access, ProcessHandle};
pub use regions::{MemoryRegion, Protection, RegionWalker};
pub use memory::{Regions, Scalar, TargetMemory};

/// ターゲット制御の結果型
pub type Result<T> = std::result::Result<T, TargetError>;
