//! スキャンの進捗通知と中断

use sagasu_target::MemoryRegion;
use std::ops::ControlFlow;

/// 領域ごとに呼ばれる進捗フック
///
/// `ControlFlow::Break` を返すとスキャンを打ち切り、それまでの結果を返します。
pub trait ScanProgress {
    /// 領域を読み取る前に呼ばれる
    fn region_started(&mut self, index: usize, region: &MemoryRegion) -> ControlFlow<()>;

    /// 領域の検索が終わった後に呼ばれる
    fn region_finished(&mut self, _index: usize, _region: &MemoryRegion, _matches: usize) {}
}

/// 何もしない進捗フック
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ScanProgress for NoProgress {
    fn region_started(&mut self, _index: usize, _region: &MemoryRegion) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

impl<F> ScanProgress for F
where
    F: FnMut(usize, &MemoryRegion) -> ControlFlow<()>,
{
    fn region_started(&mut self, index: usize, region: &MemoryRegion) -> ControlFlow<()> {
        self(index, region)
    }
}
