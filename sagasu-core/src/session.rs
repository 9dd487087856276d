//! アタッチ状態の管理

use crate::scanner::{ScanOptions, Scanner};
use crate::{Result, ScanError};
use sagasu_target::{Access, Process, ProcessDirectory, ProcessHandle};
use tracing::{info, warn};

/// 1つのターゲットプロセスへのアタッチを保持するセッション
///
/// 同時にアタッチできるのは1プロセスだけです。
pub struct Session {
    /// アタッチ中のハンドル
    handle: Option<ProcessHandle>,
    /// アタッチ時に要求するアクセス権
    access: Access,
    /// スキャン設定
    options: ScanOptions,
    /// プロセス一覧
    directory: ProcessDirectory,
}

impl Session {
    /// 新しいセッションを作成する
    pub fn new() -> Self {
        Self::with_options(ScanOptions::default())
    }

    pub fn with_options(options: ScanOptions) -> Self {
        Self {
            handle: None,
            access: Access::ALL,
            options,
            directory: ProcessDirectory::new(),
        }
    }

    /// アタッチ時に要求するアクセス権を変更する
    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut ScanOptions {
        &mut self.options
    }

    pub fn directory(&self) -> &ProcessDirectory {
        &self.directory
    }

    /// PIDを指定してアタッチする
    pub fn attach(&mut self, pid: u32) -> Result<&Process> {
        let process = self.directory.get(pid)?;
        self.attach_process(process, self.access)
    }

    /// プロセスにアタッチする
    ///
    /// 既にアタッチしている場合、古いハンドルは解放されて置き換わります。
    /// 失敗した場合は元のアタッチがそのまま残ります。
    pub fn attach_process(&mut self, process: Process, access: Access) -> Result<&Process> {
        let handle = ProcessHandle::open(process, access)?;

        if let Some(old) = self.handle.replace(handle) {
            warn!(
                old_pid = old.pid(),
                old_name = old.process().name(),
                "replaced existing attachment"
            );
        }

        self.attached_process().ok_or(ScanError::NotAttached)
    }

    /// デタッチする
    ///
    /// アタッチしていなければ何もしません。
    pub fn detach(&mut self) -> Option<Process> {
        let handle = self.handle.take()?;
        let process = handle.process().clone();
        info!(pid = process.pid(), name = process.name(), "detached");
        Some(process)
    }

    pub fn is_attached(&self) -> bool {
        self.handle.is_some()
    }

    /// アタッチ中のプロセス
    pub fn attached_process(&self) -> Option<&Process> {
        self.handle.as_ref().map(ProcessHandle::process)
    }

    /// アタッチ中のプロセスを強制終了してデタッチする
    ///
    /// 終了に失敗した場合もハンドルは解放されます。
    pub fn terminate(&mut self) -> Result<Process> {
        let handle = self.handle.take().ok_or(ScanError::NotAttached)?;
        Ok(handle.terminate()?)
    }

    /// アタッチ中のハンドル
    pub fn handle(&self) -> Result<&ProcessHandle> {
        self.handle.as_ref().ok_or(ScanError::NotAttached)
    }

    /// アタッチ中のプロセスに対するスキャナを作成する
    pub fn scanner(&self) -> Result<Scanner<'_, ProcessHandle>> {
        Ok(Scanner::with_options(self.handle()?, self.options.clone()))
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_session() {
        let mut session = Session::new();

        assert!(!session.is_attached());
        assert!(session.attached_process().is_none());
        assert!(session.detach().is_none());
        assert!(matches!(session.handle(), Err(ScanError::NotAttached)));
        assert!(matches!(session.scanner(), Err(ScanError::NotAttached)));
        assert!(matches!(session.terminate(), Err(ScanError::NotAttached)));
    }

    #[test]
    fn test_options_are_kept() {
        let options = ScanOptions {
            span_adjacent_regions: true,
            max_region_size: Some(4096),
        };
        let mut session = Session::with_options(options);
        assert!(session.options().span_adjacent_regions);

        session.options_mut().max_region_size = None;
        assert_eq!(session.options().max_region_size, None);
    }
}
