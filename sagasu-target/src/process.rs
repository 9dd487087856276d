//! プロセス一覧機能

use crate::{Result, TargetError};
use std::io;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

/// 実行中のプロセス
///
/// 一覧取得時点のスナップショットです。PIDはプロセス終了後に再利用されることがあります。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Process {
    pid: u32,
    name: String,
}

impl Process {
    /// プロセス情報を作成する
    pub fn new(pid: u32, name: impl Into<String>) -> Self {
        Self {
            pid,
            name: name.into(),
        }
    }

    /// プロセスIDを取得する
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// 実行ファイル名を取得する
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// 実行中のプロセスを列挙する
///
/// 呼び出しのたびにシステムから取り直し、結果はキャッシュしません。
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessDirectory;

impl ProcessDirectory {
    pub fn new() -> Self {
        Self
    }

    /// 見えているすべてのプロセスを列挙する（PID順）
    pub fn list_all(&self) -> Result<Vec<Process>> {
        let mut system = System::new();
        system.refresh_processes_specifics(ProcessesToUpdate::All, true, refresh_kind());

        let processes = snapshot(&system);
        if processes.is_empty() {
            return Err(TargetError::Enumeration {
                source: io::Error::new(io::ErrorKind::NotFound, "no process is visible"),
            });
        }

        Ok(processes)
    }

    /// 名前が完全一致するプロセスを列挙する（大文字小文字を区別）
    pub fn list_by_name(&self, name: &str) -> Result<Vec<Process>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|p| p.name == name)
            .collect())
    }

    /// PIDからプロセスを取得する
    pub fn get(&self, pid: u32) -> Result<Process> {
        let target = Pid::from_u32(pid);
        let mut system = System::new();
        system.refresh_processes_specifics(ProcessesToUpdate::Some(&[target]), true, refresh_kind());

        system
            .process(target)
            .filter(|p| p.thread_kind().is_none())
            .map(describe)
            .ok_or(TargetError::NoSuchProcess { pid })
    }
}

/// 名前の解決には実行ファイルのパスだけが必要
fn refresh_kind() -> ProcessRefreshKind {
    ProcessRefreshKind::nothing().with_exe(UpdateKind::OnlyIfNotSet)
}

/// スレッドを除いたプロセスをPID順に並べる
fn snapshot(system: &System) -> Vec<Process> {
    let mut processes: Vec<Process> = system
        .processes()
        .values()
        .filter(|p| p.thread_kind().is_none())
        .map(describe)
        .collect();
    processes.sort_by_key(Process::pid);
    processes
}

/// exe のファイル名を優先し、取れない場合（カーネルスレッドや他ユーザーの
/// プロセス）はカーネルの報告する名前を使う
fn describe(process: &sysinfo::Process) -> Process {
    let name = process
        .exe()
        .and_then(|exe| exe.file_name())
        // 削除済みバイナリには " (deleted)" が付く
        .map(|name| name.to_string_lossy().trim_end_matches(" (deleted)").to_string())
        .unwrap_or_else(|| process.name().to_string_lossy().into_owned());

    Process::new(process.pid().as_u32(), name)
}
