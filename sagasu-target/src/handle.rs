//! プロセスハンドル（アタッチ／デタッチ）

use crate::process::Process;
use crate::regions::RegionWalker;
use crate::{Result, TargetError};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use tracing::{debug, info};

/// アタッチ時に要求するアクセス権
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    /// メモリ読み取り
    pub read: bool,
    /// メモリ書き込み
    pub write: bool,
    /// メモリ領域の問い合わせ
    pub query: bool,
    /// プロセスの強制終了
    pub terminate: bool,
}

impl Access {
    pub const ALL: Access = Access {
        read: true,
        write: true,
        query: true,
        terminate: true,
    };

    pub const READ_ONLY: Access = Access {
        read: true,
        write: false,
        query: true,
        terminate: false,
    };
}

impl Default for Access {
    fn default() -> Self {
        Access::ALL
    }
}

/// アタッチ中のプロセスへのハンドル
///
/// /proc/pid/mem のファイルディスクリプタを保持します。ドロップすると解放されます。
pub struct ProcessHandle {
    process: Process,
    access: Access,
    mem: Option<File>,
}

impl ProcessHandle {
    /// プロセスにアタッチする
    ///
    /// 要求されたアクセス権で /proc/pid/mem を開き、問い合わせ権限があれば
    /// /proc/pid/maps が読めることも確認します。ptraceは使わないため、
    /// ターゲットは停止しません。
    pub fn open(process: Process, access: Access) -> Result<Self> {
        let pid = process.pid();
        let proc_dir = PathBuf::from(format!("/proc/{}", pid));
        if !proc_dir.exists() {
            return Err(TargetError::NoSuchProcess { pid });
        }

        let mem = if access.read || access.write {
            let file = OpenOptions::new()
                .read(access.read)
                .write(access.write)
                .open(proc_dir.join("mem"))
                .map_err(|e| TargetError::from_open(pid, "open memory", e))?;
            Some(file)
        } else {
            None
        };

        if access.query {
            File::open(proc_dir.join("maps")).map_err(|e| TargetError::from_open(pid, "query", e))?;
        }

        info!(pid, name = process.name(), ?access, "attached");

        Ok(Self {
            process,
            access,
            mem,
        })
    }

    /// アタッチ先のプロセス
    pub fn process(&self) -> &Process {
        &self.process
    }

    /// プロセスIDを取得する
    pub fn pid(&self) -> u32 {
        self.process.pid()
    }

    /// 保持しているアクセス権
    pub fn access(&self) -> Access {
        self.access
    }

    /// スキャン対象の領域を列挙する
    pub fn regions(&self) -> Result<RegionWalker> {
        self.require_query()?;
        RegionWalker::eligible(self.pid())
    }

    /// すべての領域を列挙する
    pub fn all_regions(&self) -> Result<RegionWalker> {
        self.require_query()?;
        RegionWalker::all(self.pid())
    }

    /// プロセスを強制終了してハンドルを解放する
    ///
    /// SIGKILLを送るだけなので、戻った時点でプロセスが消えているとは限りません。
    pub fn terminate(self) -> Result<Process> {
        let pid = self.pid();
        if !self.access.terminate {
            return Err(TargetError::AccessDenied {
                pid,
                operation: "terminate",
            });
        }

        let raw = i32::try_from(pid).map_err(|_| TargetError::NoSuchProcess { pid })?;
        kill(Pid::from_raw(raw), Signal::SIGKILL).map_err(|errno| match errno {
            Errno::ESRCH => TargetError::NoSuchProcess { pid },
            _ => TargetError::AccessDenied {
                pid,
                operation: "terminate",
            },
        })?;

        info!(pid, "sent SIGKILL");
        Ok(self.process.clone())
    }

    /// 読み取り／書き込み用のファイルを取得する
    pub(crate) fn mem_file(&self, write: bool) -> Result<&File> {
        let permitted = if write { self.access.write } else { self.access.read };
        match &self.mem {
            Some(file) if permitted => Ok(file),
            _ => Err(TargetError::NotAttached),
        }
    }

    fn require_query(&self) -> Result<()> {
        if self.access.query {
            Ok(())
        } else {
            Err(TargetError::NotAttached)
        }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        debug!(pid = self.pid(), "released process handle");
    }
}
