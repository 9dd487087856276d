//! メモリ領域の列挙
//!
//! /proc/pid/maps を1行ずつ読み、ターゲットの仮想メモリ領域を低いアドレスから順に返します。
//! 走査のたびにファイルを開き直すため、前回の結果は保持しません。

use crate::{Result, TargetError};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::PathBuf;

/// ページ保護属性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Protection {
    pub read: bool,
    pub write: bool,
    pub execute: bool,
    pub shared: bool,
}

impl Protection {
    /// "rw-p" 形式のパーミッション文字列を解釈する
    pub fn parse(perms: &str) -> Option<Self> {
        let bytes = perms.as_bytes();
        if bytes.len() != 4 {
            return None;
        }

        Some(Self {
            read: bytes[0] == b'r',
            write: bytes[1] == b'w',
            execute: bytes[2] == b'x',
            shared: bytes[3] == b's',
        })
    }
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}",
            if self.read { 'r' } else { '-' },
            if self.write { 'w' } else { '-' },
            if self.execute { 'x' } else { '-' },
            if self.shared { 's' } else { 'p' },
        )
    }
}

/// ターゲットの仮想メモリ領域 `[start, end)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    pub start: usize,
    pub end: usize,
    pub protection: Protection,
    pub offset: usize,
    pub path: Option<String>,
}

impl MemoryRegion {
    pub fn size(&self) -> usize {
        self.end - self.start
    }

    pub fn contains(&self, address: usize) -> bool {
        address >= self.start && address < self.end
    }

    /// スキャン対象かどうか（読み書き可能で実行不可）
    ///
    /// コード領域、定数、ガードページ（---p）はここで除外されます。
    pub fn is_eligible(&self) -> bool {
        self.protection.read && self.protection.write && !self.protection.execute
    }

    /// maps の1行を解釈する
    ///
    /// フォーマット: "address perms offset dev inode pathname"
    /// 例: "7f1234567000-7f1234568000 rw-p 00000000 00:00 0 [heap]"
    pub fn parse_maps_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let range = parts.next()?;
        let perms = parts.next()?;
        let offset = parts.next()?;
        let _dev = parts.next()?;
        let _inode = parts.next()?;

        let (start, end) = range.split_once('-')?;
        let start = usize::from_str_radix(start, 16).ok()?;
        let end = usize::from_str_radix(end, 16).ok()?;
        if end < start {
            return None;
        }

        let path = parts.collect::<Vec<_>>().join(" ");

        Some(Self {
            start,
            end,
            protection: Protection::parse(perms)?,
            offset: usize::from_str_radix(offset, 16).ok()?,
            path: if path.is_empty() { None } else { Some(path) },
        })
    }
}

impl fmt::Display for MemoryRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:x}-0x{:x} {} {:>10}",
            self.start,
            self.end,
            self.protection,
            self.size()
        )?;
        if let Some(path) = &self.path {
            write!(f, " {}", path)?;
        }
        Ok(())
    }
}

/// メモリ領域を遅延列挙するイテレータ
pub struct RegionWalker {
    pid: u32,
    lines: Lines<BufReader<File>>,
    eligible_only: bool,
}

impl RegionWalker {
    /// スキャン対象の領域だけを列挙する
    pub fn eligible(pid: u32) -> Result<Self> {
        Self::open(pid, true)
    }

    /// すべての領域を列挙する
    pub fn all(pid: u32) -> Result<Self> {
        Self::open(pid, false)
    }

    fn open(pid: u32, eligible_only: bool) -> Result<Self> {
        let maps_path = PathBuf::from(format!("/proc/{}/maps", pid));
        let file = File::open(&maps_path).map_err(|e| TargetError::from_open(pid, "query", e))?;

        Ok(Self {
            pid,
            lines: BufReader::new(file).lines(),
            eligible_only,
        })
    }
}

impl Iterator for RegionWalker {
    type Item = Result<MemoryRegion>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(source) => return Some(Err(TargetError::Query { pid: self.pid, source })),
            };

            if line.trim().is_empty() {
                continue;
            }

            let Some(region) = MemoryRegion::parse_maps_line(&line) else {
                return Some(Err(TargetError::MalformedMapping { pid: self.pid, line }));
            };

            if !self.eligible_only || region.is_eligible() {
                return Some(Ok(region));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_maps_line_with_path() {
        let region = MemoryRegion::parse_maps_line(
            "7f1234567000-7f1234569000 rw-p 00001000 08:01 123456   /usr/lib/libc.so.6",
        )
        .unwrap();

        assert_eq!(region.start, 0x7f1234567000);
        assert_eq!(region.end, 0x7f1234569000);
        assert_eq!(region.size(), 0x2000);
        assert_eq!(region.offset, 0x1000);
        assert_eq!(region.path.as_deref(), Some("/usr/lib/libc.so.6"));
        assert!(region.is_eligible());
    }

    #[test]
    fn test_parse_maps_line_anonymous() {
        let region = MemoryRegion::parse_maps_line("55d0c0a00000-55d0c0a21000 rw-p 00000000 00:00 0").unwrap();
        assert_eq!(region.path, None);
        assert!(!region.protection.shared);
    }

    #[test]
    fn test_path_with_spaces() {
        let region = MemoryRegion::parse_maps_line(
            "1000-2000 rw-s 00000000 00:05 77 /dev/shm/my file (deleted)",
        )
        .unwrap();
        assert_eq!(region.path.as_deref(), Some("/dev/shm/my file (deleted)"));
        assert!(region.protection.shared);
    }

    #[test]
    fn test_eligibility() {
        let parse = |perms: &str| {
            MemoryRegion::parse_maps_line(&format!("1000-2000 {} 00000000 00:00 0", perms)).unwrap()
        };

        assert!(parse("rw-p").is_eligible());
        assert!(parse("rw-s").is_eligible());
        assert!(!parse("r--p").is_eligible());
        assert!(!parse("r-xp").is_eligible());
        assert!(!parse("rwxp").is_eligible());
        assert!(!parse("---p").is_eligible());
    }

    #[test]
    fn test_parse_invalid_lines() {
        assert!(MemoryRegion::parse_maps_line("").is_none());
        assert!(MemoryRegion::parse_maps_line("xyz rw-p 0 00:00 0").is_none());
        assert!(MemoryRegion::parse_maps_line("2000-1000 rw-p 0 00:00 0").is_none());
        assert!(MemoryRegion::parse_maps_line("1000-2000 rw 0 00:00 0").is_none());
    }

    #[test]
    fn test_protection_display() {
        assert_eq!(Protection::parse("r-xs").unwrap().to_string(), "r-xs");
        assert_eq!(Protection::parse("rw-p").unwrap().to_string(), "rw-p");
    }

    #[test]
    fn test_walk_self_is_ascending() {
        let regions: Vec<MemoryRegion> = RegionWalker::eligible(std::process::id())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert!(!regions.is_empty());
        assert!(regions.iter().all(MemoryRegion::is_eligible));
        assert!(regions.windows(2).all(|w| w[0].end <= w[1].start));

        // ヒープ上のバッファを含む領域がある
        let buffer = vec![0u8; 64];
        let address = buffer.as_ptr() as usize;
        let regions: Vec<MemoryRegion> = RegionWalker::eligible(std::process::id())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert!(regions.iter().any(|r| r.contains(address)));
    }

    #[test]
    fn test_walk_missing_process() {
        assert!(RegionWalker::all(u32::MAX).is_err());
    }
}
