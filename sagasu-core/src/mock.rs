//! テスト用のメモリモック

use sagasu_target::{MemoryRegion, Protection, Regions, TargetError, TargetMemory};
use std::cell::RefCell;

struct MockRegion {
    region: MemoryRegion,
    data: Vec<u8>,
    faulty: bool,
}

/// 領域ごとのバイト列を持つ疑似アドレス空間
#[derive(Default)]
pub struct MockMemory {
    regions: RefCell<Vec<MockRegion>>,
}

impl MockMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 読み書き可能な領域を追加する
    pub fn with_region(self, start: usize, data: Vec<u8>) -> Self {
        self.push(start, data, "rw-p", false)
    }

    /// 読み取り専用の領域を追加する（スキャン対象外）
    pub fn with_readonly_region(self, start: usize, data: Vec<u8>) -> Self {
        self.push(start, data, "r--p", false)
    }

    /// 読み取りが必ず失敗する領域を追加する
    pub fn with_faulty_region(self, start: usize, size: usize) -> Self {
        self.push(start, vec![0; size], "rw-p", true)
    }

    fn push(self, start: usize, data: Vec<u8>, perms: &str, faulty: bool) -> Self {
        let region = MemoryRegion {
            start,
            end: start + data.len(),
            protection: Protection::parse(perms).unwrap(),
            offset: 0,
            path: None,
        };
        {
            let mut regions = self.regions.borrow_mut();
            regions.push(MockRegion {
                region,
                data,
                faulty,
            });
            regions.sort_by_key(|r| r.region.start);
        }
        self
    }

    /// 指定アドレスのバイトを直接見る
    pub fn peek(&self, address: usize, length: usize) -> Vec<u8> {
        (address..address + length)
            .map(|a| self.byte_at(a).unwrap_or(0))
            .collect()
    }

    fn byte_at(&self, address: usize) -> Option<u8> {
        let regions = self.regions.borrow();
        let r = regions.iter().find(|r| r.region.contains(address) && !r.faulty)?;
        Some(r.data[address - r.region.start])
    }
}

impl TargetMemory for MockMemory {
    fn eligible_regions(&self) -> sagasu_target::Result<Regions<'_>> {
        let regions: Vec<MemoryRegion> = self
            .regions
            .borrow()
            .iter()
            .map(|r| r.region.clone())
            .filter(MemoryRegion::is_eligible)
            .collect();
        Ok(Box::new(regions.into_iter().map(Ok)))
    }

    fn read(&self, address: usize, length: usize) -> sagasu_target::Result<Vec<u8>> {
        if length == 0 {
            return Ok(Vec::new());
        }
        if self.byte_at(address).is_none() {
            return Err(TargetError::read_fault(address, length, "unmapped"));
        }

        let mut buffer = vec![0u8; length];
        for (i, slot) in buffer.iter_mut().enumerate() {
            match self.byte_at(address + i) {
                Some(b) => *slot = b,
                None => break,
            }
        }
        Ok(buffer)
    }

    fn write(&self, address: usize, data: &[u8]) -> sagasu_target::Result<usize> {
        let mut regions = self.regions.borrow_mut();
        let mut written = 0;

        for (i, &b) in data.iter().enumerate() {
            let a = address + i;
            let Some(r) = regions.iter_mut().find(|r| r.region.contains(a) && !r.faulty) else {
                break;
            };
            r.data[a - r.region.start] = b;
            written += 1;
        }

        if written == 0 && !data.is_empty() {
            return Err(TargetError::WriteFault {
                address,
                length: data.len(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "unmapped"),
            });
        }
        Ok(written)
    }
}
