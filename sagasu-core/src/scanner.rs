//! パターンエンジン
//!
//! スキャン対象領域を低いアドレスから順に丸ごと読み取り、バイト列を検索します。
//! 数値型はネイティブエンディアンのバイト列として、文字列は固定幅コードユニット列として
//! 検索・読み書きします。

use crate::progress::{NoProgress, ScanProgress};
use crate::search::find_all;
use crate::string::{is_terminator, CharWidth};
use crate::value::{TypedValue, ValueType};
use crate::{Result, ScanError};
use memchr::memmem::Finder;
use sagasu_target::{MemoryRegion, Scalar, TargetError, TargetMemory};
use std::io;
use tracing::{debug, info};

/// 文字列の境界を探すときに一度に読むバイト数
const STRING_SCAN_CHUNK: usize = 256;

/// スキャン設定
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// 隣接する領域の境界をまたぐ一致も報告する
    pub span_adjacent_regions: bool,
    /// これより大きい領域は読まずに飛ばす
    pub max_region_size: Option<usize>,
}

/// ダンプした連続メモリ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryDump {
    pub address: usize,
    pub bytes: Vec<u8>,
}

/// ターゲットのメモリを検索・読み書きする
pub struct Scanner<'a, M: TargetMemory> {
    memory: &'a M,
    options: ScanOptions,
}

impl<'a, M: TargetMemory> Scanner<'a, M> {
    pub fn new(memory: &'a M) -> Self {
        Self::with_options(memory, ScanOptions::default())
    }

    pub fn with_options(memory: &'a M, options: ScanOptions) -> Self {
        Self { memory, options }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    // byte[]

    /// バイト列の出現アドレスをすべて昇順で返す
    pub fn find_bytes(&self, pattern: &[u8]) -> Result<Vec<usize>> {
        self.find_bytes_with(pattern, &mut NoProgress)
    }

    /// 進捗フック付きでバイト列を検索する
    ///
    /// 読み取りに失敗した領域は飛ばして続行します。既定では領域の境界をまたぐ一致は
    /// 検出しません（`ScanOptions::span_adjacent_regions` で有効化）。
    pub fn find_bytes_with(
        &self,
        pattern: &[u8],
        progress: &mut dyn ScanProgress,
    ) -> Result<Vec<usize>> {
        if pattern.is_empty() {
            return Err(ScanError::EmptyPattern);
        }

        let finder = Finder::new(pattern);
        let carry_len = pattern.len() - 1;
        let mut results = Vec::new();
        // 直前の領域の終端アドレスと末尾 carry_len バイト
        let mut carry: Option<(usize, Vec<u8>)> = None;
        let mut scanned = 0usize;

        for (index, region) in self.memory.eligible_regions()?.enumerate() {
            let region = region?;

            if progress.region_started(index, &region).is_break() {
                info!(index, "scan cancelled");
                break;
            }

            if let Some(limit) = self.options.max_region_size {
                if region.size() > limit {
                    debug!(region = %region, limit, "skipping oversized region");
                    carry = None;
                    continue;
                }
            }

            let data = match self.memory.read(region.start, region.size()) {
                Ok(data) => data,
                Err(e) => {
                    debug!(region = %region, error = %e, "skipping unreadable region");
                    carry = None;
                    continue;
                }
            };

            let before = results.len();

            if let Some((end, tail)) = carry.take() {
                if end == region.start {
                    let tail_len = tail.len();
                    let mut window = tail;
                    window.extend_from_slice(&data[..carry_len.min(data.len())]);
                    results.extend(
                        find_all(&finder, &window)
                            .into_iter()
                            .map(|pos| region.start - tail_len + pos),
                    );
                }
            }

            results.extend(
                find_all(&finder, &data)
                    .into_iter()
                    .map(|offset| region.start + offset),
            );

            if self.options.span_adjacent_regions && carry_len > 0 {
                let keep = carry_len.min(data.len());
                carry = Some((region.end, data[data.len() - keep..].to_vec()));
            }

            progress.region_finished(index, &region, results.len() - before);
            scanned += 1;
        }

        info!(
            pattern_len = pattern.len(),
            regions = scanned,
            matches = results.len(),
            "scan finished"
        );
        Ok(results)
    }

    /// 生のバイト列を読み取る
    pub fn read_bytes(&self, address: usize, length: usize) -> Result<Vec<u8>> {
        Ok(self.memory.read(address, length)?)
    }

    /// 生のバイト列を書き込み、書き込んだバイト数を返す
    pub fn write_bytes(&self, address: usize, data: &[u8]) -> Result<usize> {
        Ok(self.memory.write(address, data)?)
    }

    // scalar

    pub fn find_scalar<T: Scalar>(&self, value: T) -> Result<Vec<usize>> {
        self.find_bytes(&value.to_ne_vec())
    }

    pub fn read_scalar<T: Scalar>(&self, address: usize) -> Result<T> {
        Ok(self.memory.read_typed(address)?)
    }

    pub fn write_scalar<T: Scalar>(&self, address: usize, value: T) -> Result<usize> {
        Ok(self.memory.write_typed(address, value)?)
    }

    pub fn find_byte(&self, value: i8) -> Result<Vec<usize>> {
        self.find_scalar(value)
    }

    pub fn read_byte(&self, address: usize) -> Result<i8> {
        self.read_scalar(address)
    }

    pub fn write_byte(&self, address: usize, value: i8) -> Result<usize> {
        self.write_scalar(address, value)
    }

    pub fn find_short(&self, value: i16) -> Result<Vec<usize>> {
        self.find_scalar(value)
    }

    pub fn read_short(&self, address: usize) -> Result<i16> {
        self.read_scalar(address)
    }

    pub fn write_short(&self, address: usize, value: i16) -> Result<usize> {
        self.write_scalar(address, value)
    }

    pub fn find_int(&self, value: i32) -> Result<Vec<usize>> {
        self.find_scalar(value)
    }

    pub fn read_int(&self, address: usize) -> Result<i32> {
        self.read_scalar(address)
    }

    pub fn write_int(&self, address: usize, value: i32) -> Result<usize> {
        self.write_scalar(address, value)
    }

    pub fn find_long(&self, value: i64) -> Result<Vec<usize>> {
        self.find_scalar(value)
    }

    pub fn read_long(&self, address: usize) -> Result<i64> {
        self.read_scalar(address)
    }

    pub fn write_long(&self, address: usize, value: i64) -> Result<usize> {
        self.write_scalar(address, value)
    }

    pub fn find_float(&self, value: f32) -> Result<Vec<usize>> {
        self.find_scalar(value)
    }

    pub fn read_float(&self, address: usize) -> Result<f32> {
        self.read_scalar(address)
    }

    pub fn write_float(&self, address: usize, value: f32) -> Result<usize> {
        self.write_scalar(address, value)
    }

    pub fn find_double(&self, value: f64) -> Result<Vec<usize>> {
        self.find_scalar(value)
    }

    pub fn read_double(&self, address: usize) -> Result<f64> {
        self.read_scalar(address)
    }

    pub fn write_double(&self, address: usize, value: f64) -> Result<usize> {
        self.write_scalar(address, value)
    }

    // String

    /// 文字列を検索し、一致を含むNUL終端文字列の先頭アドレスを返す
    pub fn find_string(&self, text: &str, width: CharWidth) -> Result<Vec<usize>> {
        self.find_string_with(text, width, &mut NoProgress)
    }

    /// 進捗フック付きで文字列を検索する
    ///
    /// 領域内で先頭（直前の終端）を特定できない一致は捨てます。
    /// 一致1つにつき先頭アドレスを1つ返すため、同じ文字列内の複数の一致は
    /// 同じアドレスとして重複して現れます。
    pub fn find_string_with(
        &self,
        text: &str,
        width: CharWidth,
        progress: &mut dyn ScanProgress,
    ) -> Result<Vec<usize>> {
        let pattern = width.encode(text)?;
        let hits = self.find_bytes_with(&pattern, progress)?;
        if hits.is_empty() {
            return Ok(hits);
        }

        let regions: Vec<MemoryRegion> = self
            .memory
            .eligible_regions()?
            .collect::<sagasu_target::Result<_>>()?;

        let mut bases: Vec<usize> = Vec::new();
        for hit in hits {
            let index = regions.partition_point(|r| r.end <= hit);
            let Some(region) = regions.get(index).filter(|r| r.contains(hit)) else {
                debug!(hit = %format!("{:#x}", hit), "region of string hit disappeared");
                continue;
            };

            match self.string_base(hit, width, region) {
                Ok(base) => bases.push(base),
                Err(e) if e.is_read_fault() => {
                    debug!(hit = %format!("{:#x}", hit), error = %e, "dropping unresolvable string hit");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(bases)
    }

    /// アドレスを含むNUL終端文字列を読み取る
    pub fn read_string(&self, address: usize, width: CharWidth) -> Result<String> {
        let region = self.containing_region(address)?;
        let base = self.string_base(address, width, &region)?;
        let end = self.string_end(base, width, &region)?;
        let bytes = self.memory.read(base, end - base)?;
        Ok(width.decode(&bytes))
    }

    /// アドレスを含む文字列を書き換える
    ///
    /// 旧文字列と新文字列の長い方に終端1つ分を加えた長さをゼロで埋め、
    /// 先頭から新しい内容を書き込みます。書き込んだバイト数を返します。
    pub fn write_string(&self, text: &str, address: usize, width: CharWidth) -> Result<usize> {
        let encoded = width.encode(text)?;
        let region = self.containing_region(address)?;
        let base = self.string_base(address, width, &region)?;
        let old_len = self.string_end(base, width, &region)? - base;

        let mut buffer = vec![0u8; old_len.max(encoded.len()) + width.bytes()];
        buffer[..encoded.len()].copy_from_slice(&encoded);

        if base + buffer.len() > region.end {
            return Err(TargetError::WriteFault {
                address: base,
                length: buffer.len(),
                source: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "string would extend past the end of its region",
                ),
            }
            .into());
        }

        Ok(self.memory.write(base, &buffer)?)
    }

    // typed values

    /// 型付き値を検索する
    pub fn find_value(&self, value: &TypedValue) -> Result<Vec<usize>> {
        self.find_value_with(value, &mut NoProgress)
    }

    pub fn find_value_with(
        &self,
        value: &TypedValue,
        progress: &mut dyn ScanProgress,
    ) -> Result<Vec<usize>> {
        match value {
            TypedValue::Byte(v) => self.find_bytes_with(&v.to_ne_vec(), progress),
            TypedValue::Short(v) => self.find_bytes_with(&v.to_ne_vec(), progress),
            TypedValue::Int(v) => self.find_bytes_with(&v.to_ne_vec(), progress),
            TypedValue::Long(v) => self.find_bytes_with(&v.to_ne_vec(), progress),
            TypedValue::Float(v) => self.find_bytes_with(&v.to_ne_vec(), progress),
            TypedValue::Double(v) => self.find_bytes_with(&v.to_ne_vec(), progress),
            TypedValue::Text(text, width) => self.find_string_with(text, *width, progress),
        }
    }

    /// 指定した型で値を読み取る
    pub fn read_value(&self, ty: ValueType, address: usize) -> Result<TypedValue> {
        Ok(match ty {
            ValueType::Byte => TypedValue::Byte(self.read_byte(address)?),
            ValueType::Short => TypedValue::Short(self.read_short(address)?),
            ValueType::Int => TypedValue::Int(self.read_int(address)?),
            ValueType::Long => TypedValue::Long(self.read_long(address)?),
            ValueType::Float => TypedValue::Float(self.read_float(address)?),
            ValueType::Double => TypedValue::Double(self.read_double(address)?),
            ValueType::String(width) => TypedValue::Text(self.read_string(address, width)?, width),
        })
    }

    /// 型付き値を書き込み、書き込んだバイト数を返す
    pub fn write_value(&self, address: usize, value: &TypedValue) -> Result<usize> {
        match value {
            TypedValue::Byte(v) => self.write_byte(address, *v),
            TypedValue::Short(v) => self.write_short(address, *v),
            TypedValue::Int(v) => self.write_int(address, *v),
            TypedValue::Long(v) => self.write_long(address, *v),
            TypedValue::Float(v) => self.write_float(address, *v),
            TypedValue::Double(v) => self.write_double(address, *v),
            TypedValue::Text(text, width) => self.write_string(text, address, *width),
        }
    }

    // dump

    /// 表示用にメモリを読み取る
    ///
    /// - アドレスと長さ: その範囲
    /// - アドレスのみ: そのアドレスから所属領域の終端まで
    /// - どちらもなし: すべてのスキャン対象領域（読めない領域は飛ばす）
    pub fn dump(&self, address: Option<usize>, length: Option<usize>) -> Result<Vec<MemoryDump>> {
        match (address, length) {
            (Some(address), Some(length)) => Ok(vec![MemoryDump {
                address,
                bytes: self.memory.read(address, length)?,
            }]),
            (Some(address), None) => {
                let region = self.containing_region(address)?;
                Ok(vec![MemoryDump {
                    address,
                    bytes: self.memory.read(address, region.end - address)?,
                }])
            }
            (None, None) => {
                let mut dumps = Vec::new();
                for region in self.memory.eligible_regions()? {
                    let region = region?;
                    match self.memory.read(region.start, region.size()) {
                        Ok(bytes) => dumps.push(MemoryDump {
                            address: region.start,
                            bytes,
                        }),
                        Err(e) => debug!(region = %region, error = %e, "skipping unreadable region"),
                    }
                }
                Ok(dumps)
            }
            (None, Some(_)) => Err(ScanError::InvalidArgument(
                "dump length requires an address".to_string(),
            )),
        }
    }

    /// アドレスを含むスキャン対象領域を探す
    fn containing_region(&self, address: usize) -> Result<MemoryRegion> {
        for region in self.memory.eligible_regions()? {
            let region = region?;
            if region.contains(address) {
                return Ok(region);
            }
            if region.start > address {
                break;
            }
        }

        Err(TargetError::read_fault(address, 1, "address is outside every eligible region").into())
    }

    /// 直前の終端コードユニットの直後（文字列の先頭）を探す
    fn string_base(&self, address: usize, width: CharWidth, region: &MemoryRegion) -> Result<usize> {
        let unit = width.bytes();
        let mut cursor = address;

        loop {
            let available = (cursor - region.start) / unit;
            if available == 0 {
                return Err(TargetError::read_fault(
                    address,
                    unit,
                    "no terminator before the string inside its region",
                )
                .into());
            }

            let units = available.min(STRING_SCAN_CHUNK / unit);
            let chunk_start = cursor - units * unit;
            let bytes = self.memory.read(chunk_start, units * unit)?;

            if let Some(i) = bytes.chunks_exact(unit).rposition(is_terminator) {
                return Ok(chunk_start + (i + 1) * unit);
            }
            cursor = chunk_start;
        }
    }

    /// 先頭から終端コードユニットのアドレスを探す
    fn string_end(&self, base: usize, width: CharWidth, region: &MemoryRegion) -> Result<usize> {
        let unit = width.bytes();
        let mut cursor = base;

        loop {
            let available = (region.end - cursor) / unit;
            if available == 0 {
                return Err(TargetError::read_fault(
                    base,
                    unit,
                    "string is not terminated inside its region",
                )
                .into());
            }

            let units = available.min(STRING_SCAN_CHUNK / unit);
            let bytes = self.memory.read(cursor, units * unit)?;

            if let Some(i) = bytes.chunks_exact(unit).position(is_terminator) {
                return Ok(cursor + i * unit);
            }
            cursor += units * unit;
        }
    }
}
