//! メモリアクセス機能

use crate::handle::ProcessHandle;
use crate::regions::MemoryRegion;
use crate::{Result, TargetError};
use std::io::{self, ErrorKind};
use std::os::unix::fs::FileExt;
use tracing::debug;

/// 固定幅でメモリに読み書きできる型
///
/// バイト列はターゲットOSのネイティブエンディアンで扱います。
pub trait Scalar: Copy + Sized {
    /// 型のサイズ（バイト数）
    const SIZE: usize;

    /// バイト列から値を構築する（長さが合わなければNone）
    fn from_ne_slice(bytes: &[u8]) -> Option<Self>;

    /// バイト列に変換する
    fn to_ne_vec(self) -> Vec<u8>;
}

macro_rules! impl_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Scalar for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn from_ne_slice(bytes: &[u8]) -> Option<Self> {
                    bytes.try_into().ok().map(<$ty>::from_ne_bytes)
                }

                fn to_ne_vec(self) -> Vec<u8> {
                    self.to_ne_bytes().to_vec()
                }
            }
        )*
    };
}

impl_scalar!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// ユーザー空間の上限（5段ページングの57ビット）
#[cfg(target_pointer_width = "64")]
const USER_SPACE_END: usize = 1 << 57;
#[cfg(not(target_pointer_width = "64"))]
const USER_SPACE_END: usize = usize::MAX;

/// 領域の遅延列挙
pub type Regions<'a> = Box<dyn Iterator<Item = Result<MemoryRegion>> + 'a>;

/// ターゲットのアドレス空間へのアクセス
///
/// パターンエンジンはこのトレイト越しにのみターゲットへ触れます。
pub trait TargetMemory {
    /// スキャン対象の領域を低いアドレスから列挙する
    fn eligible_regions(&self) -> Result<Regions<'_>>;

    /// `length` バイトを読み取る
    ///
    /// 一部しか読めなかった場合は残りをゼロで埋めて返します。
    /// 1バイトも読めなければ `ReadFault` です。
    fn read(&self, address: usize, length: usize) -> Result<Vec<u8>>;

    /// 書き込んだバイト数を返す
    fn write(&self, address: usize, data: &[u8]) -> Result<usize>;

    /// 型付き値を読み取る
    fn read_typed<T: Scalar>(&self, address: usize) -> Result<T>
    where
        Self: Sized,
    {
        let bytes = self.read(address, T::SIZE)?;
        T::from_ne_slice(&bytes).ok_or_else(|| TargetError::ReadFault {
            address,
            length: T::SIZE,
            source: io::Error::new(
                ErrorKind::InvalidData,
                format!("expected {} bytes, got {}", T::SIZE, bytes.len()),
            ),
        })
    }

    /// 型付き値を書き込む
    fn write_typed<T: Scalar>(&self, address: usize, value: T) -> Result<usize>
    where
        Self: Sized,
    {
        self.write(address, &value.to_ne_vec())
    }
}

impl TargetMemory for ProcessHandle {
    fn eligible_regions(&self) -> Result<Regions<'_>> {
        Ok(Box::new(self.regions()?))
    }

    fn read(&self, address: usize, length: usize) -> Result<Vec<u8>> {
        let file = self.mem_file(false)?;
        if length == 0 {
            return Ok(Vec::new());
        }

        if address.checked_add(length).map_or(true, |end| end > USER_SPACE_END) {
            return Err(TargetError::read_fault(
                address,
                length,
                "range exceeds the user address space",
            ));
        }

        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(length)
            .map_err(|e| TargetError::ReadFault {
                address,
                length,
                source: io::Error::new(ErrorKind::OutOfMemory, e),
            })?;
        buffer.resize(length, 0);
        let mut filled = 0;

        while filled < length {
            let Some(offset) = address.checked_add(filled) else {
                break;
            };

            match file.read_at(&mut buffer[filled..], offset as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(source) if filled == 0 => {
                    return Err(TargetError::ReadFault {
                        address,
                        length,
                        source,
                    });
                }
                Err(_) => break,
            }
        }

        if filled == 0 {
            return Err(TargetError::read_fault(address, length, "nothing could be read"));
        }

        if filled < length {
            debug!(
                address = %format!("{:#x}", address),
                length, filled, "partial read, zero-filling the tail"
            );
        }

        Ok(buffer)
    }

    fn write(&self, address: usize, data: &[u8]) -> Result<usize> {
        let file = self.mem_file(true)?;
        if data.is_empty() {
            return Ok(0);
        }
        let mut written = 0;

        while written < data.len() {
            let Some(offset) = address.checked_add(written) else {
                break;
            };

            match file.write_at(&data[written..], offset as u64) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(source) if written == 0 => {
                    return Err(TargetError::WriteFault {
                        address,
                        length: data.len(),
                        source,
                    });
                }
                Err(_) => break,
            }
        }

        if written < data.len() {
            debug!(
                address = %format!("{:#x}", address),
                length = data.len(),
                written,
                "short write"
            );
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_sizes() {
        assert_eq!(<u8 as Scalar>::SIZE, 1);
        assert_eq!(<i16 as Scalar>::SIZE, 2);
        assert_eq!(<f32 as Scalar>::SIZE, 4);
        assert_eq!(<i64 as Scalar>::SIZE, 8);
    }

    #[test]
    fn test_scalar_uses_native_layout() {
        let value: i32 = 0x1234_5678;
        assert_eq!(value.to_ne_vec(), value.to_ne_bytes().to_vec());
        assert_eq!(i32::from_ne_slice(&value.to_ne_bytes()), Some(value));
    }

    #[test]
    fn test_scalar_rejects_wrong_length() {
        assert_eq!(u32::from_ne_slice(&[1, 2, 3]), None);
        assert_eq!(f64::from_ne_slice(&[0; 9]), None);
    }
}
