//! 固定幅コードユニットの文字列エンコード
//!
//! 1文字を `bytes_per_char` バイトのコードユニットとして扱います。
//! コードユニットは文字のスカラー値をリトルエンディアンで並べ、残りをゼロで埋めたものです
//! （幅1ならLatin-1、幅2ならBMP内のUTF-16LE、幅4ならUTF-32LEと一致します）。
//! すべてのバイトがゼロのコードユニットが終端です。

use crate::{Result, ScanError};
use std::fmt;
use std::str::FromStr;

/// 1文字あたりのバイト数（1〜4）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharWidth(usize);

impl CharWidth {
    pub const NARROW: CharWidth = CharWidth(1);
    pub const WIDE: CharWidth = CharWidth(2);

    pub fn new(bytes_per_char: usize) -> Result<Self> {
        if (1..=4).contains(&bytes_per_char) {
            Ok(Self(bytes_per_char))
        } else {
            Err(ScanError::InvalidCharWidth(bytes_per_char))
        }
    }

    pub fn bytes(self) -> usize {
        self.0
    }

    /// 文字列をコードユニット列にエンコードする
    pub fn encode(self, text: &str) -> Result<Vec<u8>> {
        let mut encoded = Vec::with_capacity(text.chars().count() * self.0);

        for ch in text.chars() {
            if ch == '\0' {
                return Err(ScanError::InteriorNul);
            }

            let scalar = ch as u32;
            if self.0 < 4 && scalar >> (8 * self.0) != 0 {
                return Err(ScanError::Unencodable { ch, width: self.0 });
            }

            encoded.extend_from_slice(&scalar.to_le_bytes()[..self.0]);
        }

        Ok(encoded)
    }

    /// コードユニット1つをデコードする（不正な値はU+FFFD）
    pub fn decode_unit(self, unit: &[u8]) -> char {
        let mut scalar = [0u8; 4];
        scalar[..unit.len()].copy_from_slice(unit);
        char::from_u32(u32::from_le_bytes(scalar)).unwrap_or(char::REPLACEMENT_CHARACTER)
    }

    /// コードユニット列をデコードする（末尾の端数は無視）
    pub fn decode(self, bytes: &[u8]) -> String {
        bytes.chunks_exact(self.0).map(|unit| self.decode_unit(unit)).collect()
    }
}

impl Default for CharWidth {
    fn default() -> Self {
        CharWidth::WIDE
    }
}

impl fmt::Display for CharWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CharWidth {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = s
            .trim()
            .parse::<usize>()
            .map_err(|_| ScanError::InvalidArgument(format!("invalid character width '{}'", s)))?;
        CharWidth::new(bytes)
    }
}

/// 終端コードユニットかどうか
pub fn is_terminator(unit: &[u8]) -> bool {
    unit.iter().all(|&b| b == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_wide_pads_each_char() {
        assert_eq!(CharWidth::WIDE.encode("hi").unwrap(), vec![b'h', 0, b'i', 0]);
        assert_eq!(
            CharWidth::new(4).unwrap().encode("A").unwrap(),
            vec![b'A', 0, 0, 0]
        );
    }

    #[test]
    fn test_encode_narrow_is_not_zeroed() {
        // 幅1でも文字のバイトがそのまま入る
        assert_eq!(CharWidth::NARROW.encode("abc").unwrap(), b"abc".to_vec());
        assert_eq!(CharWidth::NARROW.encode("é").unwrap(), vec![0xe9]);
    }

    #[test]
    fn test_encode_rejects_wide_chars() {
        assert!(matches!(
            CharWidth::NARROW.encode("あ"),
            Err(ScanError::Unencodable { ch: 'あ', width: 1 })
        ));
        assert!(matches!(
            CharWidth::WIDE.encode("😀"),
            Err(ScanError::Unencodable { width: 2, .. })
        ));
        assert_eq!(
            CharWidth::new(4).unwrap().encode("😀").unwrap(),
            0x1f600u32.to_le_bytes().to_vec()
        );
    }

    #[test]
    fn test_encode_rejects_nul() {
        assert!(matches!(CharWidth::WIDE.encode("a\0b"), Err(ScanError::InteriorNul)));
    }

    #[test]
    fn test_decode() {
        assert_eq!(CharWidth::WIDE.decode(&[b'h', 0, b'i', 0]), "hi");
        assert_eq!(CharWidth::WIDE.decode(&[0x42, 0x30]), "あ");
        assert_eq!(CharWidth::new(3).unwrap().decode(&[0xff, 0xff, 0xff]), "\u{fffd}");
    }

    #[test]
    fn test_invalid_width() {
        assert!(matches!(CharWidth::new(0), Err(ScanError::InvalidCharWidth(0))));
        assert!(matches!(CharWidth::new(5), Err(ScanError::InvalidCharWidth(5))));
        assert_eq!("2".parse::<CharWidth>().unwrap(), CharWidth::WIDE);
        assert!("two".parse::<CharWidth>().is_err());
    }

    #[test]
    fn test_is_terminator() {
        assert!(is_terminator(&[0, 0]));
        assert!(!is_terminator(&[0, 1]));
    }
}
