//! パース関連のユーティリティ関数

use crate::{Result, ScanError};

/// アドレス文字列をusizeにパース
///
/// 16進数（0xプレフィックス付き）または10進数をサポート
///
/// # Examples
/// ```
/// use sagasu_core::parse::parse_address;
///
/// assert_eq!(parse_address("0x1234").unwrap(), 0x1234);
/// assert_eq!(parse_address("1234").unwrap(), 1234);
/// ```
pub fn parse_address(s: &str) -> Result<usize> {
    let s = s.trim();
    let invalid = || ScanError::InvalidArgument(format!("invalid address '{}'", s));

    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        // 16進数
        usize::from_str_radix(hex, 16).map_err(|_| invalid())
    } else {
        // 10進数でもダメなら16進数として解釈を試みる
        s.parse::<usize>()
            .or_else(|_| usize::from_str_radix(s, 16))
            .map_err(|_| invalid())
    }
}

/// 整数文字列をパース
///
/// 符号付き10進数、または0xプレフィックス付き16進数（負号も可）
pub fn parse_integer(s: &str) -> Option<i128> {
    let s = s.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    if digits.starts_with(['-', '+']) {
        return None;
    }

    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i128::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i128>().ok()?,
    };

    Some(if negative { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_hex() {
        assert_eq!(parse_address("0x1234").unwrap(), 0x1234);
        assert_eq!(parse_address("0X1234").unwrap(), 0x1234);
        assert_eq!(parse_address("0xabcd").unwrap(), 0xabcd);
        assert_eq!(parse_address("0xABCD").unwrap(), 0xabcd);
        assert_eq!(parse_address("7fff0000").unwrap(), 0x7fff0000);
    }

    #[test]
    fn test_parse_address_dec() {
        assert_eq!(parse_address("1234").unwrap(), 1234);
        assert_eq!(parse_address("9999").unwrap(), 9999);
    }

    #[test]
    fn test_parse_address_invalid() {
        assert!(parse_address("xyz").is_err());
        assert!(parse_address("0xghij").is_err());
        assert!(parse_address("-1").is_err());
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer("42"), Some(42));
        assert_eq!(parse_integer("-42"), Some(-42));
        assert_eq!(parse_integer("+7"), Some(7));
        assert_eq!(parse_integer("0x12345678"), Some(0x12345678));
        assert_eq!(parse_integer("-0x10"), Some(-16));
        assert_eq!(parse_integer("1.5"), None);
        assert_eq!(parse_integer(""), None);
    }
}
