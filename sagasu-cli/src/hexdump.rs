//! ヘックスダンプ表示

/// 1行あたりのバイト数
pub const BYTES_PER_LINE: usize = 32;

/// メモリの内容を16進数とASCIIの並びに整形する
///
/// 各行は改行で終わります。最後の短い行もASCII列が揃うように空白で埋めます。
pub fn format_dump(address: usize, bytes: &[u8]) -> String {
    bytes
        .chunks(BYTES_PER_LINE)
        .enumerate()
        .map(|(i, line)| format_line(address + i * BYTES_PER_LINE, line))
        .collect()
}

fn format_line(address: usize, line: &[u8]) -> String {
    let hex: String = line.iter().map(|b| format!("{:02X} ", b)).collect();
    let ascii: String = line.iter().map(|&b| printable(b)).collect();

    format!(
        "{:016X} {:<width$}  {}\n",
        address,
        hex,
        ascii,
        width = BYTES_PER_LINE * 3
    )
}

fn printable(byte: u8) -> char {
    if byte.is_ascii_graphic() || byte == b' ' {
        byte as char
    } else {
        '.'
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_line() {
        let bytes: Vec<u8> = (0x40..0x60).collect();
        let dump = format_dump(0x7f00_0000_1000, &bytes);

        let expected_hex: String = (0x40..0x60).map(|b| format!("{:02X} ", b)).collect();
        assert_eq!(
            dump,
            format!(
                "00007F0000001000 {}  @ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^_\n",
                expected_hex
            )
        );
    }

    #[test]
    fn test_short_line_is_padded() {
        let dump = format_dump(0x10, &[0x41, 0x00, 0x7f]);
        let line = dump.lines().next().unwrap();

        assert!(line.starts_with("0000000000000010 41 00 7F "));
        assert!(line.ends_with("  A.."));
        assert_eq!(line.len(), 16 + 1 + BYTES_PER_LINE * 3 + 2 + 3);
    }

    #[test]
    fn test_line_addresses_advance() {
        let dump = format_dump(0xffe0, &[b'x'; 70]);
        let addresses: Vec<&str> = dump.lines().map(|l| &l[..16]).collect();

        assert_eq!(
            addresses,
            vec!["000000000000FFE0", "0000000000010000", "0000000000010020"]
        );
        assert!(dump.lines().last().unwrap().ends_with("  xxxxxx"));
    }

    #[test]
    fn test_multiple_lines() {
        let dump = format_dump(0, &[0x20; 40]);
        let lines: Vec<&str> = dump.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("0000000000000020 "));
        assert!(format_dump(0, &[]).is_empty());
    }
}
