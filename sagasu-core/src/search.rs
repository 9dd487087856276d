//! バイト列検索
//!
//! memchr の memmem で線形時間検索を行います。`find_iter` は重ならない一致しか
//! 返さないため、一致ごとに1バイトずつ進めて重なる一致も拾います。

use memchr::memmem::Finder;

/// `haystack` 内のすべての一致位置（重なりを含む）を昇順で返す
pub fn find_all(finder: &Finder<'_>, haystack: &[u8]) -> Vec<usize> {
    let needle_len = finder.needle().len();
    let mut results = Vec::new();
    if needle_len == 0 || haystack.len() < needle_len {
        return results;
    }

    let mut pos = 0;
    while let Some(found) = finder.find(&haystack[pos..]) {
        results.push(pos + found);
        pos += found + 1;
        if haystack.len() - pos < needle_len {
            break;
        }
    }

    results
}
