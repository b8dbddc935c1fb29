//! 日志预览格式化
//! 空白折叠 + 截断，避免把完整载荷/模式写进日志

use std::fmt::{self, Write};

/// 逐个写出单元，最多 max 个；返回是否还有剩余（即发生截断）
fn write_bounded<T, I, E>(
    f: &mut fmt::Formatter<'_>,
    units: I,
    max: usize,
    mut emit: E,
) -> Result<bool, fmt::Error>
where
    I: Iterator<Item = T>,
    E: FnMut(&mut fmt::Formatter<'_>, T) -> fmt::Result,
{
    for (written, unit) in units.enumerate() {
        if written == max {
            return Ok(true);
        }
        emit(f, unit)?;
    }
    Ok(false)
}

/// 字符串预览：连续空白折叠为一个空格，超过 max_len 个字符时截断并追加省略号
/// 格式化时惰性遍历，不分配
pub fn preview_compact(s: &str, max_len: usize) -> impl fmt::Display + '_ {
    struct CompactView<'a>(&'a str, usize);

    impl fmt::Display for CompactView<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let mut in_space = false;
            let collapsed = self.0.chars().filter_map(|ch| {
                if !ch.is_whitespace() {
                    in_space = false;
                    Some(ch)
                } else if in_space {
                    None
                } else {
                    in_space = true;
                    Some(' ')
                }
            });

            if write_bounded(f, collapsed, self.1, |f, ch| f.write_char(ch))? {
                f.write_str("…")?;
            }
            Ok(())
        }
    }

    CompactView(s, max_len)
}

/// 字节载荷预览：可打印ASCII原样输出，其余字节输出为 \xHH；截断时附带总长度
pub fn preview_bytes(data: &[u8], max_len: usize) -> impl fmt::Display + '_ {
    struct BytesView<'a>(&'a [u8], usize);

    impl fmt::Display for BytesView<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let truncated = write_bounded(f, self.0.iter().copied(), self.1, |f, b| {
                if b.is_ascii_graphic() || b == b' ' {
                    f.write_char(b as char)
                } else {
                    write!(f, "\\x{:02x}", b)
                }
            })?;
            if truncated {
                write!(f, "… ({} bytes)", self.0.len())?;
            }
            Ok(())
        }
    }

    BytesView(data, max_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_compact_collapses_whitespace() {
        let s = preview_compact("a  \n\t b", 10).to_string();
        assert_eq!(s, "a b");
    }

    #[test]
    fn test_preview_compact_truncates() {
        let s = preview_compact("abcdefgh", 3).to_string();
        assert_eq!(s, "abc…");
    }

    #[test]
    fn test_preview_compact_counts_collapsed_spaces() {
        // 折叠后的空格占一个字符位
        assert_eq!(preview_compact("ab    cd", 3).to_string(), "ab …");
        assert_eq!(preview_compact("abc", 3).to_string(), "abc");
    }

    #[test]
    fn test_preview_bytes_escapes_binary() {
        let s = preview_bytes(b"ab\x00\xff", 16).to_string();
        assert_eq!(s, "ab\\x00\\xff");

        let s = preview_bytes(b"abcdef", 2).to_string();
        assert_eq!(s, "ab… (6 bytes)");
    }
}
