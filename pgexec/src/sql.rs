//! Sql string operation.

/// Count positional parameter markers in `sql`.
///
/// The count is the highest `$n` referenced, the same rule postgres use to size
/// the parameter list, so `SELECT $2` expect two parameters.
///
/// Markers inside string literals, quoted identifiers, dollar quoted strings and
/// comments are ignored.
pub fn count_placeholders(sql: &str) -> usize {
    let bytes = sql.as_bytes();
    let len = bytes.len();
    let mut max = 0;
    let mut i = 0;

    while i < len {
        match bytes[i] {
            b'\'' => {
                let escape = i > 0
                    && matches!(bytes[i - 1], b'e' | b'E')
                    && (i < 2 || !is_ident(bytes[i - 2]));
                i = skip_string(bytes, i + 1, escape);
            }
            b'"' => i = skip_until(bytes, i + 1, b'"'),
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = match bytes[i..].iter().position(|&b| b == b'\n') {
                    Some(n) => i + n + 1,
                    None => len,
                };
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_block_comment(bytes, i + 2),
            b'$' if i > 0 && is_ident(bytes[i - 1]) => i += 1,
            b'$' => {
                let start = i + 1;
                let mut end = start;
                while end < len && bytes[end].is_ascii_digit() {
                    end += 1;
                }

                if end > start {
                    let n = sql[start..end].parse().unwrap_or(usize::MAX);
                    max = max.max(n);
                    i = end;
                    continue;
                }

                match dollar_tag(bytes, i) {
                    Some(tag_end) => {
                        let tag = &bytes[i..tag_end];
                        i = match find(&bytes[tag_end..], tag) {
                            Some(n) => tag_end + n + tag.len(),
                            None => len,
                        };
                    }
                    None => i += 1,
                }
            }
            _ => i += 1,
        }
    }

    max
}

fn is_ident(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

/// Returns index after the closing quote, `''` is an escaped quote.
fn skip_string(bytes: &[u8], mut i: usize, backslash: bool) -> usize {
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if backslash => i += 2,
            b'\'' if bytes.get(i + 1) == Some(&b'\'') => i += 2,
            b'\'' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn skip_until(bytes: &[u8], i: usize, end: u8) -> usize {
    match bytes[i.min(bytes.len())..].iter().position(|&b| b == end) {
        Some(n) => i + n + 1,
        None => bytes.len(),
    }
}

/// Block comments nest in postgres.
fn skip_block_comment(bytes: &[u8], mut i: usize) -> usize {
    let mut depth = 1;
    while i < bytes.len() {
        match (bytes[i], bytes.get(i + 1)) {
            (b'/', Some(b'*')) => {
                depth += 1;
                i += 2;
            }
            (b'*', Some(b'/')) => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return i;
                }
            }
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Returns index after the opening `$tag$`, tag cannot start with digit.
fn dollar_tag(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'$' => return Some(i + 1),
            b if is_ident(b) && !(i == start + 1 && b.is_ascii_digit()) => i += 1,
            _ => return None,
        }
    }
    None
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
