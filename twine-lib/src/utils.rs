//! contains small utility functions that have nowhere else to go

/// returns the crate version
pub fn get_version() -> [u16; 3] {
    let version_str = env!("CARGO_PKG_VERSION");
    let mut parts = version_str.split('.').map(|x| x.parse::<u16>().unwrap_or(0));
    [
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    ]
}

/// Resolves backslash escapes in the raw text of a string literal.
/// Unknown escapes stand for the escaped character itself.
pub fn unescape(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('0') => result.push('\0'),
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r#"a\"b"#), "a\"b");
        assert_eq!(unescape(r"line\nnext\ttab"), "line\nnext\ttab");
        assert_eq!(unescape(r"back\\slash"), "back\\slash");
        assert_eq!(unescape(r"\q"), "q");
        assert_eq!(unescape("plain"), "plain");
    }

    #[test]
    fn test_version() {
        assert_eq!(get_version(), [0, 1, 0]);
    }
}
