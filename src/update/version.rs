// Decimal version number parsing for the update server's version endpoint

/// Longest version body read from the server.
pub const MAX_VERSION_BODY: usize = 29;

/// Parse a leading decimal integer the way the card always has: optional leading
/// whitespace, optional sign, at least one digit. Anything after the digits is ignored.
pub fn parse_version(body: &[u8]) -> Option<i32> {
    let text = String::from_utf8_lossy(body);
    let text = text.trim_start();
    let digits_start = usize::from(text.starts_with(['+', '-']));
    let digits_len = text[digits_start..].bytes().take_while(u8::is_ascii_digit).count();
    if digits_len == 0 {
        return None;
    }
    text[..digits_start + digits_len].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_and_padded_numbers() {
        assert_eq!(parse_version(b"7"), Some(7));
        assert_eq!(parse_version(b"  42\r\n"), Some(42));
        assert_eq!(parse_version(b"\t-3"), Some(-3));
        assert_eq!(parse_version(b"+12"), Some(12));
    }

    #[test]
    fn trailing_text_is_ignored() {
        assert_eq!(parse_version(b"15 (beta)"), Some(15));
        assert_eq!(parse_version(b"9.1"), Some(9));
    }

    #[test]
    fn rejects_non_numbers() {
        assert_eq!(parse_version(b""), None);
        assert_eq!(parse_version(b"version 3"), None);
        assert_eq!(parse_version(b"-"), None);
        assert_eq!(parse_version(b"99999999999"), None);
    }
}
