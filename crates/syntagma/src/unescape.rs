//! Escape-sequence interpretation for quoted token values.
//!
//! Used by the `unquote` parser option and by the grammar fragment scanner
//! when it reads quoted literals.

/// Strips matching quotes from `s` and interprets standard escape sequences.
///
/// Inputs without a surrounding quote pair are unescaped as-is. Backtick
/// strings are raw: quotes are stripped but the body is left untouched.
pub fn unquote(s: &str) -> Result<String, String> {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last {
            match first {
                b'`' => return Ok(s[1..s.len() - 1].to_string()),
                b'"' | b'\'' => return unescape(&s[1..s.len() - 1]),
                _ => {}
            }
        }
    }
    unescape(s)
}

/// Interprets `\n`-style escapes in `s`.
///
/// Recognized: `\n \r \t \0 \\ \' \" \`` plus `\xNN` and `\u{…}`.
pub fn unescape(s: &str) -> Result<String, String> {
    if !s.contains('\\') {
        return Ok(s.to_string());
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(esc) = chars.next() else {
            return Err("trailing backslash".to_string());
        };
        match esc {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            '`' => out.push('`'),
            'x' => {
                let hi = chars.next().ok_or("truncated \\x escape")?;
                let lo = chars.next().ok_or("truncated \\x escape")?;
                let code = u32::from_str_radix(&format!("{hi}{lo}"), 16)
                    .map_err(|_| format!("invalid \\x escape \\x{hi}{lo}"))?;
                out.push(char::from_u32(code).ok_or(format!("invalid \\x escape \\x{hi}{lo}"))?);
            }
            'u' => {
                if chars.next() != Some('{') {
                    return Err("expected { after \\u".to_string());
                }
                let mut digits = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(d) => digits.push(d),
                        None => return Err("unterminated \\u escape".to_string()),
                    }
                }
                let code = u32::from_str_radix(&digits, 16)
                    .map_err(|_| format!("invalid \\u escape \\u{{{digits}}}"))?;
                out.push(
                    char::from_u32(code).ok_or(format!("invalid \\u escape \\u{{{digits}}}"))?,
                );
            }
            other => return Err(format!("unknown escape \\{other}")),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_quotes_and_escapes() {
        assert_eq!(unquote(r#""a\nb""#).unwrap(), "a\nb");
        assert_eq!(unquote(r#"'it\'s'"#).unwrap(), "it's");
    }

    #[test]
    fn backtick_is_raw() {
        assert_eq!(unquote(r"`a\nb`").unwrap(), r"a\nb");
    }

    #[test]
    fn hex_and_unicode() {
        assert_eq!(unescape(r"\x41\u{1F600}").unwrap(), "A\u{1F600}");
    }

    #[test]
    fn bad_escapes_error() {
        assert!(unescape(r"\q").is_err());
        assert!(unescape(r"\x4").is_err());
        assert!(unescape(r"\u{zz}").is_err());
    }

    #[test]
    fn unquoted_input_passes_through() {
        assert_eq!(unquote("plain").unwrap(), "plain");
    }
}
