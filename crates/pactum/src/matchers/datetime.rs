//! `SimpleDateFormat`-style date/time formats.
//!
//! Contracts carry Java-style patterns (`yyyy-MM-dd'T'HH:mm:ss`). They are
//! translated once into a chrono strftime string and values are checked with
//! chrono's partial parser, so date-only and time-only formats work too.

use chrono::format::{parse, Item, Parsed, StrftimeItems};

/// Translate a `SimpleDateFormat` pattern into a chrono strftime string.
pub fn to_strftime(format: &str) -> Result<String, String> {
    let mut out = String::with_capacity(format.len() * 2);
    let chars: Vec<char> = format.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            // '' is an escaped quote, otherwise copy up to the closing quote
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            let mut j = i + 1;
            loop {
                match chars.get(j) {
                    None => return Err(format!("unterminated quote in '{format}'")),
                    Some('\'') if chars.get(j + 1) == Some(&'\'') => {
                        out.push('\'');
                        j += 2;
                    }
                    Some('\'') => break,
                    Some(&lit) => {
                        push_literal(&mut out, lit);
                        j += 1;
                    }
                }
            }
            i = j + 1;
            continue;
        }

        if !c.is_ascii_alphabetic() {
            push_literal(&mut out, c);
            i += 1;
            continue;
        }

        let run = chars[i..].iter().take_while(|&&x| x == c).count();
        let spec = match (c, run) {
            ('y', 2) => "%y",
            ('y', _) => "%Y",
            ('M', 1 | 2) => "%m",
            ('M', 3) => "%b",
            ('M', _) => "%B",
            ('d', _) => "%d",
            ('D', _) => "%j",
            ('H', _) => "%H",
            ('h', _) => "%I",
            ('m', _) => "%M",
            ('s', _) => "%S",
            ('S', 1..=3) => "%3f",
            ('S', 4..=6) => "%6f",
            ('S', _) => "%9f",
            ('a', _) => "%p",
            ('E', 1..=3) => "%a",
            ('E', _) => "%A",
            ('u', _) => "%u",
            ('Z', _) => "%z",
            ('X', _) | ('x', _) => "%#z",
            _ => return Err(format!("unsupported pattern letter '{c}' in '{format}'")),
        };
        out.push_str(spec);
        i += run;
    }

    if StrftimeItems::new(&out).any(|item| matches!(item, Item::Error)) {
        return Err(format!("'{format}' is not a valid date/time format"));
    }
    Ok(out)
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

/// Whether `value` conforms to the `SimpleDateFormat` pattern.
pub fn parses(value: &str, format: &str) -> bool {
    let Ok(strftime) = to_strftime(format) else {
        return false;
    };
    let mut parsed = Parsed::default();
    parse(&mut parsed, value, StrftimeItems::new(&strftime)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_like_format() {
        assert_eq!(
            to_strftime("yyyy-MM-dd'T'HH:mm:ss").unwrap(),
            "%Y-%m-%dT%H:%M:%S"
        );
        assert!(parses("2021-01-01T08:00:45", "yyyy-MM-dd'T'HH:mm:ss"));
        assert!(!parses("2021-01-01 08:00:45", "yyyy-MM-dd'T'HH:mm:ss"));
        assert!(!parses("yesterday", "yyyy-MM-dd'T'HH:mm:ss"));
    }

    #[test]
    fn test_date_only_and_millis() {
        assert!(parses("2020-02-29", "yyyy-MM-dd"));
        assert!(parses("08:00:45.123", "HH:mm:ss.SSS"));
        assert!(!parses("08:00:45", "HH:mm:ss.SSS"));
    }

    #[test]
    fn test_escaped_quote_and_percent() {
        assert_eq!(to_strftime("HH 'o''clock' 100%").unwrap(), "%H o'clock 100%%");
    }

    #[test]
    fn test_unsupported_letter() {
        assert!(to_strftime("yyyy-QQ").is_err());
        assert!(to_strftime("'open").is_err());
    }
}
