//! Domain name text form and label handling.
//!
//! Names are carried as dotted strings without the trailing root dot. Label bytes
//! that are not printable ASCII, and literal dots or backslashes inside a label, use
//! the master-file escapes `\DDD`, `\.` and `\\`.

use super::EncodeError;
use std::fmt::Write as _;

pub const MAX_LABEL_LEN: usize = 63;
pub const MAX_NAME_LEN: usize = 255;

/// Splits a textual name into raw labels, resolving escapes.
///
/// The empty string and `"."` denote the root and yield no labels.
pub fn parse_labels(name: &str) -> Result<Vec<Vec<u8>>, EncodeError> {
    let bytes = name.as_bytes();
    let mut labels = Vec::new();
    let mut current = Vec::new();
    let mut wire_len = 1;
    let mut i = 0;

    if bytes == b"." {
        return Ok(labels);
    }

    while i < bytes.len() {
        match bytes[i] {
            b'.' => {
                if current.is_empty() {
                    return Err(EncodeError::EmptyLabel);
                }
                wire_len += current.len() + 1;
                labels.push(std::mem::take(&mut current));
                i += 1;
            }
            b'\\' => {
                let escaped = parse_escape(&bytes[i + 1..]).ok_or(EncodeError::EmptyLabel)?;
                current.push(escaped.0);
                i += 1 + escaped.1;
            }
            b => {
                current.push(b);
                i += 1;
            }
        }
        if current.len() > MAX_LABEL_LEN {
            return Err(EncodeError::LabelTooLong);
        }
    }

    if !current.is_empty() {
        wire_len += current.len() + 1;
        labels.push(current);
    }

    if wire_len > MAX_NAME_LEN {
        return Err(EncodeError::NameTooLong);
    }

    Ok(labels)
}

/// Returns the escaped byte and the number of input bytes consumed after the backslash.
fn parse_escape(rest: &[u8]) -> Option<(u8, usize)> {
    match rest {
        [a, b, c, ..] if a.is_ascii_digit() && b.is_ascii_digit() && c.is_ascii_digit() => {
            let value = (a - b'0') as u16 * 100 + (b - b'0') as u16 * 10 + (c - b'0') as u16;
            u8::try_from(value).ok().map(|v| (v, 3))
        }
        [b, ..] => Some((*b, 1)),
        [] => None,
    }
}

/// Appends one label to `out` in escaped text form.
pub fn push_label(out: &mut String, label: &[u8]) {
    for &b in label {
        match b {
            b'.' => out.push_str("\\."),
            b'\\' => out.push_str("\\\\"),
            0x21..=0x7e => out.push(b as char),
            _ => {
                let _ = write!(out, "\\{:03}", b);
            }
        }
    }
}

pub fn labels_to_name(labels: &[Vec<u8>]) -> String {
    let mut name = String::new();
    for (i, label) in labels.iter().enumerate() {
        if i > 0 {
            name.push('.');
        }
        push_label(&mut name, label);
    }
    name
}

/// Re-renders a user supplied name in the form the decoder produces.
pub fn canonical_name(name: &str) -> Result<String, EncodeError> {
    parse_labels(name).map(|labels| labels_to_name(&labels))
}

/// Strips a single trailing root dot, leaving an escaped `\.` alone.
pub fn trim_root(name: &str) -> &str {
    if name.len() > 1 && name.ends_with('.') && !name.ends_with("\\.") {
        &name[..name.len() - 1]
    } else if name == "." {
        ""
    } else {
        name
    }
}

/// Case-insensitive comparison of two names by label bytes, so `\119ww` and
/// `www` are the same label. Unparsable names fall back to comparing text.
pub fn names_eq(a: &str, b: &str) -> bool {
    match (parse_labels(a), parse_labels(b)) {
        (Ok(a), Ok(b)) => {
            a.len() == b.len() && a.iter().zip(&b).all(|(x, y)| x.eq_ignore_ascii_case(y))
        }
        _ => trim_root(a).eq_ignore_ascii_case(trim_root(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_name() {
        let labels = parse_labels("www.example.com").unwrap();
        assert_eq!(labels, vec![b"www".to_vec(), b"example".to_vec(), b"com".to_vec()]);
    }

    #[test]
    fn test_root_forms() {
        assert!(parse_labels("").unwrap().is_empty());
        assert!(parse_labels(".").unwrap().is_empty());
        assert_eq!(parse_labels("example.com.").unwrap().len(), 2);
    }

    #[test]
    fn test_empty_label_rejected() {
        assert_eq!(parse_labels("a..b"), Err(EncodeError::EmptyLabel));
        assert_eq!(parse_labels(".a"), Err(EncodeError::EmptyLabel));
    }

    #[test]
    fn test_label_and_name_limits() {
        let long_label = "a".repeat(64);
        assert_eq!(parse_labels(&long_label), Err(EncodeError::LabelTooLong));

        let ok_label = "a".repeat(63);
        assert!(parse_labels(&ok_label).is_ok());

        let long_name = vec!["abcdefghi"; 30].join(".");
        assert_eq!(parse_labels(&long_name), Err(EncodeError::NameTooLong));
    }

    #[test]
    fn test_escapes_roundtrip() {
        let labels = parse_labels("a\\.b.c\\032d").unwrap();
        assert_eq!(labels, vec![b"a.b".to_vec(), b"c d".to_vec()]);
        assert_eq!(labels_to_name(&labels), "a\\.b.c\\032d");
    }

    #[test]
    fn test_names_eq_ignores_case_and_root() {
        assert!(names_eq("WWW.Example.COM.", "www.example.com"));
        assert!(!names_eq("example.com", "example.org"));
        assert!(names_eq(".", ""));
    }

    #[test]
    fn test_names_eq_resolves_escapes() {
        assert!(names_eq("\\119ww.example.com", "www.example.com"));
        assert!(names_eq("\\087WW.example.com.", "www.EXAMPLE.com"));
        assert!(names_eq("a\\.b.example", "a\\046b.example"));
        assert!(!names_eq("a\\.b.example", "a.b.example"));
    }

    #[test]
    fn test_canonical_name_renders_printable_escapes() {
        assert_eq!(canonical_name("\\119ww.example.com.").unwrap(), "www.example.com");
        assert_eq!(canonical_name("a\\046b").unwrap(), "a\\.b");
    }
}
