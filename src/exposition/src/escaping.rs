//! Metric and label name escaping schemes
//!
//! The scheme is negotiated per scrape through the `escaping` parameter of the
//! `Accept` header and applied to every metric and label name written.

use std::borrow::Cow;
use std::fmt;

/// Policy mapping an arbitrary UTF-8 name to the name written on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EscapingScheme {
    /// Names pass through untouched; used with UTF-8 aware scrapers
    AllowUtf8,
    /// Every run of illegal characters collapses into a single `_`
    #[default]
    Underscores,
    /// `.` becomes `_dot_`, `_` becomes `__`, other illegal characters `__`
    Dots,
    /// Reversible `U__` encoding with `_<hex code point>_` escapes
    Values,
}

impl EscapingScheme {
    /// Parse the value of an `escaping=` content-type parameter
    pub fn from_param(value: &str) -> Option<Self> {
        match value {
            "allow-utf-8" => Some(EscapingScheme::AllowUtf8),
            "underscores" => Some(EscapingScheme::Underscores),
            "dots" => Some(EscapingScheme::Dots),
            "values" => Some(EscapingScheme::Values),
            _ => None,
        }
    }

    pub fn as_param(&self) -> &'static str {
        match self {
            EscapingScheme::AllowUtf8 => "allow-utf-8",
            EscapingScheme::Underscores => "underscores",
            EscapingScheme::Dots => "dots",
            EscapingScheme::Values => "values",
        }
    }

    pub fn escape<'a>(&self, name: &'a str) -> Cow<'a, str> {
        match self {
            EscapingScheme::AllowUtf8 => Cow::Borrowed(name),
            EscapingScheme::Underscores => Cow::Owned(escape_underscores(name)),
            EscapingScheme::Dots => Cow::Owned(escape_dots(name)),
            EscapingScheme::Values => Cow::Owned(escape_values(name)),
        }
    }
}

impl fmt::Display for EscapingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

fn is_legal_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == ':'
}

fn escape_underscores(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if is_legal_char(c) {
            escaped.push(c);
        } else if !escaped.ends_with('_') {
            escaped.push('_');
        }
    }

    match escaped.chars().next() {
        Some(c) if c.is_ascii_alphabetic() || c == ':' || c == '_' => {}
        Some(_) => {
            escaped.replace_range(..1, "_");
            if escaped.as_bytes().get(1) == Some(&b'_') {
                escaped.remove(0);
            }
        }
        None => escaped.push('_'),
    }

    escaped
}

fn escape_dots(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len() + 8);
    for (i, c) in name.chars().enumerate() {
        match c {
            '_' => escaped.push_str("__"),
            '.' => escaped.push_str("_dot_"),
            c if c.is_ascii_alphabetic() || c == ':' || (i > 0 && c.is_ascii_digit()) => {
                escaped.push(c)
            }
            _ => escaped.push_str("__"),
        }
    }

    if escaped.is_empty() {
        escaped.push('_');
    }

    escaped
}

fn escape_values(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len() + 3);
    escaped.push_str("U__");
    for c in name.chars() {
        if c == '_' {
            escaped.push_str("__");
        } else if is_legal_char(c) {
            escaped.push(c);
        } else {
            let hex = format!("{:x}", u32::from(c));
            escaped.push('_');
            if hex.len() % 2 == 1 {
                escaped.push('0');
            }
            escaped.push_str(&hex);
            escaped.push('_');
        }
    }

    escaped
}

/// Matches the classic metric name grammar `[a-zA-Z_:][a-zA-Z0-9_:]*`
pub fn is_legacy_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Matches the classic label name grammar `[a-zA-Z_][a-zA-Z0-9_]*`
pub fn is_legacy_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "http.server.duration",
        "http_server_duration",
        "__private",
        "1st_metric",
        "9",
        "",
        "_",
        "a..b",
        "a/b",
        "a__b",
        "üñí©ødé",
        "ratio%",
        "queue-size{x}",
        "ns:subsystem:metric",
        "日本語",
        "🎉party",
        "_1x",
    ];

    fn unescape_values(escaped: &str) -> String {
        let body = escaped.strip_prefix("U__").expect("values prefix");
        let mut out = String::new();
        let mut chars = body.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '_' {
                out.push(c);
                continue;
            }
            if chars.peek() == Some(&'_') {
                chars.next();
                out.push('_');
                continue;
            }
            let hex: String = chars.by_ref().take_while(|c| *c != '_').collect();
            let code = u32::from_str_radix(&hex, 16).expect("hex code point");
            out.push(char::from_u32(code).expect("valid code point"));
        }
        out
    }

    #[test]
    fn test_allow_utf8_is_identity() {
        for name in SAMPLES {
            assert_eq!(EscapingScheme::AllowUtf8.escape(name), *name);
        }
    }

    #[test]
    fn test_underscores_examples() {
        let scheme = EscapingScheme::Underscores;
        assert_eq!(scheme.escape("http.server.duration"), "http_server_duration");
        assert_eq!(scheme.escape("a..b"), "a_b");
        assert_eq!(scheme.escape("a__b"), "a_b");
        assert_eq!(scheme.escape("üñí"), "_");
        assert_eq!(scheme.escape("café.latte"), "caf_latte");
        assert_eq!(scheme.escape("1st_metric"), "_st_metric");
        assert_eq!(scheme.escape("1_metric"), "_metric");
        assert_eq!(scheme.escape(""), "_");
        assert_eq!(scheme.escape("ns:metric"), "ns:metric");
    }

    #[test]
    fn test_underscores_is_idempotent_and_legal() {
        let scheme = EscapingScheme::Underscores;
        for name in SAMPLES {
            let once = scheme.escape(name).into_owned();
            let twice = scheme.escape(&once).into_owned();
            assert_eq!(once, twice, "not idempotent for {name:?}");
            assert!(is_legacy_metric_name(&once), "illegal output {once:?}");
        }
    }

    #[test]
    fn test_underscores_collisions() {
        let scheme = EscapingScheme::Underscores;
        assert_eq!(scheme.escape("a.b"), scheme.escape("a/b"));
    }

    #[test]
    fn test_values_examples() {
        let scheme = EscapingScheme::Values;
        assert_eq!(scheme.escape("http.server"), "U__http_2e_server");
        assert_eq!(scheme.escape("a_b"), "U__a__b");
        assert_eq!(scheme.escape("abc"), "U__abc");
        assert_eq!(scheme.escape("é"), "U___e9_");
        assert_eq!(scheme.escape("🎉"), "U___01f389_");
    }

    #[test]
    fn test_values_round_trip() {
        let scheme = EscapingScheme::Values;
        for name in SAMPLES {
            let escaped = scheme.escape(name);
            assert!(escaped.starts_with("U__"));
            assert!(is_legacy_metric_name(&escaped), "illegal output {escaped:?}");
            assert_eq!(unescape_values(&escaped), *name);
        }
    }

    #[test]
    fn test_dots_examples() {
        let scheme = EscapingScheme::Dots;
        assert_eq!(scheme.escape("http.server.duration"), "http_dot_server_dot_duration");
        assert_eq!(scheme.escape("my_metric"), "my__metric");
        assert_eq!(scheme.escape("a-b"), "a__b");
        assert_eq!(scheme.escape("1abc"), "__abc");
        assert_eq!(scheme.escape("a1"), "a1");
        assert_eq!(scheme.escape(""), "_");
    }

    #[test]
    fn test_dots_output_is_legal() {
        for name in SAMPLES {
            let escaped = EscapingScheme::Dots.escape(name);
            assert!(is_legacy_metric_name(&escaped), "illegal output {escaped:?}");
        }
    }

    #[test]
    fn test_escaping_params() {
        for scheme in [
            EscapingScheme::AllowUtf8,
            EscapingScheme::Underscores,
            EscapingScheme::Dots,
            EscapingScheme::Values,
        ] {
            assert_eq!(EscapingScheme::from_param(scheme.as_param()), Some(scheme));
        }
        assert_eq!(EscapingScheme::from_param("bogus"), None);
    }

    #[test]
    fn test_legacy_grammars() {
        assert!(is_legacy_metric_name("ns:metric_total"));
        assert!(is_legacy_metric_name("_x"));
        assert!(!is_legacy_metric_name("1x"));
        assert!(!is_legacy_metric_name("a.b"));
        assert!(!is_legacy_metric_name(""));

        assert!(is_legacy_label_name("le"));
        assert!(!is_legacy_label_name("ns:label"));
        assert!(!is_legacy_label_name("9"));
    }
}
