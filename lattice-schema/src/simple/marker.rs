//! Marker parsing for simple-schema type strings.
//!
//! Markers trail the type, `|`-separated, as whitespace-delimited
//! `key=value` pairs. Values may be bare tokens, quoted strings with
//! `\`-escapes, or JSON objects/arrays with balanced brackets.

use enum_as_inner::EnumAsInner;

/// One parsed `key=value` marker.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Marker {
    pub(crate) key: String,
    pub(crate) value: MarkerValue,
}

/// A marker value, tracking whether it was quoted in source; quoting is
/// what distinguishes the string default `"3"` from the integer `3`.
#[derive(Debug, Clone, PartialEq, EnumAsInner)]
pub(crate) enum MarkerValue {
    /// A `"…"`-delimited value with escapes already processed.
    Quoted(String),
    /// Everything else, verbatim: scalars, JSON objects, JSON arrays.
    Raw(String),
}

impl MarkerValue {
    /// The value text regardless of quoting.
    pub(crate) fn text(&self) -> &str {
        match self {
            MarkerValue::Quoted(s) | MarkerValue::Raw(s) => s,
        }
    }
}

/// Parse a marker string into its `key=value` pairs. Returns a plain
/// reason on failure; the caller attaches the field name.
pub(crate) fn parse_markers(input: &str) -> Result<Vec<Marker>, String> {
    let bytes = input.as_bytes();
    let mut markers = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }

        let key_start = i;
        while i < bytes.len() && bytes[i] != b'=' && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'=' {
            return Err(format!(
                "marker `{}` is missing `=value`",
                &input[key_start..i]
            ));
        }
        let key = input[key_start..i].to_string();
        if key.is_empty() {
            return Err("marker with empty key".to_string());
        }
        i += 1;

        let (value, next) = parse_value(input, i)?;
        markers.push(Marker { key, value });
        i = next;
    }

    Ok(markers)
}

fn parse_value(input: &str, start: usize) -> Result<(MarkerValue, usize), String> {
    let bytes = input.as_bytes();
    match bytes.get(start) {
        Some(b'"') => parse_quoted(input, start),
        Some(b'{') | Some(b'[') => parse_balanced(input, start),
        Some(_) => {
            let mut i = start;
            while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            Ok((MarkerValue::Raw(input[start..i].to_string()), i))
        }
        None => Err("marker is missing a value".to_string()),
    }
}

fn parse_quoted(input: &str, start: usize) -> Result<(MarkerValue, usize), String> {
    let bytes = input.as_bytes();
    let mut out = String::new();
    let mut i = start + 1;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => return Ok((MarkerValue::Quoted(out), i + 1)),
            b'\\' => {
                let Some(&esc) = bytes.get(i + 1) else {
                    break;
                };
                match esc {
                    b'"' => out.push('"'),
                    b'\\' => out.push('\\'),
                    other => return Err(format!("unknown escape `\\{}`", other as char)),
                }
                i += 2;
            }
            _ => {
                let ch_len = input[i..].chars().next().map(char::len_utf8).unwrap_or(1);
                out.push_str(&input[i..i + ch_len]);
                i += ch_len;
            }
        }
    }

    Err("unterminated quoted marker value".to_string())
}

/// Scan a JSON-shaped value, counting braces and brackets while skipping
/// over embedded string literals.
fn parse_balanced(input: &str, start: usize) -> Result<(MarkerValue, usize), String> {
    let bytes = input.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut i = start;

    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((MarkerValue::Raw(input[start..i + 1].to_string()), i + 1));
                }
            }
            _ => {}
        }
        i += 1;
    }

    Err("unbalanced JSON marker value".to_string())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_bare_markers() {
        let markers = parse_markers("required=true default=3").unwrap();
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].key, "required");
        assert_eq!(markers[0].value, MarkerValue::Raw("true".to_string()));
        assert_eq!(markers[1].value, MarkerValue::Raw("3".to_string()));
    }

    #[test]
    fn parses_quoted_values_with_escapes() {
        let markers = parse_markers(r#"description="a \"quoted\" value with spaces""#).unwrap();
        assert_eq!(
            markers[0].value,
            MarkerValue::Quoted("a \"quoted\" value with spaces".to_string())
        );
    }

    #[test]
    fn parses_json_shaped_defaults() {
        let markers =
            parse_markers(r#"default={"a": "b}", "nested": {"x": [1, 2]}} required=false"#)
                .unwrap();
        assert_eq!(
            markers[0].value.text(),
            r#"{"a": "b}", "nested": {"x": [1, 2]}}"#
        );
        assert_eq!(markers[1].key, "required");
    }

    #[test]
    fn rejects_malformed_markers() {
        assert!(parse_markers("keywithoutvalue").is_err());
        assert!(parse_markers(r#"description="open"#).is_err());
        assert!(parse_markers(r#"default={"open": 1"#).is_err());
    }

    #[test]
    fn empty_input_yields_no_markers() {
        assert!(parse_markers("").unwrap().is_empty());
        assert!(parse_markers("   ").unwrap().is_empty());
    }
}
