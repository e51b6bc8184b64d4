//! Scanner for `${…}` expression interpolations embedded in user-authored
//! string fields.
//!
//! Brace counting is suspended inside double-quoted string literals, so
//! expressions like `${ {"k": "v}"} }` scan cleanly, while an unescaped
//! `${` inside an already-open expression is rejected as a
//! [nested expression].
//!
//! [nested expression]: crate::Error::NestedExpression

use crate::Error;

/// Extract every maximal top-level `${…}` fragment from `s`, returning the
/// inner expression text.
///
/// An unclosed `${` at the end of input is ignored rather than reported.
///
/// # Example
///
/// ```
/// use lattice_expression::scanner;
///
/// let exprs = scanner::extract("host-${schema.spec.name}-${index}").unwrap();
/// assert_eq!(exprs, vec!["schema.spec.name", "index"]);
/// ```
pub fn extract(s: &str) -> Result<Vec<String>, Error> {
    let mut found = Vec::new();
    let bytes = s.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'{') {
            let start = i + 2;
            match scan_to_close(s, start)? {
                Some(end) => {
                    found.push(s[start..end].to_string());
                    i = end + 1;
                }
                // Unclosed opener: ignore the remainder.
                None => break,
            }
        } else {
            i += 1;
        }
    }

    Ok(found)
}

/// Whether `s` consists of exactly one `${…}` expression and nothing else.
///
/// This is the only shape for which a substituted value keeps its native
/// (non-string) type.
pub fn is_standalone(s: &str) -> Result<bool, Error> {
    let found = extract(s)?;
    match found.as_slice() {
        [single] => Ok(s == format!("${{{single}}}")),
        _ => Ok(false),
    }
}

/// Scan from `start` (just past the opener) to the matching `}`, returning
/// its byte offset, or `None` when the expression never closes.
fn scan_to_close(s: &str, start: usize) -> Result<Option<usize>, Error> {
    let bytes = s.as_bytes();
    let mut depth = 1usize;
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
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                return Err(Error::NestedExpression { position: i });
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(Some(i));
                }
            }
            _ => {}
        }
        i += 1;
    }

    Ok(None)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn extracts_single_expression() {
        assert_eq!(extract("${a.b}").unwrap(), vec!["a.b"]);
    }

    #[test]
    fn extracts_interpolated_expressions_in_order() {
        assert_eq!(extract("${a}${b}").unwrap(), vec!["a", "b"]);
        assert_eq!(
            extract("pre-${x.y}-mid-${z}-post").unwrap(),
            vec!["x.y", "z"]
        );
    }

    #[test]
    fn plain_strings_extract_nothing() {
        assert!(extract("no expressions here").unwrap().is_empty());
        assert!(extract("").unwrap().is_empty());
        assert!(extract("lone dollar $ and brace }").unwrap().is_empty());
    }

    #[test]
    fn unclosed_opener_is_ignored() {
        assert!(extract("${never closes").unwrap().is_empty());
        // A preceding complete expression still comes through.
        assert_eq!(extract("${ok}${broken").unwrap(), vec!["ok"]);
    }

    #[test]
    fn braces_inside_expression_balance() {
        assert_eq!(extract("${ {'k':'v'} }").unwrap(), vec![" {'k':'v'} "]);
        assert_eq!(
            extract("${x.filter(i, {\"a\": i}.size() > 0)}").unwrap(),
            vec!["x.filter(i, {\"a\": i}.size() > 0)"]
        );
    }

    #[test]
    fn quoted_closer_does_not_close() {
        assert_eq!(extract("${\"}\"}").unwrap(), vec!["\"}\""]);
        assert_eq!(extract("${a + \"}}\"}").unwrap(), vec!["a + \"}}\""]);
    }

    #[test]
    fn escapes_inside_quoted_strings() {
        // The escaped quote keeps the string literal open across the brace.
        assert_eq!(extract("${\"\\\"}\"}").unwrap(), vec!["\"\\\"}\""]);
    }

    #[test]
    fn nested_opener_is_an_error() {
        assert!(matches!(
            extract("${outer(${inner})}"),
            Err(Error::NestedExpression { .. })
        ));
    }

    #[test]
    fn nested_opener_inside_string_is_opaque() {
        assert_eq!(
            extract("${outer(\"${inner}\")}").unwrap(),
            vec!["outer(\"${inner}\")"]
        );
    }

    #[test]
    fn standalone_detection() {
        assert!(is_standalone("${a.b}").unwrap());
        assert!(!is_standalone("x${a.b}").unwrap());
        assert!(!is_standalone("${a.b} ").unwrap());
        assert!(!is_standalone("${a}${b}").unwrap());
        assert!(!is_standalone("plain").unwrap());
    }

    #[test]
    fn standalone_implies_single_extraction() {
        for s in ["${a}", "${ a + b }", "x${a}", "${a}${b}", "noexpr"] {
            if is_standalone(s).unwrap() {
                assert_eq!(extract(s).unwrap().len(), 1);
            }
        }
    }
}
