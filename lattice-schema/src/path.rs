//! Field paths addressing positions inside unstructured resource trees,
//! e.g. `spec.containers[0].env[2].name` or `metadata.labels["app.kubernetes.io/name"]`.
//!
//! Paths are sequences of [Segment]s. Named segments join with `.`; index
//! segments render as `[n]`; a name containing `.` (or the empty name)
//! renders in quoted form so [parse] stays the inverse of [build].
//!
//! [parse]: Path::parse
//! [build]: Path::build

use crate::Error;
use enum_as_inner::EnumAsInner;
use std::fmt;

mod access;

pub use access::{get_value, upsert_value};

/// A single step of a [Path]: either a named field or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumAsInner)]
pub enum Segment {
    /// A named field of a map.
    Field(String),
    /// A zero-based array index.
    Index(usize),
}

impl Segment {
    /// Named-field constructor.
    pub fn field(name: impl Into<String>) -> Self {
        Segment::Field(name.into())
    }

    /// Whether this named segment requires the quoted `["…"]` rendering.
    fn needs_quoting(&self) -> bool {
        match self {
            Segment::Field(name) => name.is_empty() || name.contains('.'),
            Segment::Index(_) => false,
        }
    }
}

/// An ordered sequence of [Segment]s with a canonical textual form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path(Vec<Segment>);

impl Path {
    /// Create a [Path] from segments.
    pub fn new(segments: Vec<Segment>) -> Self {
        Path(segments)
    }

    /// Parse the textual form back into segments.
    ///
    /// # Example
    ///
    /// ```
    /// use lattice_schema::{Path, Segment};
    ///
    /// let path = Path::parse("spec.containers[0].name").unwrap();
    /// assert_eq!(
    ///     path.segments(),
    ///     &[
    ///         Segment::field("spec"),
    ///         Segment::field("containers"),
    ///         Segment::Index(0),
    ///         Segment::field("name"),
    ///     ]
    /// );
    /// ```
    pub fn parse(s: &str) -> Result<Self, Error> {
        let bytes = s.as_bytes();
        let mut segments = Vec::new();
        let mut i = 0;

        while i < bytes.len() {
            match bytes[i] {
                b'[' => {
                    let (segment, next) = parse_bracketed(s, i)?;
                    segments.push(segment);
                    i = next;
                }
                b'.' => {
                    return Err(Error::PathParse {
                        position: i,
                        message: "empty field name".to_string(),
                    });
                }
                _ => {
                    let start = i;
                    while i < bytes.len() && bytes[i] != b'.' && bytes[i] != b'[' {
                        if bytes[i] == b']' || bytes[i] == b'"' {
                            return Err(Error::PathParse {
                                position: i,
                                message: format!(
                                    "unexpected `{}` in field name",
                                    bytes[i] as char
                                ),
                            });
                        }
                        i += 1;
                    }
                    segments.push(Segment::Field(s[start..i].to_string()));
                }
            }

            // After a segment: end, a `.` before a plain field, or `[`.
            if i < bytes.len() {
                match bytes[i] {
                    b'.' => {
                        i += 1;
                        if i >= bytes.len() {
                            return Err(Error::PathParse {
                                position: i,
                                message: "trailing `.`".to_string(),
                            });
                        }
                        if bytes[i] == b'[' {
                            return Err(Error::PathParse {
                                position: i,
                                message: "`[` must attach directly, without `.`".to_string(),
                            });
                        }
                    }
                    b'[' => {}
                    other => {
                        return Err(Error::PathParse {
                            position: i,
                            message: format!("expected `.` or `[`, found `{}`", other as char),
                        });
                    }
                }
            }
        }

        Ok(Path(segments))
    }

    /// Render the canonical textual form.
    pub fn build(&self) -> String {
        let mut out = String::new();
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Field(name) => {
                    if segment.needs_quoting() {
                        out.push_str(&format!("[\"{name}\"]"));
                    } else {
                        if i > 0 {
                            out.push('.');
                        }
                        out.push_str(name);
                    }
                }
                Segment::Index(index) => {
                    out.push_str(&format!("[{index}]"));
                }
            }
        }
        out
    }

    /// The segments, in order.
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the path has no segments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a segment, returning the extended path.
    pub fn join(mut self, segment: Segment) -> Self {
        self.0.push(segment);
        self
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.build())
    }
}

impl From<Vec<Segment>> for Path {
    fn from(segments: Vec<Segment>) -> Self {
        Path(segments)
    }
}

/// Join a parent path string with a child field name, quoting the child
/// when its name contains `.` or is empty.
///
/// This is the canonical constructor the schema walker uses while
/// descending.
///
/// # Example
///
/// ```
/// use lattice_schema::path::join_field_name;
///
/// assert_eq!(join_field_name("spec", "replicas"), "spec.replicas");
/// assert_eq!(join_field_name("spec", "my.field"), "spec[\"my.field\"]");
/// assert_eq!(join_field_name("", "spec"), "spec");
/// ```
pub fn join_field_name(parent: &str, name: &str) -> String {
    if name.is_empty() || name.contains('.') {
        format!("{parent}[\"{name}\"]")
    } else if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    }
}

/// Parse one `[…]` group starting at `open`, returning the segment and the
/// offset just past the closing `]`.
fn parse_bracketed(s: &str, open: usize) -> Result<(Segment, usize), Error> {
    let bytes = s.as_bytes();
    let mut i = open + 1;

    if i < bytes.len() && bytes[i] == b'"' {
        i += 1;
        let start = i;
        // No escape processing inside quoted names.
        while i < bytes.len() && bytes[i] != b'"' {
            i += 1;
        }
        if i >= bytes.len() {
            return Err(Error::PathParse {
                position: open,
                message: "unterminated quoted field name".to_string(),
            });
        }
        let name = s[start..i].to_string();
        i += 1;
        if i >= bytes.len() || bytes[i] != b']' {
            return Err(Error::PathParse {
                position: i.min(bytes.len()),
                message: "expected `]` after quoted field name".to_string(),
            });
        }
        return Ok((Segment::Field(name), i + 1));
    }

    let start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if start == i {
        return Err(Error::PathParse {
            position: start.min(bytes.len()),
            message: "expected array index or quoted field name".to_string(),
        });
    }
    if i >= bytes.len() || bytes[i] != b']' {
        return Err(Error::PathParse {
            position: i.min(bytes.len()),
            message: "unterminated index".to_string(),
        });
    }
    let index = s[start..i].parse::<usize>().map_err(|e| Error::PathParse {
        position: start,
        message: format!("invalid index: {e}"),
    })?;
    Ok((Segment::Index(index), i + 1))
}

#[cfg(test)]
mod test {
    use super::*;
    use lattice_expression::test_utils::Sampler;

    #[test]
    fn builds_and_parses_mixed_path() {
        let segments = vec![
            Segment::field("spec"),
            Segment::field("containers"),
            Segment::Index(0),
            Segment::field("env"),
            Segment::Index(2),
            Segment::field("name"),
        ];
        let path = Path::new(segments.clone());
        assert_eq!(path.build(), "spec.containers[0].env[2].name");
        assert_eq!(Path::parse(&path.build()).unwrap(), path);
        assert_eq!(Path::parse(&path.build()).unwrap().segments(), &segments[..]);
    }

    #[test]
    fn quotes_dotted_and_empty_names() {
        let path = Path::new(vec![Segment::field("spec"), Segment::field("my.field")]);
        assert_eq!(path.build(), "spec[\"my.field\"]");
        assert_eq!(Path::parse("spec[\"my.field\"]").unwrap(), path);

        let path = Path::new(vec![Segment::field("a"), Segment::field("")]);
        assert_eq!(path.build(), "a[\"\"]");
        assert_eq!(Path::parse(&path.build()).unwrap(), path);
    }

    #[test]
    fn join_field_name_matches_build() {
        assert_eq!(join_field_name("spec", "my.field"), "spec[\"my.field\"]");
        assert_eq!(join_field_name("", "name"), "name");
        assert_eq!(join_field_name("a.b", "c"), "a.b.c");
        assert_eq!(
            Path::parse(&join_field_name("spec", "my.field"))
                .unwrap()
                .segments(),
            &[Segment::field("spec"), Segment::field("my.field")]
        );
    }

    #[test]
    fn empty_string_is_the_empty_path() {
        let path = Path::parse("").unwrap();
        assert!(path.is_empty());
        assert_eq!(path.build(), "");
    }

    #[test]
    fn parse_rejects_malformed_paths() {
        for bad in [
            "a..b", "a.", ".a", "a.[0]", "a[", "a[]", "a[\"x]", "a[1x]", "a]b", "a\"b",
            "a[0]x",
        ] {
            assert!(
                matches!(Path::parse(bad), Err(Error::PathParse { .. })),
                "`{bad}` should not parse"
            );
        }
    }

    #[test]
    fn parse_reports_positions() {
        let Err(Error::PathParse { position, .. }) = Path::parse("ab..c") else {
            panic!("expected parse error");
        };
        assert_eq!(position, 3);
    }

    #[test]
    fn leading_index_round_trips() {
        let path = Path::new(vec![Segment::Index(3), Segment::field("x")]);
        assert_eq!(path.build(), "[3].x");
        assert_eq!(Path::parse("[3].x").unwrap(), path);
    }

    #[test]
    fn roundtrip_on_random_sane_segments() {
        let mut sampler = Sampler::deterministic();
        for _ in 0..64 {
            let segments = (0..5)
                .map(|_| {
                    // Roughly one index segment for every two field
                    // segments, so every adjacency shows up across runs.
                    if sampler.array_index() % 3 == 0 {
                        Segment::Index(sampler.array_index())
                    } else {
                        Segment::Field(sampler.identifier())
                    }
                })
                .collect::<Vec<_>>();
            let path = Path::new(segments);
            let reparsed = Path::parse(&path.build()).unwrap();
            assert_eq!(reparsed, path, "round-trip failed for `{}`", path.build());
        }
    }
}
