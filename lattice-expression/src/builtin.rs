//! Built-in function registry for the expression language.

use enum_assoc::Assoc;

const SIZE_NAME: &str = "size";
const HAS_NAME: &str = "has";
const MATCHES_NAME: &str = "matches";
const STRING_NAME: &str = "string";
const INT_NAME: &str = "int";
const DOUBLE_NAME: &str = "double";
const BOOL_NAME: &str = "bool";
const FILTER_NAME: &str = "filter";
const MAP_NAME: &str = "map";
const ALL_NAME: &str = "all";
const EXISTS_NAME: &str = "exists";
const EXISTS_ONE_NAME: &str = "exists_one";

/// Enumerated built-in functions, convertible to and from their
/// source-level names.
///
/// # Example
///
/// ```
/// use lattice_expression::Builtin;
///
/// assert_eq!(Builtin::Size.name(), "size");
/// assert_eq!(Builtin::function("matches"), Some(Builtin::Matches));
/// assert_eq!(Builtin::function("nope"), None);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Assoc)]
#[func(pub const fn name(&self) -> &'static str)]
#[func(pub fn function(s: &str) -> Option<Self>)]
pub enum Builtin {
    /// Length of a string, list, or map.
    #[assoc(name = SIZE_NAME)]
    #[assoc(function = SIZE_NAME)]
    Size,
    /// Presence test for a member path.
    #[assoc(name = HAS_NAME)]
    #[assoc(function = HAS_NAME)]
    Has,
    /// Regular-expression match on a string.
    #[assoc(name = MATCHES_NAME)]
    #[assoc(function = MATCHES_NAME)]
    Matches,
    /// Conversion to string.
    #[assoc(name = STRING_NAME)]
    #[assoc(function = STRING_NAME)]
    String,
    /// Conversion to integer.
    #[assoc(name = INT_NAME)]
    #[assoc(function = INT_NAME)]
    Int,
    /// Conversion to double.
    #[assoc(name = DOUBLE_NAME)]
    #[assoc(function = DOUBLE_NAME)]
    Double,
    /// Conversion to boolean.
    #[assoc(name = BOOL_NAME)]
    #[assoc(function = BOOL_NAME)]
    Bool,
    /// Comprehension macro: keep matching elements.
    #[assoc(name = FILTER_NAME)]
    #[assoc(function = FILTER_NAME)]
    Filter,
    /// Comprehension macro: transform each element.
    #[assoc(name = MAP_NAME)]
    #[assoc(function = MAP_NAME)]
    Map,
    /// Comprehension macro: every element matches.
    #[assoc(name = ALL_NAME)]
    #[assoc(function = ALL_NAME)]
    All,
    /// Comprehension macro: at least one element matches.
    #[assoc(name = EXISTS_NAME)]
    #[assoc(function = EXISTS_NAME)]
    Exists,
    /// Comprehension macro: exactly one element matches.
    #[assoc(name = EXISTS_ONE_NAME)]
    #[assoc(function = EXISTS_ONE_NAME)]
    ExistsOne,
}

impl Builtin {
    /// Whether `name` refers to any built-in function or macro.
    pub fn is_builtin(name: &str) -> bool {
        Builtin::function(name).is_some()
    }
}
