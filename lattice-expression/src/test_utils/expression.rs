//! Generators and fixtures for expression-related tests.

use proptest::strategy::Strategy;

/// Strategy producing valid expression identifiers
/// (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn identifier() -> impl Strategy<Value = String> {
    "[a-zA-Z_][a-zA-Z0-9_]{0,12}"
}

/// Strategy producing dotted accessor expressions rooted at the given
/// identifier, e.g. `cm.data.key0`.
pub fn accessor(root: &str) -> impl Strategy<Value = String> {
    let root = root.to_string();
    proptest::collection::vec(identifier(), 1..4)
        .prop_map(move |fields| format!("{}.{}", root, fields.join(".")))
}

/// Wrap an expression body in interpolation delimiters.
pub fn interpolate(body: &str) -> String {
    format!("${{{body}}}")
}
