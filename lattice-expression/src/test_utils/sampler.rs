//! Deterministic sampling of expression-domain values for tests.

use crate::test_utils::expression;
use proptest::{
    strategy::{Strategy, ValueTree},
    test_runner::{Config, TestRunner},
};

/// Draws concrete expression-domain values (identifiers, accessor paths,
/// interpolation fragments) from the strategies in
/// [`expression`](crate::test_utils::expression).
///
/// # Example
///
/// ```
/// use lattice_expression::test_utils::Sampler;
///
/// let mut sampler = Sampler::deterministic();
/// let id = sampler.identifier();
/// assert!(!id.is_empty());
/// assert!(sampler.interpolation(&id).starts_with("${"));
/// ```
#[derive(Debug, Default)]
pub struct Sampler {
    runner: TestRunner,
}

impl Sampler {
    /// A sampler seeded from the system random number generator.
    pub fn new() -> Self {
        Sampler {
            runner: TestRunner::new(Config::default()),
        }
    }

    /// A sampler with a fixed seed, for tests that must not flake.
    pub fn deterministic() -> Self {
        Sampler {
            runner: TestRunner::deterministic(),
        }
    }

    /// One expression identifier (`[A-Za-z_][A-Za-z0-9_]*`).
    pub fn identifier(&mut self) -> String {
        self.draw(expression::identifier())
    }

    /// `count` independently drawn identifiers.
    pub fn identifiers(&mut self, count: usize) -> Vec<String> {
        (0..count).map(|_| self.identifier()).collect()
    }

    /// A small array index of the kind that appears in accessor paths.
    pub fn array_index(&mut self) -> usize {
        self.draw(0usize..50)
    }

    /// A dotted accessor expression rooted at `root`, e.g. `cm.data.key`.
    pub fn accessor(&mut self, root: &str) -> String {
        self.draw(expression::accessor(root))
    }

    /// A standalone `${…}` interpolation of an accessor rooted at `root`.
    pub fn interpolation(&mut self, root: &str) -> String {
        expression::interpolate(&self.accessor(root))
    }

    fn draw<S: Strategy>(&mut self, strategy: S) -> S::Value {
        strategy
            .new_tree(&mut self.runner)
            .expect("strategy is not satisfiable")
            .current()
    }
}
