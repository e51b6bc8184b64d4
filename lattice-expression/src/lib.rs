#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_debug_implementations, missing_docs, rust_2018_idioms)]
#![deny(unreachable_pub)]

//! `lattice-expression` is the expression layer underneath all lattice
//! packages: scanning `${…}` interpolations out of user-authored fields,
//! compiling the embedded expressions into evaluable [Program]s, and
//! inspecting compiled expressions for the resource references that drive
//! dependency analysis.
//!
//! Related crates/packages:
//!
//! - [lattice-schema]
//! - [lattice-runtime]
//!
//! [lattice-schema]: <https://docs.rs/lattice-schema>
//! [lattice-runtime]: <https://docs.rs/lattice-runtime>

pub mod ast;
mod builtin;
pub mod error;
mod eval;
pub mod inspector;
mod lexer;
mod parser;
pub mod scanner;
#[cfg(feature = "test-utils")]
#[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
pub mod test_utils;

mod env;

pub use builtin::Builtin;
pub use env::{Env, Program};
pub use error::{Error, EvalError};
pub use inspector::{Inspection, Inspector};
