#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_debug_implementations, missing_docs, rust_2018_idioms)]
#![deny(unreachable_pub)]

//! `lattice-schema` addresses positions inside unstructured resource
//! trees and walks `(value, schema)` pairs to find the expression-bearing
//! fields that drive a resource graph.
//!
//! It is split across the [path] engine (parse/build/read/write of
//! `a.b[0]["c.d"]`-style field paths), the recursive [schema] model with
//! its Kubernetes extension markers, the [walker] emitting
//! [FieldDescriptor]s, the [simple]-schema transformer for the compact
//! user-authored DSL, and the [emulator] producing dummy objects for
//! build-time dry runs.
//!
//! Related crates/packages:
//!
//! - [lattice-expression]
//! - [lattice-runtime]
//!
//! [lattice-expression]: <https://docs.rs/lattice-expression>
//! [lattice-runtime]: <https://docs.rs/lattice-runtime>

pub mod emulator;
pub mod error;
pub mod path;
pub mod schema;
pub mod simple;
pub mod walker;

pub use error::Error;
pub use path::{Path, Segment};
pub use schema::Schema;
pub use walker::FieldDescriptor;
