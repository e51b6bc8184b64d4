#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_debug_implementations, missing_docs, rust_2018_idioms)]
#![deny(unreachable_pub)]

//! `lattice-runtime` turns a declarative [ResourceGraphDefinition] into a
//! validated, dependency-ordered [Graph], then incrementally resolves the
//! graph against a live cluster view: as the caller reports observed
//! resources, the [Runtime] evaluates the expressions that became
//! evaluable, substitutes values into downstream templates, decides
//! readiness and conditional inclusion, and aggregates status back onto
//! the instance object.
//!
//! The crate performs no cluster I/O of its own. An outer reconciler owns
//! the loop: traverse [Graph::topological_order], apply what
//! [Runtime::get_resource] hands out, report back with
//! [Runtime::set_resource], and call [Runtime::synchronize] until it
//! reaches a fixed point.
//!
//! Related crates/packages:
//!
//! - [lattice-expression]
//! - [lattice-schema]
//!
//! [lattice-expression]: <https://docs.rs/lattice-expression>
//! [lattice-schema]: <https://docs.rs/lattice-schema>

pub mod builder;
pub mod dag;
pub mod definition;
pub mod error;
pub mod graph;
pub mod resource;
pub mod runtime;

pub use builder::{GraphBuilder, ResolvedSchema, SchemaResolver};
pub use dag::Dag;
pub use definition::{GroupVersionKind, ResourceGraphDefinition};
pub use error::{BuildError, RuntimeError};
pub use graph::Graph;
pub use resource::{Resource, ResourceVariable, VariableKind};
pub use runtime::{ResourceState, Runtime};

/// The reserved variable identifier bound to the instance spec in every
/// expression.
pub const SCHEMA_VARIABLE: &str = "schema";

/// The reserved resource id of the instance itself.
pub const INSTANCE_ID: &str = "instance";
