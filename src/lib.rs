//! Source-to-source instrumentation for Rust.
//!
//! Every function carrying the `#[method_logger]` marker gets
//! `::std::println!("Hello world!!!");` inserted as the first statement of its
//! body. Everything else in the tree is left untouched.
//!
//! [`marker`] decides which declarations are tagged and [`rewrite`] performs
//! the single rewriting pass over a `syn::File`. With the default `cli`
//! feature, `project` applies that pass to whole source trees on disk and
//! `config` reads per-project settings.

#[cfg(feature = "cli")]
pub mod config;
pub mod error;
pub mod marker;
#[cfg(feature = "cli")]
pub mod project;
pub mod rewrite;

pub use marker::{Declaration, METHOD_LOGGER, MarkerKind, MarkerRegistry};
pub use rewrite::{DIAGNOSTIC_MESSAGE, MarkerPolicy, rewrite, rewrite_source};
