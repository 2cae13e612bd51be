//! # keel-compiler
//!
//! Merges an org baseline, an application spec and an environment profile
//! into one [`CompiledContextPackage`](keel_model::CompiledContextPackage).
//!
//! Precedence is strict: **environment profile > application spec > org
//! baseline**. A narrower document's explicit value always wins; where it
//! says nothing, the broader document's value is inherited.
//!
//! - [`ContextCompiler`] is the pure merge. It takes documents and returns a
//!   sealed package, touching no storage.
//! - [`CompileService`] loads the documents and active exceptions from the
//!   collaborator stores, assigns the next revision, persists the package
//!   and records an audit event.

pub mod compiler;
pub mod error;
pub mod escalation;
pub mod patterns;
pub mod service;

pub use compiler::{CompileInput, CompilerOptions, ContextCompiler, ALWAYS_APPROVE};
pub use error::CompileError;
pub use escalation::approval_checkpoints;
pub use service::CompileService;
