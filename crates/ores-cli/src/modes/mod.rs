//! Runtime execution modes.
//!
//! - `interactive`: line-driven session over stdin/stdout

pub mod interactive;
