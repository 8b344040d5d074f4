//! Library half of the `statim` command-line driver: the
//! lex -> parse -> check -> lower -> codegen pipeline that `main` wires a
//! `clap` front end onto. Kept separate from `main.rs` so the pipeline can
//! be exercised directly from integration tests without spawning the
//! binary.

pub mod pipeline;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
