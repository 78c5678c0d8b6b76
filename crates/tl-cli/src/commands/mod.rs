//! CLI subcommand implementations.

pub mod convert;
pub mod preprocess;
pub mod util;
pub mod validate;
