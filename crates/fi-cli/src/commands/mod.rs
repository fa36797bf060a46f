//! CLI subcommand implementations.

pub mod export;
pub mod prune;
pub mod sessions;
pub mod status;
pub mod summary;
pub mod top;
pub mod track;
pub mod util;
