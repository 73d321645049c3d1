//! CLI subcommand implementations.

pub mod baby;
pub mod check;
pub mod feed;
pub mod push;
pub mod settings;
pub mod util;
pub mod watch;
