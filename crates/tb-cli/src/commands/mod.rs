//! CLI subcommand implementations.

pub mod bins;
pub mod budget;
pub mod check;
pub mod exhaustivity;
pub mod fix;
mod util;
