//! Command implementations for the sitemapper CLI
//!
//! Each command lives in its own submodule.

mod generate;
mod robots;
mod serve;
mod update;

pub use generate::execute as generate;
pub use robots::execute as robots;
pub use serve::execute as serve;
pub use update::execute as update;
