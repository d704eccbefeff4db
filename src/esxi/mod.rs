// ESXi inventory collection over SSH
pub mod builder;
pub mod commands;
pub mod parse;
pub mod session;

// Re-export the entry points used by the command handlers
pub use builder::{BuildOptions, BuildReport, InventoryBuilder};
pub use session::SshShell;
