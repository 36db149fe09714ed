//! One handler module per file. The directory scanner skips this file.

pub mod echo;
pub mod help;
