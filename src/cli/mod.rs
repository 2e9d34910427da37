//! Command implementations

pub mod history;
pub mod init;
pub mod load;
pub mod stats;
