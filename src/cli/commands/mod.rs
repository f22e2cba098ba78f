pub mod check;
pub mod config;
pub mod init;
pub mod limits;
pub mod metrics;
pub mod rank;
pub mod record;
pub mod usage;
