pub mod cli;
pub mod compress;
pub mod config;
pub mod sink;
