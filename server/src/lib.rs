// server/src/lib.rs

pub mod api;
pub mod cli;
pub mod config;
