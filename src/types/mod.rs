pub mod config;
pub mod entities;
pub mod log;
pub mod shared;
