pub mod calib;
pub mod config;
pub mod error;
pub mod input;
