pub mod channel;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod info;
pub mod state;
