pub mod client;
pub mod config;
pub mod constants;
pub mod desktop;
pub mod error;
pub mod machinery;
pub mod resources;
pub mod session;
pub mod settings;
pub mod terminal;
pub mod utils;

pub use error::{Error, Result, TransportError};
