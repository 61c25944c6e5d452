pub mod config;
pub mod error;
pub mod fields;
pub mod types;

pub use config::Config;
pub use error::DevSignalError;
pub use fields::*;
pub use types::*;
