pub mod config;
pub mod correlation;
pub mod error;
pub mod item;

pub use config::Config;
pub use correlation::*;
pub use error::*;
pub use item::*;
