pub mod config;
pub mod error;
pub mod settings;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::*;
pub use settings::*;
pub use traits::*;
pub use types::*;
