pub mod error;
pub mod error_utils;
pub mod remote;
pub mod settings;
pub mod types;
pub mod version;

pub use error::*;
pub use error_utils::*;
pub use remote::*;
pub use settings::*;
pub use types::*;
