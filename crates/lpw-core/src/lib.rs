pub mod analysis;
pub mod cap_table;
pub mod error;
pub mod types;
pub mod waterfall;

pub use error::WaterfallError;
pub use types::*;

/// Standard result type for all waterfall operations
pub type WaterfallResult<T> = Result<T, WaterfallError>;
