/// Path normalization for user-supplied arguments
pub mod path;
/// Retry helper for single side effects
pub mod retry;

pub use path::normalize_user_input_path;
pub use retry::with_retry;
