// Utility modules

pub mod api_error;
pub mod otp;
pub mod password;
pub mod time;

pub use api_error::ApiError;
pub use otp::{generate_otp, otp_digest};
pub use password::{hash_password, verify_password, PasswordError};
pub use time::{end_of_day_ms, now_epoch_ms, start_of_day_ms, tokyo, tokyo_time_of_day};
