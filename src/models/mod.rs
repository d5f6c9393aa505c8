pub mod client;
pub mod content;
pub mod enquiry;
pub mod message;
pub mod payment;
pub mod plan;
pub mod user;
pub mod user_log;
