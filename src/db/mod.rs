// Database module - connection pooling and health checks

pub mod diesel_pool;

pub use diesel_pool::{check_health, create_pool, mask_connection_string, DieselPool};
