pub mod broadcast;
pub mod catalog;
pub mod email;
pub mod jwt;
pub mod push;
pub mod stripe;
pub mod subscription;
