pub mod client;
pub mod models;

pub use client::{redact_access_token, LajiClient};
