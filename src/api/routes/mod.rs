pub mod admin;
pub mod usage;
