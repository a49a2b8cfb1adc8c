pub mod config;
pub mod council;
pub mod events;
pub mod seed;
