pub mod config;
pub mod constants;
pub mod core;
pub mod networking;

pub mod sharding;
pub mod storage;
pub mod utils;
