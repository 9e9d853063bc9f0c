pub mod chunk_id;
pub mod client;
pub mod coordinator;
pub mod placement;
