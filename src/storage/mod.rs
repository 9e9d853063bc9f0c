pub mod chunk_store;
pub mod storage_node;
