pub mod arena;
pub mod buffer;
pub mod cache;
pub mod release;
