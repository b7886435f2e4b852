//! Redis distributed backend

mod backend;

pub use backend::RedisBackend;
