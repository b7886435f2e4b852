//! Filesystem backend

mod backend;

pub use backend::{DiskBackend, HEALTH_CHECK_KEY};
