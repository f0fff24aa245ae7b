pub mod caching;

pub use caching::Cache;
