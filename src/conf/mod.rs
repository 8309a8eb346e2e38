mod config;
mod query;
mod server;
mod storage;

pub use config::Config;
pub use query::QueryConfig;
pub use server::ServerConfig;
pub use storage::StorageConfig;
