pub mod api;
pub mod conf;
pub mod core;
pub mod export;
pub mod loader;
pub mod preprocess;
pub mod query;
pub mod service;
pub mod session;

#[cfg(feature = "testutil")]
pub mod testutil;
