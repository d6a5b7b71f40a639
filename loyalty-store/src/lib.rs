pub mod app_config;
pub mod database;
pub mod order_repo;
pub mod memory;

pub use database::DbClient;
pub use order_repo::PgStore;
pub use memory::MemoryStore;
