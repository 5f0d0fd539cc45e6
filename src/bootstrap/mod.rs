pub mod database;
pub mod services;

pub use database::{init_database, run_migrations};
pub use services::{init_services, Services};
