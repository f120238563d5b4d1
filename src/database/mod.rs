pub mod migrations;
pub mod models;
pub mod repository;

pub use repository::CoinRepository;
