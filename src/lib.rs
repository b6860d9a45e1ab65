pub mod api;
pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod interchange;
pub mod orchestration;
pub mod pricing;

pub use config::Config;
pub use datasource::{DataSourceError, MockPriceSource, PriceSource};
pub use db::{init_db, Repository};
pub use domain::{Coin, NewTransaction, Strategy, TimeMs, Transaction, TxKind};
pub use error::AppError;
pub use pricing::PriceAggregator;
