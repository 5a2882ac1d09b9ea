pub mod error;
pub mod types;
pub mod config;
pub mod request;
pub mod math;
pub mod contracts;
pub mod vault;
pub mod adapters;
pub mod registry;
pub mod module;
pub mod ledger;

pub use error::AmmError;
pub use types::*;
pub use config::AmmConfig;
pub use request::{LiquidityRequestBuilder, SingleAssetRequestBuilder};
pub use registry::IntegrationRegistry;
pub use module::AmmModule;
pub use ledger::InMemoryChain;
