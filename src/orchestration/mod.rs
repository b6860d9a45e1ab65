//! Services that wire the repository, engines and price aggregation together.

pub mod alerts;
pub mod portfolio;

pub use alerts::{AlertEvaluator, TickOutcome};
pub use portfolio::{Ledger, PortfolioService, PortfolioSnapshot};
