// modules
pub mod common_consts;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod market_data;
pub mod optimizer;
pub mod portfolio;
pub mod report;
pub mod sampling;
pub mod scoring;
pub mod statistics;
pub mod synthetic;

#[cfg(feature = "python")]
pub mod python;
#[cfg(feature = "yahoo")]
pub mod yahoo;

// re-exports
pub use config::SimulationConfig;
pub use error::{FrontierError, Result};
pub use market_data::{
    Asset, AssetSet, CsvPriceProvider, InMemoryPriceProvider, Lookback, PriceHistoryProvider, PriceTable,
};
pub use optimizer::{ExecutionMode, MonteCarloOptimizer, SimulationRun, run_simulation};
pub use portfolio::{Trial, efficient_frontier};
pub use report::{OptimalPortfolioReport, write_frontier_html};
pub use sampling::{SimplexSampler, WeightVector, sample_weights};
pub use scoring::{PortfolioPerformance, compute_portfolio_performance};
pub use statistics::{ReturnSeries, Statistics, compute_statistics};
pub use synthetic::{SyntheticModel, SyntheticPriceProvider};
#[cfg(feature = "yahoo")]
pub use yahoo::YahooPriceProvider;
