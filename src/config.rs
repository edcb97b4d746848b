use crate::common_consts::{
    DEFAULT_ASSETS, DEFAULT_CHUNK_SIZE, DEFAULT_LOOKBACK, DEFAULT_RISK_FREE_RATE,
    DEFAULT_TRADING_DAYS_PER_YEAR, DEFAULT_TRIAL_COUNT, DEFAULT_WEIGHT_DECIMALS,
};
use crate::error::{FrontierError, Result};
use crate::market_data::{Asset, AssetSet, Lookback};
use crate::optimizer::{ExecutionMode, MonteCarloOptimizer};
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

static RAYON_INIT: OnceLock<()> = OnceLock::new();

/// Everything a run needs that is not market data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub assets: Vec<Asset>,
    /// e.g. "1y", "5y", "6mo", "max"
    pub lookback: String,
    pub trial_count: usize,
    pub risk_free_rate: f64,
    pub trading_days_per_year: f64,
    pub seed: Option<u64>,
    pub parallel: bool,
    pub chunk_size: usize,
    /// Rayon worker threads; 0 uses every logical core.
    pub threads: usize,
    pub weight_decimals: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            assets: DEFAULT_ASSETS
                .iter()
                .map(|(label, ticker)| Asset::new(*label, *ticker))
                .collect(),
            lookback: DEFAULT_LOOKBACK.to_string(),
            trial_count: DEFAULT_TRIAL_COUNT,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            trading_days_per_year: DEFAULT_TRADING_DAYS_PER_YEAR,
            seed: None,
            parallel: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            threads: 0,
            weight_decimals: DEFAULT_WEIGHT_DECIMALS,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| FrontierError::invalid_config(format!("{name}={raw} is not valid")))
}

/// `"Toyota=7203.T,Sony=6758.T"`; a bare entry uses the ticker as its label.
pub fn parse_asset_list(raw: &str) -> Result<Vec<Asset>> {
    let assets: Vec<Asset> = raw
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((label, ticker)) => Asset::new(label.trim(), ticker.trim()),
            None => Asset::new(entry, entry),
        })
        .collect();
    if assets.iter().any(|a| a.label.is_empty() || a.ticker.is_empty()) {
        return Err(FrontierError::invalid_config(format!("malformed asset list '{raw}'")));
    }
    Ok(assets)
}

impl SimulationConfig {
    /// Defaults, then the optional JSON file, then `FRONTIER_*` variables
    /// (a `.env` file is honoured).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        dotenvy::dotenv().ok();
        config.apply_vars(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: SimulationConfig = serde_json::from_str(&raw)
            .map_err(|e| FrontierError::invalid_config(format!("{}: {}", path.display(), e)))?;
        debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = lookup("FRONTIER_ASSETS") {
            self.assets = parse_asset_list(&raw)?;
        }
        if let Some(raw) = lookup("FRONTIER_LOOKBACK") {
            self.lookback = raw.trim().to_string();
        }
        if let Some(raw) = lookup("FRONTIER_TRIALS") {
            self.trial_count = parse_var("FRONTIER_TRIALS", &raw)?;
        }
        if let Some(raw) = lookup("FRONTIER_RISK_FREE_RATE") {
            self.risk_free_rate = parse_var("FRONTIER_RISK_FREE_RATE", &raw)?;
        }
        if let Some(raw) = lookup("FRONTIER_TRADING_DAYS") {
            self.trading_days_per_year = parse_var("FRONTIER_TRADING_DAYS", &raw)?;
        }
        if let Some(raw) = lookup("FRONTIER_SEED") {
            self.seed = Some(parse_var("FRONTIER_SEED", &raw)?);
        }
        if let Some(raw) = lookup("FRONTIER_PARALLEL") {
            self.parallel = parse_var("FRONTIER_PARALLEL", &raw)?;
        }
        if let Some(raw) = lookup("FRONTIER_CHUNK_SIZE") {
            self.chunk_size = parse_var("FRONTIER_CHUNK_SIZE", &raw)?;
        }
        if let Some(raw) = lookup("FRONTIER_THREADS") {
            self.threads = parse_var("FRONTIER_THREADS", &raw)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.asset_set()
            .map_err(|e| FrontierError::invalid_config(e.to_string()))?;
        self.lookback()
            .map_err(|e| FrontierError::invalid_config(e.to_string()))?;
        if !(self.trading_days_per_year > 0.0) || !self.trading_days_per_year.is_finite() {
            return Err(FrontierError::invalid_config(format!(
                "trading_days_per_year must be positive, got {}",
                self.trading_days_per_year
            )));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(FrontierError::invalid_config("risk_free_rate must be finite"));
        }
        if self.chunk_size == 0 {
            return Err(FrontierError::invalid_config("chunk_size must be positive"));
        }
        Ok(())
    }

    pub fn asset_set(&self) -> Result<AssetSet> {
        AssetSet::new(self.assets.clone())
    }

    pub fn lookback(&self) -> Result<Lookback> {
        self.lookback.parse()
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        if self.parallel {
            ExecutionMode::Parallel {
                chunk_size: self.chunk_size,
            }
        } else {
            ExecutionMode::Sequential
        }
    }

    pub fn optimizer(&self) -> MonteCarloOptimizer {
        MonteCarloOptimizer::new(self.trial_count, self.risk_free_rate)
            .with_seed(self.seed)
            .with_mode(self.execution_mode())
    }
}

/// Sizes the global rayon pool once per process.
pub fn init_cpu_parallelism(threads: usize) {
    RAYON_INIT.get_or_init(|| {
        match ThreadPoolBuilder::new().num_threads(threads).build_global() {
            Ok(_) => info!(
                "Initialized Rayon thread pool with {} threads",
                rayon::current_num_threads()
            ),
            Err(e) => warn!(
                "Rayon thread pool already initialized or unavailable ({}). Using existing configuration.",
                e
            ),
        }
    });
}
