use anyhow::Context;
use clap::{Parser, ValueEnum};
use sharpe_frontier::config::{SimulationConfig, init_cpu_parallelism, parse_asset_list};
use sharpe_frontier::export::{write_returns_csv, write_trials_csv};
use sharpe_frontier::logging::init_logging;
use sharpe_frontier::market_data::{CsvPriceProvider, PriceHistoryProvider};
use sharpe_frontier::report::{OptimalPortfolioReport, write_frontier_html};
use sharpe_frontier::statistics::{ReturnSeries, Statistics};
use sharpe_frontier::synthetic::{SyntheticModel, SyntheticPriceProvider};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProviderChoice {
    Csv,
    Synthetic,
    Yahoo,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Monte Carlo max-Sharpe portfolio search", long_about = None)]
struct Args {
    /// JSON configuration file; CLI flags take precedence over it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Comma-separated assets, `label=ticker` or `ticker`
    #[arg(long)]
    assets: Option<String>,

    /// History window: <n>d, <n>mo, <n>y or max
    #[arg(long)]
    lookback: Option<String>,

    #[arg(long)]
    trials: Option<usize>,

    /// Annual risk-free rate as a fraction (0.01 = 1%)
    #[arg(long)]
    risk_free_rate: Option<f64>,

    #[arg(long)]
    trading_days: Option<f64>,

    #[arg(long)]
    seed: Option<u64>,

    /// Where prices come from
    #[arg(long, value_enum, default_value_t = ProviderChoice::Csv)]
    provider: ProviderChoice,

    /// Price CSV for the csv provider
    #[arg(long, default_value = "prices.csv")]
    prices: PathBuf,

    /// Factors for the synthetic provider
    #[arg(long, default_value_t = 3)]
    synthetic_factors: usize,

    /// Trading days generated by the synthetic provider
    #[arg(long, default_value_t = 1260)]
    synthetic_periods: usize,

    /// Force single-threaded sampling
    #[arg(long)]
    sequential: bool,

    /// Sample in parallel chunks
    #[arg(long, conflicts_with = "sequential")]
    parallel: bool,

    #[arg(long)]
    threads: Option<usize>,

    /// Write daily log returns here
    #[arg(long)]
    export_returns: Option<PathBuf>,

    /// Write every trial here
    #[arg(long)]
    export_trials: Option<PathBuf>,

    #[arg(long, default_value = "plots/efficient_frontier.html")]
    plot: PathBuf,

    #[arg(long)]
    no_plot: bool,

    /// bincode snapshot of the full run
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn apply(&self, config: &mut SimulationConfig) -> anyhow::Result<()> {
        if let Some(assets) = &self.assets {
            config.assets = parse_asset_list(assets)?;
        }
        if let Some(lookback) = &self.lookback {
            config.lookback = lookback.clone();
        }
        if let Some(trials) = self.trials {
            config.trial_count = trials;
        }
        if let Some(rf) = self.risk_free_rate {
            config.risk_free_rate = rf;
        }
        if let Some(days) = self.trading_days {
            config.trading_days_per_year = days;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if self.parallel {
            config.parallel = true;
        }
        if self.sequential {
            config.parallel = false;
        }
        config.validate()?;
        Ok(())
    }

    fn provider(&self, config: &SimulationConfig) -> anyhow::Result<Box<dyn PriceHistoryProvider>> {
        let provider: Box<dyn PriceHistoryProvider> = match self.provider {
            ProviderChoice::Csv => Box::new(CsvPriceProvider::new(&self.prices)),
            ProviderChoice::Synthetic => Box::new(SyntheticPriceProvider::new(
                SyntheticModel::FactorModel {
                    number_of_factors: self.synthetic_factors,
                },
                self.synthetic_periods,
                config.seed,
            )),
            #[cfg(feature = "yahoo")]
            ProviderChoice::Yahoo => Box::new(sharpe_frontier::yahoo::YahooPriceProvider::new()?),
            #[cfg(not(feature = "yahoo"))]
            ProviderChoice::Yahoo => {
                anyhow::bail!("--provider yahoo needs a binary built with `--features yahoo`")
            }
        };
        Ok(provider)
    }
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    let mut config = SimulationConfig::load(args.config.as_deref()).context("loading configuration")?;
    args.apply(&mut config)?;
    if config.parallel {
        init_cpu_parallelism(config.threads);
    }

    let assets = config.asset_set()?;
    let lookback = config.lookback()?;
    let provider = args.provider(&config)?;
    info!(
        "fetching {} assets from {} (lookback {})",
        assets.len(),
        provider.name(),
        lookback
    );
    let prices = provider
        .fetch(&assets, &lookback)
        .with_context(|| format!("fetching prices from {}", provider.name()))?;

    let returns = ReturnSeries::from_asset_prices(&prices, &assets)?;
    if let Some(path) = &args.export_returns {
        write_returns_csv(&returns, &assets, path)?;
    }
    for (asset, summary) in assets.iter().zip(returns.describe()) {
        info!(
            "{}: n={} mean={:.6} std={:.6} min={:.6} max={:.6}",
            asset.label, summary.count, summary.mean, summary.std, summary.min, summary.max
        );
    }

    let statistics = Statistics::from_returns(&returns, config.trading_days_per_year)?;
    for (asset, (mean, volatility)) in assets
        .iter()
        .zip(statistics.mean().iter().zip(statistics.annualized_volatility()))
    {
        info!(
            "{}: annualized return {:.2}% volatility {:.2}%",
            asset.label,
            mean * 100.0,
            volatility * 100.0
        );
    }
    let run = config.optimizer().run(&statistics)?;

    let report = OptimalPortfolioReport::from_run(&run, &assets, config.weight_decimals)?;
    if args.json {
        println!("{}", report.to_json()?);
    } else {
        println!("{report}");
    }

    if let Some(path) = &args.export_trials {
        write_trials_csv(&run, &assets, path)?;
    }
    if !args.no_plot {
        if let Err(e) = write_frontier_html(&run, &args.plot) {
            warn!("could not write plot to {}: {}", args.plot.display(), e);
        }
    }
    if let Some(path) = &args.snapshot {
        run.save(path)?;
        info!("saved run snapshot (seed {}) to {}", run.seed(), path.display());
    }
    Ok(())
}
