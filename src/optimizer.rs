use crate::common_consts::DEFAULT_CHUNK_SIZE;
use crate::error::{FrontierError, Result};
use crate::portfolio::{Trial, efficient_frontier};
use crate::sampling::SimplexSampler;
use crate::scoring::compute_portfolio_performance;
use crate::statistics::Statistics;
use bincode::{Decode, Encode};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Instant;
use tracing::{info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// One RNG stream, trials in generation order.
    Sequential,
    /// Fixed-size chunks, chunk `k` drawing from stream `k` of the run seed.
    /// Output does not depend on the number of threads.
    Parallel { chunk_size: usize },
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::Parallel {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonteCarloOptimizer {
    trial_count: usize,
    risk_free_rate: f64,
    seed: Option<u64>,
    mode: ExecutionMode,
}

impl MonteCarloOptimizer {
    pub fn new(trial_count: usize, risk_free_rate: f64) -> Self {
        MonteCarloOptimizer {
            trial_count,
            risk_free_rate,
            seed: None,
            mode: ExecutionMode::Sequential,
        }
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Samples and scores `trial_count` allocations. Any scoring error aborts
    /// the whole run; there is no partial result.
    pub fn run(&self, statistics: &Statistics) -> Result<SimulationRun> {
        if !self.risk_free_rate.is_finite() {
            return Err(FrontierError::invalid_parameter("risk-free rate must be finite"));
        }
        let assets = statistics.asset_count();
        let started = Instant::now();

        let (seed, trials) = match self.mode {
            ExecutionMode::Sequential => self.run_sequential(statistics)?,
            ExecutionMode::Parallel { chunk_size } => self.run_parallel(statistics, chunk_size)?,
        };

        let run = SimulationRun {
            seed,
            risk_free_rate: self.risk_free_rate,
            asset_count: assets,
            trials,
        };

        let undefined = run.undefined_sharpe_count();
        if undefined > 0 {
            warn!("{} trials have zero volatility and no Sharpe ratio", undefined);
        }
        info!(
            "simulated {} portfolios over {} assets in {:.2?} (seed {}, {:?})",
            run.len(),
            assets,
            started.elapsed(),
            seed,
            self.mode
        );
        Ok(run)
    }

    fn run_sequential(&self, statistics: &Statistics) -> Result<(u64, Vec<Trial>)> {
        let mut sampler = SimplexSampler::new(statistics.asset_count(), self.seed)?;
        let mut trials = Vec::with_capacity(self.trial_count);
        for id in 0..self.trial_count {
            let weights = sampler.sample();
            let performance = compute_portfolio_performance(&weights, statistics, self.risk_free_rate)?;
            trials.push(Trial::new(id, weights, performance));
        }
        Ok((sampler.seed(), trials))
    }

    fn run_parallel(&self, statistics: &Statistics, chunk_size: usize) -> Result<(u64, Vec<Trial>)> {
        if chunk_size == 0 {
            return Err(FrontierError::invalid_parameter("chunk size must be positive"));
        }
        let seed = self.seed.unwrap_or_else(rand::random::<u64>);
        let assets = statistics.asset_count();
        let chunk_count = self.trial_count.div_ceil(chunk_size);

        let chunks = (0..chunk_count)
            .into_par_iter()
            .map(|chunk| -> Result<Vec<Trial>> {
                let start = chunk * chunk_size;
                let end = (start + chunk_size).min(self.trial_count);
                let mut sampler = SimplexSampler::for_stream(assets, seed, chunk as u64)?;
                trace!("chunk {} covers trials {}..{}", chunk, start, end);
                (start..end)
                    .map(|id| {
                        let weights = sampler.sample();
                        let performance =
                            compute_portfolio_performance(&weights, statistics, self.risk_free_rate)?;
                        Ok(Trial::new(id, weights, performance))
                    })
                    .collect()
            })
            .collect::<Result<Vec<Vec<Trial>>>>()?;

        // chunk order == id order
        let mut trials = Vec::with_capacity(self.trial_count);
        for chunk in chunks {
            trials.extend(chunk);
        }
        Ok((seed, trials))
    }
}

/// Single-stream run over precomputed statistics.
pub fn run_simulation(
    asset_count: usize,
    statistics: &Statistics,
    trial_count: usize,
    risk_free_rate: f64,
    seed: Option<u64>,
) -> Result<SimulationRun> {
    if asset_count != statistics.asset_count() {
        return Err(FrontierError::invalid_parameter(format!(
            "asset count {} does not match statistics for {} assets",
            asset_count,
            statistics.asset_count()
        )));
    }
    MonteCarloOptimizer::new(trial_count, risk_free_rate)
        .with_seed(seed)
        .run(statistics)
}

/// Every trial of one run, owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct SimulationRun {
    seed: u64,
    risk_free_rate: f64,
    asset_count: usize,
    trials: Vec<Trial>,
}

impl SimulationRun {
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn risk_free_rate(&self) -> f64 {
        self.risk_free_rate
    }

    pub fn asset_count(&self) -> usize {
        self.asset_count
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn undefined_sharpe_count(&self) -> usize {
        self.trials.iter().filter(|t| t.sharpe_ratio.is_none()).count()
    }

    /// Maximum defined Sharpe ratio; ties resolve to the lowest trial id.
    pub fn optimal(&self) -> Result<&Trial> {
        let mut best: Option<(&Trial, f64)> = None;
        for trial in &self.trials {
            let Some(sharpe) = trial.sharpe_ratio else {
                continue;
            };
            match best {
                Some((_, best_sharpe)) if sharpe <= best_sharpe => {}
                _ => best = Some((trial, sharpe)),
            }
        }
        best.map(|(trial, _)| trial)
            .ok_or(FrontierError::NoScorableTrials {
                trials: self.trials.len(),
            })
    }

    pub fn efficient_frontier(&self) -> Vec<&Trial> {
        efficient_frontier(&self.trials)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        bincode::encode_into_std_write(self, &mut writer, bincode::config::standard())
            .map_err(|e| FrontierError::persist(format!("encode {}: {}", path.display(), e)))?;
        writer.flush()?;
        info!("saved {} trials to {}", self.len(), path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        bincode::decode_from_std_read(&mut reader, bincode::config::standard())
            .map_err(|e| FrontierError::persist(format!("decode {}: {}", path.display(), e)))
    }
}
