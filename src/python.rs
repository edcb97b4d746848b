use crate::optimizer::{ExecutionMode, MonteCarloOptimizer};
use crate::sampling::SimplexSampler;
use crate::statistics::Statistics;
use pyo3::prelude::*;

#[pyclass]
pub struct PyOptimizer {
    statistics: Statistics,
    sampler: SimplexSampler,
}

#[pymethods]
impl PyOptimizer {
    /// Annualized means and covariance (nested lists); seed = Option<u64>
    #[new]
    #[pyo3(signature = (means, covariance, seed = None))]
    fn new(means: Vec<f64>, covariance: Vec<Vec<f64>>, seed: Option<u64>) -> PyResult<Self> {
        let statistics = Statistics::from_parts(means, covariance)?;
        let sampler = SimplexSampler::new(statistics.asset_count(), seed)?;
        Ok(PyOptimizer { statistics, sampler })
    }

    #[getter]
    fn seed(&self) -> u64 {
        self.sampler.seed()
    }

    /// One weight vector; advances the internal RNG
    fn sample_weights(&mut self) -> Vec<f64> {
        self.sampler.sample()
    }

    /// Runs `trials` draws from the current seed and returns
    /// (trial id, weights, return %, risk %, sharpe) of the optimum.
    #[pyo3(signature = (trials, risk_free_rate = 0.0, parallel = false))]
    fn run(
        &self,
        py: Python<'_>,
        trials: usize,
        risk_free_rate: f64,
        parallel: bool,
    ) -> PyResult<(usize, Vec<f64>, f64, f64, f64)> {
        let mode = if parallel {
            ExecutionMode::default()
        } else {
            ExecutionMode::Sequential
        };
        let optimizer = MonteCarloOptimizer::new(trials, risk_free_rate)
            .with_seed(Some(self.sampler.seed()))
            .with_mode(mode);
        let statistics = &self.statistics;
        let run = py.allow_threads(|| optimizer.run(statistics))?;
        let best = run.optimal()?;
        Ok((
            best.id,
            best.weights.clone(),
            best.return_pct,
            best.risk_pct,
            best.sharpe_ratio.unwrap_or(f64::NAN),
        ))
    }

    /// Every trial of a sequential run as (weights, return %, risk %, sharpe)
    #[pyo3(signature = (trials, risk_free_rate = 0.0))]
    fn trials(
        &self,
        py: Python<'_>,
        trials: usize,
        risk_free_rate: f64,
    ) -> PyResult<Vec<(Vec<f64>, f64, f64, Option<f64>)>> {
        let optimizer = MonteCarloOptimizer::new(trials, risk_free_rate).with_seed(Some(self.sampler.seed()));
        let statistics = &self.statistics;
        let run = py.allow_threads(|| optimizer.run(statistics))?;
        Ok(run
            .trials()
            .iter()
            .map(|t| (t.weights.clone(), t.return_pct, t.risk_pct, t.sharpe_ratio))
            .collect())
    }

    /// Reseed the internal RNG mid-flight
    fn reseed(&mut self, seed: u64) {
        self.sampler.reseed(seed);
    }
}

#[pymodule]
fn sharpe_frontier(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyOptimizer>()?;
    Ok(())
}
