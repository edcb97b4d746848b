//! End-to-end tests: prices in, max-Sharpe report out.

use approx::assert_relative_eq;
use chrono::{Days, NaiveDate};
use sharpe_frontier::{
    AssetSet, CsvPriceProvider, ExecutionMode, InMemoryPriceProvider, Lookback, MonteCarloOptimizer,
    OptimalPortfolioReport, PriceHistoryProvider, PriceTable, ReturnSeries, SimulationRun, Statistics,
    SyntheticModel, SyntheticPriceProvider, compute_statistics,
};
use std::io::Write;

fn sample_prices(scale: [f64; 3]) -> PriceTable {
    // Three assets with different drift and noise
    let n = 260;
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    let mut dates = Vec::with_capacity(n);
    let mut rows = Vec::with_capacity(n);
    let mut prices = [100.0, 50.0, 20.0];
    for i in 0..n {
        let t = i as f64;
        let moves = [
            0.0004 + 0.004 * (t * 0.7).sin(),
            0.0008 + 0.012 * (t * 1.3).cos(),
            0.0001 + 0.008 * (t * 0.4 + 1.0).sin(),
        ];
        for (p, m) in prices.iter_mut().zip(moves) {
            *p *= m.exp();
        }
        dates.push(start + Days::new(i as u64));
        rows.push(prices.iter().zip(scale).map(|(p, s)| p * s).collect());
    }
    PriceTable::new(3, dates, rows).unwrap()
}

fn run_on(table: PriceTable, seed: u64) -> (SimulationRun, AssetSet) {
    let assets = AssetSet::from_labels(["Toyota", "Sony", "NTT"]).unwrap();
    let prices = InMemoryPriceProvider::new(table).fetch(&assets, &Lookback::Max).unwrap();
    let statistics = compute_statistics(&prices, 250.0).unwrap();
    let run = MonteCarloOptimizer::new(2_000, 0.0)
        .with_seed(Some(seed))
        .run(&statistics)
        .unwrap();
    (run, assets)
}

#[test]
fn test_pipeline_produces_consistent_report() {
    let (run, assets) = run_on(sample_prices([1.0; 3]), 42);
    assert_eq!(run.len(), 2_000);

    for trial in run.trials() {
        let total: f64 = trial.weights.iter().sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-9);
        assert!(trial.weights.iter().all(|w| *w >= 0.0));
        if let Some(sharpe) = trial.sharpe_ratio {
            assert_relative_eq!(sharpe, trial.return_pct / trial.risk_pct, max_relative = 1e-9);
        }
    }

    let best = run.optimal().unwrap();
    let best_sharpe = best.sharpe_ratio.unwrap();
    assert!(run.trials().iter().filter_map(|t| t.sharpe_ratio).all(|s| s <= best_sharpe));

    let report = OptimalPortfolioReport::from_run(&run, &assets, 2).unwrap();
    assert_eq!(report.trial_id, best.id);
    assert_eq!(report.allocations.len(), 3);
    assert!(report.to_string().contains("Max Sharpe Ratio Portfolio"));
}

#[test]
fn test_rescaling_prices_keeps_the_optimum() {
    let (base, _) = run_on(sample_prices([1.0; 3]), 7);
    let (scaled, _) = run_on(sample_prices([3.0, 0.5, 10.0]), 7);
    let a = base.optimal().unwrap();
    let b = scaled.optimal().unwrap();
    assert_eq!(a.id, b.id);
    assert_eq!(a.weights, b.weights);
    assert_relative_eq!(a.sharpe_ratio.unwrap(), b.sharpe_ratio.unwrap(), max_relative = 1e-9);
}

#[test]
fn test_parallel_run_is_reproducible_on_synthetic_data() {
    let provider = SyntheticPriceProvider::new(SyntheticModel::FactorModel { number_of_factors: 2 }, 500, Some(5));
    let assets = AssetSet::from_labels(["A", "B", "C", "D"]).unwrap();
    let statistics = compute_statistics(&provider.fetch(&assets, &Lookback::Max).unwrap(), 252.0).unwrap();

    let optimizer = MonteCarloOptimizer::new(5_000, 0.01)
        .with_seed(Some(99))
        .with_mode(ExecutionMode::Parallel { chunk_size: 512 });
    let first = optimizer.run(&statistics).unwrap();
    let second = optimizer.run(&statistics).unwrap();
    assert_eq!(first, second);
    assert!(first.trials().iter().enumerate().all(|(i, t)| t.id == i));
}

#[test]
fn test_csv_prices_to_snapshot() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "Date,7203.T,6758.T").unwrap();
    let mut a = 2500.0_f64;
    let mut b = 12000.0_f64;
    for day in 0..40u64 {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + Days::new(day);
        a *= 1.0 + 0.01 * ((day as f64) * 0.9).sin();
        b *= 1.0 + 0.015 * ((day as f64) * 0.5).cos();
        if day == 20 {
            // missing quote for one ticker
            writeln!(file, "{},{},", date, a).unwrap();
        } else {
            writeln!(file, "{},{},{}", date, a, b).unwrap();
        }
    }
    file.flush().unwrap();

    let assets = AssetSet::new(vec![
        sharpe_frontier::Asset::new("Toyota", "7203.T"),
        sharpe_frontier::Asset::new("Sony", "6758.T"),
    ])
    .unwrap();
    let prices = CsvPriceProvider::new(file.path()).fetch(&assets, &Lookback::Max).unwrap();
    let returns = ReturnSeries::from_asset_prices(&prices, &assets).unwrap();
    // 39 price pairs, two of them touch the gap
    assert_eq!(returns.len(), 37);

    let statistics = Statistics::from_returns(&returns, 250.0).unwrap();
    let run = MonteCarloOptimizer::new(300, 0.0).with_seed(Some(1)).run(&statistics).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.bin");
    run.save(&path).unwrap();
    let restored = SimulationRun::load(&path).unwrap();
    assert_eq!(restored.optimal().unwrap(), run.optimal().unwrap());
}
