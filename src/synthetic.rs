use crate::error::{FrontierError, Result};
use crate::market_data::{AssetSet, Lookback, PriceHistoryProvider, PriceTable, ensure_usable};
use chrono::{Datelike, Days, NaiveDate, Weekday};
use nalgebra::{DMatrix, DVector};
use rand::distributions::{Distribution, Uniform};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use statrs::distribution::MultivariateNormal;
use tracing::info;

/// Daily log-return model the synthetic prices are drawn from.
#[derive(Debug, Clone, PartialEq)]
pub enum SyntheticModel {
    /// Explicit daily mean vector and covariance (row-major, N x N).
    Normal {
        daily_means: Vec<f64>,
        daily_covariance: Vec<Vec<f64>>,
    },
    /// Random linear factor model: loadings ~ U(0.5, 1.5), diagonal factor
    /// covariance, constant idiosyncratic variance.
    FactorModel { number_of_factors: usize },
}

#[derive(Debug, Clone)]
pub struct SyntheticPriceProvider {
    model: SyntheticModel,
    periods_to_sample: usize,
    start_price: f64,
    start_date: NaiveDate,
    seed: Option<u64>,
}

// Daily-scale parameters of the factor model
const FACTOR_MEAN_RETURN: f64 = 0.0003;
const FACTOR_VARIANCE_RANGE: (f64, f64) = (1e-5, 2e-4);
const LOADING_RANGE: (f64, f64) = (0.5, 1.5);
const IDIOSYNCRATIC_VARIANCE: f64 = 1e-4;

impl SyntheticPriceProvider {
    pub fn new(model: SyntheticModel, periods_to_sample: usize, seed: Option<u64>) -> Self {
        SyntheticPriceProvider {
            model,
            periods_to_sample,
            start_price: 100.0,
            start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
            seed,
        }
    }

    fn model_parameters(&self, assets: usize, rng: &mut ChaCha8Rng) -> Result<(Vec<f64>, DMatrix<f64>)> {
        match &self.model {
            SyntheticModel::Normal {
                daily_means,
                daily_covariance,
            } => {
                if daily_means.len() != assets
                    || daily_covariance.len() != assets
                    || daily_covariance.iter().any(|row| row.len() != assets)
                {
                    return Err(FrontierError::invalid_parameter(format!(
                        "synthetic model has {} assets, basket has {}",
                        daily_means.len(),
                        assets
                    )));
                }
                let covariance = DMatrix::from_fn(assets, assets, |i, j| daily_covariance[i][j]);
                Ok((daily_means.clone(), covariance))
            }
            SyntheticModel::FactorModel { number_of_factors } => {
                Self::factor_model(assets, *number_of_factors, rng)
            }
        }
    }

    fn factor_model(
        assets_under_management: usize,
        number_of_factors: usize,
        rng: &mut ChaCha8Rng,
    ) -> Result<(Vec<f64>, DMatrix<f64>)> {
        if number_of_factors == 0 {
            return Err(FrontierError::invalid_parameter("Number of factors must be greater than zero"));
        }

        let variance = Uniform::new(FACTOR_VARIANCE_RANGE.0, FACTOR_VARIANCE_RANGE.1);
        let covariance_factors =
            DMatrix::from_diagonal(&DVector::from_fn(number_of_factors, |_, _| variance.sample(rng)));

        // One draw of factor returns fixes the asset drifts
        let factor_means = vec![FACTOR_MEAN_RETURN; number_of_factors];
        let factor_returns = sample_normal(&factor_means, &covariance_factors, rng)?;

        let loading = Uniform::new(LOADING_RANGE.0, LOADING_RANGE.1);
        let loadings = DMatrix::from_fn(assets_under_management, number_of_factors, |_, _| {
            loading.sample(rng)
        });

        let mu_assets = (&loadings * &factor_returns).iter().copied().collect();
        let systematic = &loadings * &covariance_factors * loadings.transpose();
        // MultivariateNormal rejects any rounding asymmetry
        let systematic = (&systematic + systematic.transpose()) * 0.5;
        let covariance_assets = systematic
            + DMatrix::from_diagonal_element(
                assets_under_management,
                assets_under_management,
                IDIOSYNCRATIC_VARIANCE,
            );
        Ok((mu_assets, covariance_assets))
    }

    fn trading_dates(&self, count: usize) -> Vec<NaiveDate> {
        let mut dates = Vec::with_capacity(count);
        let mut date = self.start_date;
        while dates.len() < count {
            if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                dates.push(date);
            }
            date = date + Days::new(1);
        }
        dates
    }
}

fn sample_normal(means: &[f64], covariance: &DMatrix<f64>, rng: &mut ChaCha8Rng) -> Result<DVector<f64>> {
    let flat: Vec<f64> = covariance.transpose().iter().copied().collect();
    let normal = MultivariateNormal::new(means.to_vec(), flat)
        .map_err(|e| FrontierError::invalid_parameter(format!("MVN init failed: {}", e)))?;
    Ok(normal.sample(rng))
}

impl PriceHistoryProvider for SyntheticPriceProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(&self, assets: &AssetSet, lookback: &Lookback) -> Result<PriceTable> {
        let seed = self.seed.unwrap_or_else(rand::random::<u64>);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let (means, covariance) = self
            .model_parameters(assets.len(), &mut rng)
            .map_err(|e| FrontierError::data_fetch(self.name(), e.to_string()))?;
        let flat: Vec<f64> = covariance.transpose().iter().copied().collect();
        let normal = MultivariateNormal::new(means, flat)
            .map_err(|e| FrontierError::data_fetch(self.name(), format!("Failed to create MVN: {}", e)))?;

        let mut prices = vec![self.start_price; assets.len()];
        let mut rows = Vec::with_capacity(self.periods_to_sample + 1);
        rows.push(prices.clone());
        for log_returns in normal.sample_iter(&mut rng).take(self.periods_to_sample) {
            for (price, r) in prices.iter_mut().zip(log_returns.iter()) {
                *price *= r.exp();
            }
            rows.push(prices.clone());
        }

        let table = PriceTable::new(assets.len(), self.trading_dates(rows.len()), rows)?.trimmed(lookback);
        ensure_usable(self.name(), assets, &table)?;
        info!(
            "generated {} synthetic price rows for {} assets (seed {})",
            table.len(),
            assets.len(),
            seed
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::compute_statistics;

    #[test]
    fn test_normal_model_is_seeded() {
        let model = SyntheticModel::Normal {
            daily_means: vec![0.0004, 0.0002],
            daily_covariance: vec![vec![1e-4, 2e-5], vec![2e-5, 4e-4]],
        };
        let provider = SyntheticPriceProvider::new(model, 300, Some(12));
        let assets = AssetSet::from_labels(["A", "B"]).unwrap();
        let a = provider.fetch(&assets, &Lookback::Max).unwrap();
        let b = provider.fetch(&assets, &Lookback::Max).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 301);
        assert!(a.rows().iter().flatten().all(|p| p.is_finite() && *p > 0.0));
        assert!(a.dates().iter().all(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun)));
    }

    #[test]
    fn test_normal_model_recovers_annualized_variance() {
        let model = SyntheticModel::Normal {
            daily_means: vec![0.0],
            daily_covariance: vec![vec![1e-4]],
        };
        let provider = SyntheticPriceProvider::new(model, 20_000, Some(3));
        let assets = AssetSet::from_labels(["A"]).unwrap();
        let stats = compute_statistics(&provider.fetch(&assets, &Lookback::Max).unwrap(), 250.0).unwrap();
        let annual_variance = stats.covariance()[(0, 0)];
        assert!((annual_variance - 0.025).abs() < 0.0025, "variance {annual_variance}");
    }

    #[test]
    fn test_factor_model_produces_full_basket() {
        let provider = SyntheticPriceProvider::new(SyntheticModel::FactorModel { number_of_factors: 2 }, 120, Some(9));
        let assets = AssetSet::from_labels(["A", "B", "C", "D"]).unwrap();
        let table = provider.fetch(&assets, &Lookback::Max).unwrap();
        assert_eq!(table.asset_count(), 4);
        assert!(compute_statistics(&table, 250.0).is_ok());
    }

    #[test]
    fn test_factor_covariance_is_exactly_symmetric() {
        for seed in 0..20 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let (means, covariance) = SyntheticPriceProvider::factor_model(7, 3, &mut rng).unwrap();
            assert_eq!(means.len(), 7);
            assert_eq!(covariance, covariance.transpose());
            assert!(covariance.diagonal().iter().all(|v| *v >= IDIOSYNCRATIC_VARIANCE));
        }
    }

    #[test]
    fn test_zero_factors_and_wrong_width_are_fetch_errors() {
        let assets = AssetSet::from_labels(["A", "B"]).unwrap();
        let zero = SyntheticPriceProvider::new(SyntheticModel::FactorModel { number_of_factors: 0 }, 10, Some(1));
        assert!(matches!(zero.fetch(&assets, &Lookback::Max), Err(FrontierError::DataFetch { .. })));

        let narrow = SyntheticPriceProvider::new(
            SyntheticModel::Normal {
                daily_means: vec![0.0],
                daily_covariance: vec![vec![1e-4]],
            },
            10,
            Some(1),
        );
        assert!(matches!(narrow.fetch(&assets, &Lookback::Max), Err(FrontierError::DataFetch { .. })));
    }
}
