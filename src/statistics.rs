use crate::common_consts::SYMMETRY_TOLERANCE;
use crate::error::{FrontierError, Result};
use crate::market_data::{AssetSet, PriceTable};
use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use statrs::statistics::Statistics as SampleStatistics;
use tracing::{debug, warn};

fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Daily log returns; one row per retained consecutive price pair, dated by
/// the later price.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSeries {
    asset_count: usize,
    dates: Vec<NaiveDate>,
    rows: Vec<Vec<f64>>,
}

/// Per-asset summary of the daily return series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnSummary {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl ReturnSeries {
    pub fn new(asset_count: usize, dates: Vec<NaiveDate>, rows: Vec<Vec<f64>>) -> Result<Self> {
        if dates.len() != rows.len() {
            return Err(FrontierError::invalid_parameter(format!(
                "{} dates but {} return rows",
                dates.len(),
                rows.len()
            )));
        }
        if rows.iter().any(|r| r.len() != asset_count) {
            return Err(FrontierError::invalid_parameter(format!(
                "every return row must hold {asset_count} values"
            )));
        }
        Ok(ReturnSeries {
            asset_count,
            dates,
            rows,
        })
    }

    /// `ln(P[t] / P[t-1])` per asset. The first row has no predecessor and
    /// rows touching a missing price are dropped, not imputed. A close that
    /// is not finite and positive counts as missing.
    pub fn from_prices(prices: &PriceTable) -> Result<Self> {
        Self::collect(prices, |asset| format!("asset #{asset}"))
    }

    /// As [`ReturnSeries::from_prices`], naming assets by label in errors.
    pub fn from_asset_prices(prices: &PriceTable, assets: &AssetSet) -> Result<Self> {
        if assets.len() != prices.asset_count() {
            return Err(FrontierError::invalid_parameter(format!(
                "price table has {} columns, asset set has {}",
                prices.asset_count(),
                assets.len()
            )));
        }
        let labels = assets.labels();
        Self::collect(prices, |asset| labels[asset].to_string())
    }

    fn collect(prices: &PriceTable, asset_name: impl Fn(usize) -> String) -> Result<Self> {
        let asset_count = prices.asset_count();
        for asset in 0..asset_count {
            if !prices.column(asset).any(is_valid_price) {
                return Err(FrontierError::insufficient_data(
                    format!("prices of {}", asset_name(asset)),
                    1,
                    0,
                ));
            }
        }

        let mut dates = Vec::with_capacity(prices.len().saturating_sub(1));
        let mut rows = Vec::with_capacity(prices.len().saturating_sub(1));
        let mut dropped = 0usize;
        for (pair, date) in prices.rows().windows(2).zip(prices.dates().iter().skip(1)) {
            let row: Vec<f64> = pair[1]
                .iter()
                .zip(pair[0].iter())
                .map(|(&today, &yesterday)| {
                    if is_valid_price(today) && is_valid_price(yesterday) {
                        (today / yesterday).ln()
                    } else {
                        f64::NAN
                    }
                })
                .collect();
            if row.iter().all(|r| r.is_finite()) {
                dates.push(*date);
                rows.push(row);
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            warn!("dropped {} return rows with missing or invalid prices", dropped);
        }

        Ok(ReturnSeries {
            asset_count,
            dates,
            rows,
        })
    }

    pub fn asset_count(&self) -> usize {
        self.asset_count
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn column(&self, asset: usize) -> Vec<f64> {
        self.rows.iter().map(|row| row[asset]).collect()
    }

    pub fn describe(&self) -> Vec<ReturnSummary> {
        (0..self.asset_count)
            .map(|asset| {
                let column = self.column(asset);
                ReturnSummary {
                    count: column.len(),
                    mean: column.iter().mean(),
                    std: column.iter().std_dev(),
                    min: SampleStatistics::min(column.iter()),
                    max: SampleStatistics::max(column.iter()),
                }
            })
            .collect()
    }
}

/// Annualized expected returns and covariance of daily log returns.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    mean: DVector<f64>,
    covariance: DMatrix<f64>,
}

impl Statistics {
    /// Sample mean and sample covariance (n - 1 denominator), both scaled by
    /// `trading_days_per_year`.
    pub fn from_returns(returns: &ReturnSeries, trading_days_per_year: f64) -> Result<Self> {
        if !(trading_days_per_year > 0.0) || !trading_days_per_year.is_finite() {
            return Err(FrontierError::invalid_parameter(format!(
                "trading days per year must be positive, got {trading_days_per_year}"
            )));
        }
        if returns.len() < 2 {
            return Err(FrontierError::insufficient_data(
                "aligned return rows",
                2,
                returns.len(),
            ));
        }

        let n = returns.asset_count();
        let columns: Vec<Vec<f64>> = (0..n).map(|asset| returns.column(asset)).collect();

        let mean = DVector::from_iterator(
            n,
            columns.iter().map(|c| c.iter().mean() * trading_days_per_year),
        );

        let mut covariance = DMatrix::zeros(n, n);
        for i in 0..n {
            for j in i..n {
                let cov = columns[i].iter().covariance(columns[j].iter()) * trading_days_per_year;
                covariance[(i, j)] = cov;
                covariance[(j, i)] = cov;
            }
        }

        debug!(
            "statistics from {} return rows: mean={:?}",
            returns.len(),
            mean.as_slice()
        );
        Ok(Statistics { mean, covariance })
    }

    /// Precomputed annualized statistics.
    pub fn from_parts(mean: Vec<f64>, covariance: Vec<Vec<f64>>) -> Result<Self> {
        let n = mean.len();
        if n == 0 {
            return Err(FrontierError::invalid_parameter("mean vector must not be empty"));
        }
        if covariance.len() != n || covariance.iter().any(|row| row.len() != n) {
            return Err(FrontierError::invalid_parameter(format!(
                "covariance must be {n}x{n}"
            )));
        }
        let covariance = DMatrix::from_fn(n, n, |i, j| covariance[i][j]);
        if mean.iter().chain(covariance.iter()).any(|v| !v.is_finite()) {
            return Err(FrontierError::invalid_parameter("statistics must be finite"));
        }
        for i in 0..n {
            for j in (i + 1)..n {
                if (covariance[(i, j)] - covariance[(j, i)]).abs() > SYMMETRY_TOLERANCE {
                    return Err(FrontierError::invalid_parameter(format!(
                        "covariance not symmetric at ({i}, {j})"
                    )));
                }
            }
        }
        Ok(Statistics {
            mean: DVector::from_vec(mean),
            covariance,
        })
    }

    pub fn asset_count(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    pub fn annualized_volatility(&self) -> Vec<f64> {
        self.covariance.diagonal().iter().map(|v| v.sqrt()).collect()
    }
}

/// Price table straight to annualized statistics.
pub fn compute_statistics(prices: &PriceTable, trading_days_per_year: f64) -> Result<Statistics> {
    let returns = ReturnSeries::from_prices(prices)?;
    Statistics::from_returns(&returns, trading_days_per_year)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n).map(|i| start + chrono::Days::new(i as u64)).collect()
    }

    fn prices_from_returns(returns: &[Vec<f64>], start: &[f64]) -> PriceTable {
        let mut rows = vec![start.to_vec()];
        for r in returns {
            let last = rows.last().unwrap().clone();
            rows.push(last.iter().zip(r).map(|(p, x)| p * x.exp()).collect());
        }
        PriceTable::new(start.len(), dates(rows.len()), rows).unwrap()
    }

    #[test]
    fn test_alternating_returns_match_hand_values() {
        let returns = vec![
            vec![0.01, 0.02],
            vec![-0.01, -0.02],
            vec![0.01, 0.02],
            vec![-0.01, -0.02],
        ];
        let prices = prices_from_returns(&returns, &[100.0, 50.0]);
        let stats = compute_statistics(&prices, 250.0).unwrap();

        assert_relative_eq!(stats.mean()[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(stats.mean()[1], 0.0, epsilon = 1e-12);
        // sum of squared deviations / (4 - 1) * 250
        assert_relative_eq!(stats.covariance()[(0, 0)], 4.0 * 0.0001 / 3.0 * 250.0, max_relative = 1e-9);
        assert_relative_eq!(stats.covariance()[(1, 1)], 4.0 * 0.0004 / 3.0 * 250.0, max_relative = 1e-9);
        assert_relative_eq!(stats.covariance()[(0, 1)], 4.0 * 0.0002 / 3.0 * 250.0, max_relative = 1e-9);
        assert_eq!(stats.covariance()[(0, 1)], stats.covariance()[(1, 0)]);
    }

    #[test]
    fn test_odd_length_mean_is_annualized() {
        let returns = vec![vec![0.01], vec![-0.01], vec![0.01]];
        let prices = prices_from_returns(&returns, &[10.0]);
        let stats = compute_statistics(&prices, 250.0).unwrap();
        assert_relative_eq!(stats.mean()[0], 0.01 / 3.0 * 250.0, max_relative = 1e-9);
    }

    #[test]
    fn test_rebasing_prices_leaves_statistics_unchanged() {
        let returns = vec![
            vec![0.012, -0.004],
            vec![-0.007, 0.011],
            vec![0.003, 0.002],
            vec![0.020, -0.015],
        ];
        let prices = prices_from_returns(&returns, &[100.0, 40.0]);
        let rebased_rows = prices
            .rows()
            .iter()
            .map(|row| vec![row[0] * 37.5, row[1]])
            .collect();
        let rebased = PriceTable::new(2, prices.dates().to_vec(), rebased_rows).unwrap();

        let a = compute_statistics(&prices, 252.0).unwrap();
        let b = compute_statistics(&rebased, 252.0).unwrap();
        for (x, y) in a.mean().iter().zip(b.mean().iter()) {
            assert_relative_eq!(x, y, epsilon = 1e-12);
        }
        for (x, y) in a.covariance().iter().zip(b.covariance().iter()) {
            assert_relative_eq!(x, y, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_missing_price_drops_both_adjacent_rows() {
        let rows = vec![
            vec![100.0, 10.0],
            vec![101.0, 10.1],
            vec![f64::NAN, 10.2],
            vec![103.0, 10.3],
            vec![104.0, 10.4],
        ];
        let table = PriceTable::new(2, dates(5), rows).unwrap();
        let returns = ReturnSeries::from_prices(&table).unwrap();
        assert_eq!(returns.len(), 2);
        assert_eq!(returns.dates(), &[dates(5)[1], dates(5)[4]]);
    }

    #[test]
    fn test_all_missing_asset_is_insufficient() {
        let rows = vec![vec![1.0, f64::NAN], vec![1.1, f64::NAN], vec![1.2, f64::NAN]];
        let table = PriceTable::new(2, dates(3), rows).unwrap();
        assert!(matches!(
            compute_statistics(&table, 250.0),
            Err(FrontierError::DataInsufficient { .. })
        ));
    }

    #[test]
    fn test_non_positive_prices_count_as_missing() {
        let rows = vec![
            vec![100.0, 10.0],
            vec![101.0, 10.1],
            vec![0.0, 10.2],
            vec![103.0, 10.3],
            vec![-104.0, 10.4],
            vec![105.0, 10.5],
            vec![106.0, 10.6],
        ];
        let table = PriceTable::new(2, dates(7), rows).unwrap();
        let returns = ReturnSeries::from_prices(&table).unwrap();
        assert_eq!(returns.dates(), &[dates(7)[1], dates(7)[6]]);
        assert!(returns.rows().iter().flatten().all(|r| r.is_finite()));
    }

    #[test]
    fn test_negative_price_series_is_insufficient() {
        let rows = vec![vec![-10.0], vec![-11.0], vec![-9.0], vec![-12.0]];
        let table = PriceTable::new(1, dates(4), rows).unwrap();
        assert!(matches!(
            compute_statistics(&table, 250.0),
            Err(FrontierError::DataInsufficient { .. })
        ));
    }

    #[test]
    fn test_all_missing_asset_is_reported_by_label() {
        let rows = vec![vec![1.0, f64::NAN], vec![1.1, 0.0], vec![1.2, f64::NAN]];
        let table = PriceTable::new(2, dates(3), rows).unwrap();
        let assets = AssetSet::from_labels(["Toyota", "Sony"]).unwrap();
        let err = ReturnSeries::from_asset_prices(&table, &assets).unwrap_err();
        assert!(matches!(err, FrontierError::DataInsufficient { .. }));
        assert!(err.to_string().contains("Sony"), "{err}");

        let three = AssetSet::from_labels(["A", "B", "C"]).unwrap();
        assert!(ReturnSeries::from_asset_prices(&table, &three).is_err());
    }

    #[test]
    fn test_fewer_than_two_rows_is_insufficient() {
        let table = PriceTable::new(1, dates(2), vec![vec![1.0], vec![1.1]]).unwrap();
        let err = compute_statistics(&table, 250.0).unwrap_err();
        assert!(matches!(
            err,
            FrontierError::DataInsufficient {
                required: 2,
                available: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_zero_trading_days_rejected() {
        let returns = ReturnSeries::new(1, dates(2), vec![vec![0.01], vec![0.02]]).unwrap();
        assert!(Statistics::from_returns(&returns, 0.0).is_err());
    }

    #[test]
    fn test_from_parts_validates_shape_and_symmetry() {
        assert!(Statistics::from_parts(vec![0.1, 0.2], vec![vec![0.04, 0.01]]).is_err());
        assert!(Statistics::from_parts(vec![0.1, 0.2], vec![vec![0.04, 0.01], vec![0.02, 0.09]]).is_err());
        let stats = Statistics::from_parts(vec![0.1, 0.2], vec![vec![0.04, 0.01], vec![0.01, 0.09]]).unwrap();
        assert_eq!(stats.asset_count(), 2);
        assert_relative_eq!(stats.annualized_volatility()[1], 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_describe_reports_daily_moments() {
        let returns = ReturnSeries::new(1, dates(3), vec![vec![0.01], vec![0.03], vec![-0.01]]).unwrap();
        let summary = &returns.describe()[0];
        assert_eq!(summary.count, 3);
        assert_relative_eq!(summary.mean, 0.01, epsilon = 1e-12);
        assert_relative_eq!(summary.std, 0.02, epsilon = 1e-12);
        assert_eq!(summary.min, -0.01);
        assert_eq!(summary.max, 0.03);
    }
}
