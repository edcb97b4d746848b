use crate::common_consts::FLOAT_COMPARISON_EPSILON;
use crate::error::{FrontierError, Result};
use crate::statistics::Statistics;
use nalgebra::DVector;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortfolioPerformance {
    /// Annualized expected return, percent.
    pub return_pct: f64,
    /// Annualized volatility, percent.
    pub risk_pct: f64,
    /// `None` when the portfolio has (numerically) zero volatility.
    pub sharpe_ratio: Option<f64>,
}

pub fn compute_portfolio_performance(
    weights: &[f64],
    statistics: &Statistics,
    risk_free_rate: f64,
) -> Result<PortfolioPerformance> {
    // --- Edge Case Checks ---
    if weights.len() != statistics.asset_count() {
        return Err(FrontierError::invalid_parameter(format!(
            "{} weights for {} assets",
            weights.len(),
            statistics.asset_count()
        )));
    }

    let weights = DVector::from_column_slice(weights);
    let return_pct = weights.dot(statistics.mean()) * 100.0;

    // Quadratic form w' * Sigma * w
    let mut variance = weights.dot(&(statistics.covariance() * &weights));
    if variance < -FLOAT_COMPARISON_EPSILON {
        return Err(FrontierError::NegativeVariance { variance });
    }
    if variance < 0.0 {
        // rounding noise around a singular matrix
        variance = 0.0;
    }
    let risk_pct = variance.sqrt() * 100.0;

    let sharpe_ratio = if risk_pct / 100.0 >= FLOAT_COMPARISON_EPSILON {
        Some((return_pct / 100.0 - risk_free_rate) / (risk_pct / 100.0))
    } else {
        // Undefined; the optimizer leaves these out of the argmax
        None
    };

    Ok(PortfolioPerformance {
        return_pct,
        risk_pct,
        sharpe_ratio,
    })
}
