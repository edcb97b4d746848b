use crate::error::{FrontierError, Result};
use crate::market_data::AssetSet;
use crate::optimizer::SimulationRun;
use crate::statistics::ReturnSeries;
use std::path::Path;
use tracing::info;

fn check_width(expected: usize, assets: &AssetSet) -> Result<()> {
    if expected != assets.len() {
        return Err(FrontierError::invalid_parameter(format!(
            "data has {} columns, asset set has {}",
            expected,
            assets.len()
        )));
    }
    Ok(())
}

/// `date,<labels...>` with one row per retained return date.
pub fn write_returns_csv(returns: &ReturnSeries, assets: &AssetSet, path: impl AsRef<Path>) -> Result<()> {
    check_width(returns.asset_count(), assets)?;
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["date"];
    header.extend(assets.labels());
    writer.write_record(&header)?;

    for (date, row) in returns.dates().iter().zip(returns.rows()) {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(date.format("%Y-%m-%d").to_string());
        record.extend(row.iter().map(|r| r.to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    info!("wrote {} return rows to {}", returns.len(), path.display());
    Ok(())
}

/// One row per trial: `trial,return_pct,risk_pct,sharpe_ratio,<labels...>`.
/// Undefined Sharpe ratios are left blank.
pub fn write_trials_csv(run: &SimulationRun, assets: &AssetSet, path: impl AsRef<Path>) -> Result<()> {
    check_width(run.asset_count(), assets)?;
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["trial", "return_pct", "risk_pct", "sharpe_ratio"];
    header.extend(assets.labels());
    writer.write_record(&header)?;

    for trial in run.trials() {
        let mut record = vec![
            trial.id.to_string(),
            trial.return_pct.to_string(),
            trial.risk_pct.to_string(),
            trial.sharpe_ratio.map(|s| s.to_string()).unwrap_or_default(),
        ];
        record.extend(trial.weights.iter().map(|w| w.to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    info!("wrote {} trials to {}", run.len(), path.display());
    Ok(())
}
