use crate::error::{FrontierError, Result};
use crate::market_data::AssetSet;
use crate::optimizer::SimulationRun;
use plotly::common::{ColorScale, ColorScalePalette, Line, Marker, MarkerSymbol, Mode};
use plotly::layout::Axis;
use plotly::{Layout, Plot, Scatter};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationLine {
    pub asset: String,
    /// Percent, rounded to the report's decimals.
    pub weight_pct: f64,
}

/// The max-Sharpe trial, labelled with asset names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimalPortfolioReport {
    pub trial_id: usize,
    pub return_pct: f64,
    pub risk_pct: f64,
    pub sharpe_ratio: f64,
    pub allocations: Vec<AllocationLine>,
    #[serde(skip)]
    decimals: usize,
}

fn round_to(value: f64, decimals: usize) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

impl OptimalPortfolioReport {
    pub fn from_run(run: &SimulationRun, assets: &AssetSet, decimals: usize) -> Result<Self> {
        if run.asset_count() != assets.len() {
            return Err(FrontierError::invalid_parameter(format!(
                "run covers {} assets, report was given {}",
                run.asset_count(),
                assets.len()
            )));
        }
        let best = run.optimal()?;
        let sharpe_ratio = best
            .sharpe_ratio
            .ok_or(FrontierError::NoScorableTrials { trials: run.len() })?;

        let allocations = assets
            .iter()
            .zip(best.weights.iter())
            .map(|(asset, weight)| AllocationLine {
                asset: asset.label.clone(),
                weight_pct: round_to(weight * 100.0, decimals),
            })
            .collect();

        Ok(OptimalPortfolioReport {
            trial_id: best.id,
            return_pct: best.return_pct,
            risk_pct: best.risk_pct,
            sharpe_ratio,
            allocations,
            decimals,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| FrontierError::persist(e.to_string()))
    }
}

impl fmt::Display for OptimalPortfolioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(50);
        writeln!(f, "{rule}")?;
        writeln!(f, "Max Sharpe Ratio Portfolio")?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Annualized return: {:.2} %", self.return_pct)?;
        writeln!(f, "Annualized volatility (risk): {:.2} %", self.risk_pct)?;
        writeln!(f, "Sharpe ratio: {:.4}", self.sharpe_ratio)?;
        writeln!(f)?;
        writeln!(f, "--- Asset weights ---")?;
        let width = self.allocations.iter().map(|a| a.asset.len()).max().unwrap_or(0);
        for line in &self.allocations {
            writeln!(
                f,
                "{:<width$}  {:>8.prec$}%",
                line.asset,
                line.weight_pct,
                width = width,
                prec = self.decimals
            )?;
        }
        Ok(())
    }
}

/// Risk/return cloud coloured by Sharpe ratio, optimum drawn as a star.
pub fn frontier_plot(run: &SimulationRun) -> Result<Plot> {
    let best = run.optimal()?;
    let scored: Vec<_> = run
        .trials()
        .iter()
        .filter_map(|t| t.sharpe_ratio.map(|s| (t.risk_pct, t.return_pct, s)))
        .collect();

    let cloud = Scatter::new(
        scored.iter().map(|p| p.0).collect(),
        scored.iter().map(|p| p.1).collect(),
    )
    .mode(Mode::Markers)
    .name("Sampled portfolios")
    .marker(
        Marker::new()
            .size(4)
            .color_array(scored.iter().map(|p| p.2).collect())
            .color_scale(ColorScale::Palette(ColorScalePalette::Viridis))
            .show_scale(true),
    );

    let frontier: Vec<_> = run
        .efficient_frontier()
        .into_iter()
        .filter(|t| t.sharpe_ratio.is_some())
        .collect();
    let envelope = Scatter::new(
        frontier.iter().map(|t| t.risk_pct).collect(),
        frontier.iter().map(|t| t.return_pct).collect(),
    )
    .mode(Mode::Lines)
    .name("Efficient frontier")
    .line(Line::new().color("black").width(2.0));

    let optimum = Scatter::new(vec![best.risk_pct], vec![best.return_pct])
        .mode(Mode::Markers)
        .name("Max Sharpe Ratio Portfolio")
        .marker(Marker::new().symbol(MarkerSymbol::Star).size(20).color("red"));

    let mut plot = Plot::new();
    plot.add_trace(cloud);
    plot.add_trace(envelope);
    plot.add_trace(optimum);
    plot.set_layout(
        Layout::new()
            .title("Efficient frontier and Monte Carlo simulation")
            .x_axis(Axis::new().title("Annualized volatility (risk) [%]"))
            .y_axis(Axis::new().title("Annualized return [%]")),
    );
    Ok(plot)
}

pub fn write_frontier_html(run: &SimulationRun, output_html: impl AsRef<Path>) -> Result<()> {
    let output_html = output_html.as_ref();
    let plot = frontier_plot(run)?;
    if let Some(parent) = output_html.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(output_html, plot.to_html())?;
    info!("wrote frontier plot to {}", output_html.display());
    Ok(())
}
