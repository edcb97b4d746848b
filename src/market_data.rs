use crate::error::{FrontierError, Result};
use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Display name; also the identifier used in reports and exports.
    pub label: String,
    /// Symbol understood by the price provider.
    pub ticker: String,
}

impl Asset {
    pub fn new(label: impl Into<String>, ticker: impl Into<String>) -> Self {
        Asset {
            label: label.into(),
            ticker: ticker.into(),
        }
    }
}

/// Ordered, duplicate-free basket. The order is the index used by weight
/// vectors and the covariance matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSet {
    assets: Vec<Asset>,
}

impl AssetSet {
    pub fn new(assets: Vec<Asset>) -> Result<Self> {
        if assets.is_empty() {
            return Err(FrontierError::invalid_parameter("asset set must not be empty"));
        }
        let mut seen = HashSet::with_capacity(assets.len());
        for asset in &assets {
            if !seen.insert(asset.label.as_str()) {
                return Err(FrontierError::invalid_parameter(format!(
                    "duplicate asset label '{}'",
                    asset.label
                )));
            }
        }
        Ok(AssetSet { assets })
    }

    /// Builds a set whose tickers equal their labels.
    pub fn from_labels<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let assets = labels
            .into_iter()
            .map(|label| {
                let label = label.into();
                Asset::new(label.clone(), label)
            })
            .collect();
        Self::new(assets)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        self.assets.iter()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.assets.iter().map(|a| a.label.as_str()).collect()
    }
}

/// How far back from the most recent date prices are requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookback {
    Days(u32),
    Months(u32),
    Years(u32),
    Max,
}

impl Lookback {
    /// First date inside the window ending at `end`; `None` means unbounded.
    pub fn start_from(&self, end: NaiveDate) -> Option<NaiveDate> {
        match *self {
            Lookback::Days(n) => end.checked_sub_days(Days::new(n as u64)),
            Lookback::Months(n) => end.checked_sub_months(Months::new(n)),
            Lookback::Years(n) => end.checked_sub_months(Months::new(n.saturating_mul(12))),
            Lookback::Max => None,
        }
    }
}

impl FromStr for Lookback {
    type Err = FrontierError;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim().to_ascii_lowercase();
        if raw == "max" {
            return Ok(Lookback::Max);
        }
        let split = raw
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| FrontierError::invalid_parameter(format!("lookback '{s}' has no unit")))?;
        let (digits, unit) = raw.split_at(split);
        let n: u32 = digits
            .parse()
            .map_err(|_| FrontierError::invalid_parameter(format!("lookback '{s}' has no count")))?;
        if n == 0 {
            return Err(FrontierError::invalid_parameter("lookback must be positive"));
        }
        match unit {
            "d" => Ok(Lookback::Days(n)),
            "mo" => Ok(Lookback::Months(n)),
            "y" => Ok(Lookback::Years(n)),
            _ => Err(FrontierError::invalid_parameter(format!(
                "lookback unit '{unit}' not one of d, mo, y"
            ))),
        }
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookback::Days(n) => write!(f, "{n}d"),
            Lookback::Months(n) => write!(f, "{n}mo"),
            Lookback::Years(n) => write!(f, "{n}y"),
            Lookback::Max => write!(f, "max"),
        }
    }
}

/// Date-indexed closing prices, one column per asset. Missing prices are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    asset_count: usize,
    dates: Vec<NaiveDate>,
    rows: Vec<Vec<f64>>,
}

impl PriceTable {
    pub fn new(asset_count: usize, dates: Vec<NaiveDate>, rows: Vec<Vec<f64>>) -> Result<Self> {
        if dates.len() != rows.len() {
            return Err(FrontierError::invalid_parameter(format!(
                "{} dates but {} price rows",
                dates.len(),
                rows.len()
            )));
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != asset_count) {
            return Err(FrontierError::invalid_parameter(format!(
                "price row {} ({}) has {} values, expected {}",
                i,
                dates[i],
                row.len(),
                asset_count
            )));
        }
        if let Some(pair) = dates.windows(2).find(|w| w[0] >= w[1]) {
            return Err(FrontierError::invalid_parameter(format!(
                "dates must be strictly ascending ({} then {})",
                pair[0], pair[1]
            )));
        }
        Ok(PriceTable {
            asset_count,
            dates,
            rows,
        })
    }

    /// Sorts rows by date; duplicate dates are rejected.
    pub fn from_unsorted(asset_count: usize, mut entries: Vec<(NaiveDate, Vec<f64>)>) -> Result<Self> {
        entries.sort_by_key(|(date, _)| *date);
        let (dates, rows) = entries.into_iter().unzip();
        Self::new(asset_count, dates, rows)
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

    pub fn column(&self, asset: usize) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(move |row| row[asset])
    }

    /// Keeps only the rows inside `lookback`, measured from the last date.
    pub fn trimmed(self, lookback: &Lookback) -> Self {
        let Some(&last) = self.dates.last() else {
            return self;
        };
        let Some(start) = lookback.start_from(last) else {
            return self;
        };
        let first_kept = self.dates.partition_point(|d| *d < start);
        PriceTable {
            asset_count: self.asset_count,
            dates: self.dates[first_kept..].to_vec(),
            rows: self.rows[first_kept..].to_vec(),
        }
    }
}

/// Source of historical closes for a basket.
pub trait PriceHistoryProvider {
    fn name(&self) -> &str;

    /// Price table in `assets` order. Any failure is a `DataFetch` error.
    fn fetch(&self, assets: &AssetSet, lookback: &Lookback) -> Result<PriceTable>;
}

pub(crate) fn ensure_usable(provider: &str, assets: &AssetSet, table: &PriceTable) -> Result<()> {
    if table.asset_count() != assets.len() {
        return Err(FrontierError::data_fetch(
            provider,
            format!(
                "table has {} columns for {} assets",
                table.asset_count(),
                assets.len()
            ),
        ));
    }
    if table.is_empty() {
        return Err(FrontierError::data_fetch(provider, "no price rows returned"));
    }
    Ok(())
}

/// Serves a table built in memory.
#[derive(Debug, Clone)]
pub struct InMemoryPriceProvider {
    table: PriceTable,
}

impl InMemoryPriceProvider {
    pub fn new(table: PriceTable) -> Self {
        InMemoryPriceProvider { table }
    }
}

impl PriceHistoryProvider for InMemoryPriceProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn fetch(&self, assets: &AssetSet, lookback: &Lookback) -> Result<PriceTable> {
        let table = self.table.clone().trimmed(lookback);
        ensure_usable(self.name(), assets, &table)?;
        Ok(table)
    }
}

/// Reads closes from a CSV with a `date` column and one column per asset,
/// matched by label first and ticker second.
#[derive(Debug, Clone)]
pub struct CsvPriceProvider {
    path: PathBuf,
}

impl CsvPriceProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvPriceProvider { path: path.into() }
    }

    fn read_table(&self, assets: &AssetSet) -> Result<PriceTable> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        let headers = reader.headers()?.clone();

        let date_col = headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case("date"))
            .unwrap_or(0);

        let mut columns = Vec::with_capacity(assets.len());
        for asset in assets.iter() {
            let col = headers
                .iter()
                .position(|h| h.trim() == asset.label)
                .or_else(|| headers.iter().position(|h| h.trim() == asset.ticker))
                .ok_or_else(|| {
                    FrontierError::data_fetch(
                        self.name(),
                        format!("no column for asset '{}' ({})", asset.label, asset.ticker),
                    )
                })?;
            columns.push(col);
        }

        let mut entries = Vec::new();
        for record in reader.records() {
            let record = record?;
            let raw_date = record.get(date_col).unwrap_or_default().trim();
            // pandas writes timestamps such as "2024-01-04 00:00:00+09:00"
            let date = NaiveDate::parse_from_str(raw_date.get(..10).unwrap_or(raw_date), "%Y-%m-%d")?;
            let prices = columns
                .iter()
                .map(|&col| {
                    record
                        .get(col)
                        .and_then(|cell| cell.trim().parse::<f64>().ok())
                        .unwrap_or(f64::NAN)
                })
                .collect();
            entries.push((date, prices));
        }
        debug!("read {} price rows from {}", entries.len(), self.path.display());
        PriceTable::from_unsorted(assets.len(), entries)
    }
}

impl PriceHistoryProvider for CsvPriceProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(&self, assets: &AssetSet, lookback: &Lookback) -> Result<PriceTable> {
        let table = self
            .read_table(assets)
            .map_err(|e| match e {
                FrontierError::DataFetch { .. } => e,
                other => FrontierError::data_fetch(
                    self.name(),
                    format!("{}: {}", self.path.display(), other),
                ),
            })?
            .trimmed(lookback);
        ensure_usable(self.name(), assets, &table)?;
        info!(
            "loaded {} rows x {} assets from {} (lookback {})",
            table.len(),
            table.asset_count(),
            self.path.display(),
            lookback
        );
        Ok(table)
    }
}
