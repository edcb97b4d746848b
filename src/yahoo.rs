use crate::error::{FrontierError, Result};
use crate::market_data::{AssetSet, Lookback, PriceHistoryProvider, PriceTable, ensure_usable};
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const MAX_ATTEMPTS: usize = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);

// Smallest chart range covering a lookback, in calendar days
const RANGES: [(u32, &str); 8] = [
    (5, "5d"),
    (31, "1mo"),
    (93, "3mo"),
    (186, "6mo"),
    (366, "1y"),
    (732, "2y"),
    (1830, "5y"),
    (3660, "10y"),
];

#[derive(Deserialize, Debug)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Deserialize, Debug)]
struct YahooChart {
    result: Option<Vec<YahooResult>>,
    error: Option<YahooChartError>,
}

#[derive(Deserialize, Debug)]
struct YahooChartError {
    description: Option<String>,
}

#[derive(Deserialize, Debug)]
struct YahooResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: YahooIndicators,
}

#[derive(Deserialize, Debug)]
struct YahooIndicators {
    quote: Vec<YahooQuote>,
}

#[derive(Deserialize, Debug)]
struct YahooQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Daily closes from the Yahoo Finance chart endpoint.
pub struct YahooPriceProvider {
    client: reqwest::blocking::Client,
}

impl YahooPriceProvider {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent("Mozilla/5.0")
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FrontierError::data_fetch("yahoo", e.to_string()))?;
        Ok(YahooPriceProvider { client })
    }

    fn fetch_closes(&self, ticker: &str, range: &str) -> Result<Vec<(NaiveDate, f64)>> {
        let url = format!("{}/{}?range={}&interval=1d", CHART_URL, ticker, range);
        let mut attempts = 0;
        loop {
            attempts += 1;
            let body = self
                .client
                .get(&url)
                .send()
                .and_then(|resp| resp.error_for_status())
                .and_then(|resp| resp.text());
            match body {
                Ok(body) => return parse_chart(ticker, &body),
                Err(e) => {
                    if attempts >= MAX_ATTEMPTS {
                        return Err(FrontierError::data_fetch("yahoo", format!("{}: {}", ticker, e)));
                    }
                    warn!(
                        "Failed to fetch data for {} (attempt {}/{}): {}",
                        ticker, attempts, MAX_ATTEMPTS, e
                    );
                }
            }
            std::thread::sleep(RETRY_DELAY);
        }
    }
}

fn chart_range(lookback: &Lookback) -> &'static str {
    let days = match lookback {
        Lookback::Days(n) => *n,
        Lookback::Months(n) => n.saturating_mul(31),
        Lookback::Years(n) => n.saturating_mul(366),
        Lookback::Max => return "max",
    };
    RANGES
        .iter()
        .find(|(covered, _)| *covered >= days)
        .map(|(_, range)| *range)
        .unwrap_or("max")
}

fn parse_chart(ticker: &str, body: &str) -> Result<Vec<(NaiveDate, f64)>> {
    let response: YahooChartResponse = serde_json::from_str(body)
        .map_err(|e| FrontierError::data_fetch("yahoo", format!("{}: malformed chart response: {}", ticker, e)))?;

    let result = match (response.chart.result, response.chart.error) {
        (Some(mut results), _) if !results.is_empty() => results.swap_remove(0),
        (_, Some(err)) => {
            return Err(FrontierError::data_fetch(
                "yahoo",
                format!("{}: {}", ticker, err.description.unwrap_or_else(|| "unknown error".into())),
            ));
        }
        _ => return Err(FrontierError::data_fetch("yahoo", format!("No data found for {}", ticker))),
    };

    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    Ok(result
        .timestamp
        .iter()
        .zip(closes)
        .filter_map(|(ts, close)| {
            let date = DateTime::from_timestamp(*ts, 0)?.date_naive();
            Some((date, close.unwrap_or(f64::NAN)))
        })
        .collect())
}

/// Outer join on date; a ticker without a quote on a date gets NaN.
fn join_closes(series: Vec<Vec<(NaiveDate, f64)>>) -> Result<PriceTable> {
    let width = series.len();
    let mut by_date: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for (asset, closes) in series.into_iter().enumerate() {
        for (date, close) in closes {
            by_date.entry(date).or_insert_with(|| vec![f64::NAN; width])[asset] = close;
        }
    }
    let (dates, rows) = by_date.into_iter().unzip();
    PriceTable::new(width, dates, rows)
}

impl PriceHistoryProvider for YahooPriceProvider {
    fn name(&self) -> &str {
        "yahoo"
    }

    fn fetch(&self, assets: &AssetSet, lookback: &Lookback) -> Result<PriceTable> {
        let range = chart_range(lookback);
        let mut series = Vec::with_capacity(assets.len());
        for asset in assets.iter() {
            let closes = self.fetch_closes(&asset.ticker, range)?;
            if closes.is_empty() {
                return Err(FrontierError::data_fetch(
                    self.name(),
                    format!("No data found for {}", asset.ticker),
                ));
            }
            debug!("{}: {} closes (range {})", asset.ticker, closes.len(), range);
            series.push(closes);
        }

        let table = join_closes(series)?.trimmed(lookback);
        ensure_usable(self.name(), assets, &table)?;
        info!("fetched {} aligned rows for {} tickers", table.len(), assets.len());
        Ok(table)
    }
}
