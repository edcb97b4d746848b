// Tolerances
pub const FLOAT_COMPARISON_EPSILON: f64 = 1e-12;
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;
pub const SYMMETRY_TOLERANCE: f64 = 1e-10;

// Defaults carried over from the reference analysis
pub const DEFAULT_TRIAL_COUNT: usize = 50_000;
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.0;
pub const DEFAULT_TRADING_DAYS_PER_YEAR: f64 = 250.0;
pub const DEFAULT_LOOKBACK: &str = "5y";
pub const DEFAULT_WEIGHT_DECIMALS: usize = 2;

/// Trials generated by one parallel worker stream.
pub const DEFAULT_CHUNK_SIZE: usize = 4_096;

pub const DEFAULT_ASSETS: &[(&str, &str)] = &[
    ("Toyota", "7203.T"),
    ("Sony", "6758.T"),
    ("SoftBank Group", "9984.T"),
    ("MUFG", "8306.T"),
    ("NTT", "9432.T"),
];
