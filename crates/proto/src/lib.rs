use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Key used for the factor that applies to every monitor.
pub const ALL_MONITORS: &str = "ALL";

/// Per-monitor scale factors, keyed by output name.
pub type ScreenScaleFactors = BTreeMap<String, f64>;

/// Request body for setting a single scale factor for all monitors.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SetScaleFactorRequest {
    pub scale: f64,
}

/// Response carrying the current single scale factor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScaleFactorResponse {
    pub scale: f64,
}

/// Request body for setting per-monitor factors. The map must contain the primary monitor
/// (or the `ALL` key) for the single factor to be meaningful.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SetScreenScaleFactorsRequest {
    pub factors: ScreenScaleFactors,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScreenScaleFactorsResponse {
    pub factors: ScreenScaleFactors,
}

/// Snapshot of the boot-splash re-theming queue.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    /// A worker is currently running.
    pub active: bool,
    /// The latest factor waiting for the running worker to finish.
    pub pending: Option<u8>,
    /// Number of pending factors replaced by a later one before being applied.
    pub superseded: u64,
}

/// Signals emitted around a boot-splash re-theming operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleSignal {
    #[serde(rename = "SetScaleFactorStarted")]
    Started,
    #[serde(rename = "SetScaleFactorDone")]
    Done,
}

impl ScaleSignal {
    pub fn name(&self) -> &'static str {
        match self {
            ScaleSignal::Started => "SetScaleFactorStarted",
            ScaleSignal::Done => "SetScaleFactorDone",
        }
    }
}

/// Parse a `name=factor;name=factor` string. Malformed pairs are skipped.
pub fn parse_screen_factors(s: &str) -> ScreenScaleFactors {
    let mut result = ScreenScaleFactors::new();
    for pair in s.split(';') {
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        match value.parse::<f64>() {
            Ok(v) => {
                result.insert(name.to_string(), v);
            }
            Err(e) => warn!("skipping scale factor for {}: {}", name, e),
        }
    }
    result
}

pub fn join_screen_scale_factors(factors: &ScreenScaleFactors) -> String {
    factors
        .iter()
        .map(|(name, value)| format!("{}={:.2}", name, value))
        .collect::<Vec<_>>()
        .join(";")
}

/// Pick the factor that represents the whole session: the only entry, the `ALL` entry, or 1.0.
pub fn single_scale_factor(factors: &ScreenScaleFactors) -> f64 {
    match factors.len() {
        0 => 1.0,
        1 => factors.values().next().copied().unwrap_or(1.0),
        _ => factors.get(ALL_MONITORS).copied().unwrap_or(1.0),
    }
}

pub fn single_to_factors(scale: f64) -> ScreenScaleFactors {
    ScreenScaleFactors::from([(ALL_MONITORS.to_string(), scale)])
}
