use std::env;

use crate::completion::GeminiConfig;

pub const DEFAULT_EUR_TO_FCFA: f64 = 656.0;

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub gemini: Option<GeminiConfig>,
    pub eur_to_fcfa: f64,
    /// One extra, shorter coordinate prompt before falling back to the default point.
    pub coordinate_retry: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            gemini: None,
            eur_to_fcfa: DEFAULT_EUR_TO_FCFA,
            coordinate_retry: false,
        }
    }
}

impl PlannerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let eur_to_fcfa = env::var("CAMROUTE_EUR_TO_FCFA")
            .ok()
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|value| value.is_finite() && *value > 0.0)
            .unwrap_or(DEFAULT_EUR_TO_FCFA);
        let coordinate_retry = env::var("CAMROUTE_COORDINATE_RETRY")
            .map(|value| parse_flag(&value))
            .unwrap_or(false);

        Ok(Self {
            gemini: GeminiConfig::from_env()?,
            eur_to_fcfa,
            coordinate_retry,
        })
    }
}

pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
