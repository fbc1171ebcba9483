use camroute_core::MalformedResponse;
use camroute_observability::AppMetrics;
use thiserror::Error;

use crate::completion::{CompletionClient, CompletionError};

/// Why a single prompt/answer round trip produced nothing usable.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Malformed(#[from] MalformedResponse),
}

/// A value together with whether it is the deterministic default.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub used_fallback: bool,
}

impl<T> Outcome<T> {
    pub fn remote(value: T) -> Self {
        Self {
            value,
            used_fallback: false,
        }
    }

    pub fn fallback(value: T) -> Self {
        Self {
            value,
            used_fallback: true,
        }
    }
}

pub(crate) async fn ask<C, T, F>(
    client: &C,
    metrics: &AppMetrics,
    prompt: &str,
    parse: F,
) -> Result<T, ExchangeError>
where
    C: CompletionClient,
    F: FnOnce(&str) -> Result<T, MalformedResponse>,
{
    metrics.inc_completion_call();
    let text = client.complete(prompt).await.inspect_err(|_| {
        metrics.inc_completion_failure();
    })?;
    Ok(parse(&text)?)
}
