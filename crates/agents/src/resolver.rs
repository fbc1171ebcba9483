use std::sync::Arc;

use camroute_core::{
    coordinate_prompt, coordinate_retry_prompt, parse_coordinate, BoundingBox, Coordinate,
    CAMEROON_BOUNDS, DEFAULT_COORDINATE,
};
use camroute_observability::{AppMetrics, FallbackKind};
use tracing::{debug, warn};

use crate::completion::CompletionClient;
use crate::exchange::{ask, Outcome};

/// Turns a free-text address into a coordinate inside the service area.
#[derive(Clone)]
pub struct CoordinateResolver<C> {
    client: C,
    metrics: Arc<AppMetrics>,
    bounds: BoundingBox,
    retry: bool,
}

impl<C> CoordinateResolver<C>
where
    C: CompletionClient,
{
    pub fn new(client: C, metrics: Arc<AppMetrics>, retry: bool) -> Self {
        Self {
            client,
            metrics,
            bounds: CAMEROON_BOUNDS,
            retry,
        }
    }

    /// Never fails: any problem yields the default coordinate.
    pub async fn resolve(&self, address: &str) -> Coordinate {
        self.locate(address).await.value
    }

    pub async fn locate(&self, address: &str) -> Outcome<Coordinate> {
        let parse = |text: &str| parse_coordinate(text, &self.bounds);

        let first = ask(&self.client, &self.metrics, &coordinate_prompt(address), parse).await;
        let error = match first {
            Ok(coordinate) => return Outcome::remote(coordinate),
            Err(error) => error,
        };

        let error = if self.retry {
            debug!(address, error = %error, "retrying coordinate lookup");
            match ask(&self.client, &self.metrics, &coordinate_retry_prompt(address), parse).await {
                Ok(coordinate) => return Outcome::remote(coordinate),
                Err(error) => error,
            }
        } else {
            error
        };

        warn!(address, error = %error, "coordinate lookup failed, using default coordinate");
        self.metrics.inc_fallback(FallbackKind::Coordinate);
        Outcome::fallback(DEFAULT_COORDINATE)
    }
}
