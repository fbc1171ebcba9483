use std::sync::Arc;
use std::time::Instant;

use camroute_core::{
    Endpoint, FallbackFlags, InvalidInputError, OptimizedRouteResult, RouteQuery, CURRENCY, REGION,
};
use camroute_observability::AppMetrics;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::analyzer::RouteAnalyzer;
use crate::completion::CompletionClient;
use crate::config::PlannerConfig;
use crate::resolver::CoordinateResolver;

/// Resolves both endpoints, then asks for the analysis. Three remote calls at
/// most (five with coordinate retry), awaited one after the other.
#[derive(Clone)]
pub struct RouteOptimizer<C> {
    resolver: CoordinateResolver<C>,
    analyzer: RouteAnalyzer<C>,
    metrics: Arc<AppMetrics>,
}

impl<C> RouteOptimizer<C>
where
    C: CompletionClient + Clone,
{
    pub fn new(client: C, config: &PlannerConfig, metrics: Arc<AppMetrics>) -> Self {
        Self {
            resolver: CoordinateResolver::new(client.clone(), metrics.clone(), config.coordinate_retry),
            analyzer: RouteAnalyzer::new(client, metrics.clone()),
            metrics,
        }
    }

    pub fn resolver(&self) -> &CoordinateResolver<C> {
        &self.resolver
    }

    pub fn analyzer(&self) -> &RouteAnalyzer<C> {
        &self.analyzer
    }

    /// Only blank addresses or an unknown mode are errors; everything the
    /// remote side gets wrong is absorbed into fallbacks.
    pub async fn optimize(
        &self,
        departure: &str,
        destination: &str,
        transport_mode: &str,
    ) -> Result<OptimizedRouteResult, InvalidInputError> {
        let query = RouteQuery::parse(departure, destination, transport_mode)?;
        Ok(self.optimize_query(query).await)
    }

    #[instrument(skip(self, query), fields(mode = %query.transport_mode))]
    pub async fn optimize_query(&self, query: RouteQuery) -> OptimizedRouteResult {
        let started = Instant::now();
        let run_id = Uuid::new_v4();
        self.metrics.inc_request();

        let departure = self.resolver.locate(&query.departure).await;
        let destination = self.resolver.locate(&query.destination).await;
        let analysis = self
            .analyzer
            .assess(&query.departure, &query.destination, query.transport_mode)
            .await;

        let fallbacks = FallbackFlags {
            departure: departure.used_fallback,
            destination: destination.used_fallback,
            analysis: analysis.used_fallback,
        };

        self.metrics.observe_latency(started.elapsed());
        info!(
            run_id = %run_id,
            degraded = fallbacks.any(),
            duration_minutes = analysis.value.primary.duration_minutes,
            distance_km = analysis.value.primary.distance_km,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "route optimized"
        );

        OptimizedRouteResult {
            departure: Endpoint {
                address: query.departure,
                coordinate: departure.value,
            },
            destination: Endpoint {
                address: query.destination,
                coordinate: destination.value,
            },
            transport_mode: query.transport_mode,
            analysis: analysis.value,
            fallbacks,
            currency: CURRENCY.to_string(),
            region: REGION.to_string(),
        }
    }
}
