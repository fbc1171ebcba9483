use std::sync::Arc;

use camroute_core::{
    locations_map, route_map, sample_locations, search_term, validate_distinct_endpoints,
    validate_new_location, InvalidInputError, Location, LocationDeletion, MapView, NewLocation,
    NewRouteRequest, OptimizedRouteResult, Page, RouteComparison, RouteHistory, RouteQuery,
    Statistics, StoredRoute, TransportMode,
};
use camroute_observability::AppMetrics;
use camroute_storage::{
    LocationRepository, PageRequest, RouteRepository, LOCATIONS_PER_PAGE, QUICK_SEARCH_LIMIT,
    ROUTES_PER_PAGE,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};

use crate::completion::CompletionClient;
use crate::config::PlannerConfig;
use crate::optimizer::RouteOptimizer;

pub const MIN_COMPARED_ROUTES: usize = 2;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error(transparent)]
    InvalidInput(#[from] InvalidInputError),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl PlannerError {
    fn location(id: i64) -> Self {
        Self::NotFound {
            entity: "location",
            id,
        }
    }

    fn route(id: i64) -> Self {
        Self::NotFound { entity: "route", id }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRouteRequest {
    pub departure_id: i64,
    pub destination_id: i64,
    pub transport_mode: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDetail {
    pub route: StoredRoute,
    pub map: MapView,
    pub cost_eur: Option<f64>,
}

/// Route planning backed by a location/route store.
pub struct RoutePlanner<S, C> {
    store: Arc<S>,
    optimizer: RouteOptimizer<C>,
    metrics: Arc<AppMetrics>,
    eur_to_fcfa: f64,
}

impl<S, C> Clone for RoutePlanner<S, C>
where
    C: Clone,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            optimizer: self.optimizer.clone(),
            metrics: self.metrics.clone(),
            eur_to_fcfa: self.eur_to_fcfa,
        }
    }
}

impl<S, C> RoutePlanner<S, C>
where
    S: LocationRepository + RouteRepository,
    C: CompletionClient + Clone,
{
    pub fn new(store: Arc<S>, client: C, config: &PlannerConfig, metrics: Arc<AppMetrics>) -> Self {
        Self {
            store,
            optimizer: RouteOptimizer::new(client, config, metrics.clone()),
            metrics,
            eur_to_fcfa: config.eur_to_fcfa,
        }
    }

    pub fn optimizer(&self) -> &RouteOptimizer<C> {
        &self.optimizer
    }

    pub fn metrics(&self) -> &Arc<AppMetrics> {
        &self.metrics
    }

    #[instrument(skip(self, request), fields(departure_id = request.departure_id, destination_id = request.destination_id))]
    pub async fn plan_route(&self, request: PlanRouteRequest) -> Result<RouteDetail, PlannerError> {
        let transport_mode: TransportMode = request.transport_mode.parse()?;
        validate_distinct_endpoints(request.departure_id, request.destination_id)?;

        let departure = self.require_location(request.departure_id).await?;
        let destination = self.require_location(request.destination_id).await?;

        let record = self
            .store
            .insert_route_request(NewRouteRequest {
                departure_id: departure.id,
                destination_id: destination.id,
                transport_mode,
                user_id: request
                    .user_id
                    .map(|user| user.trim().to_string())
                    .filter(|user| !user.is_empty()),
            })
            .await?;

        let query = RouteQuery::parse(
            &departure.address,
            &destination.address,
            transport_mode.as_code(),
        )?;
        let result = self.optimizer.optimize_query(query).await;
        let route = self.store.insert_route(&record, &result).await?;
        self.metrics.inc_route_persisted();

        info!(
            route_id = route.id,
            request_id = record.id,
            degraded = route.result.fallbacks.any(),
            "route persisted"
        );

        Ok(self.detail(route))
    }

    /// Runs the optimizer on raw addresses without touching storage.
    pub async fn preview(
        &self,
        departure: &str,
        destination: &str,
        transport_mode: &str,
    ) -> Result<OptimizedRouteResult, PlannerError> {
        Ok(self
            .optimizer
            .optimize(departure, destination, transport_mode)
            .await?)
    }

    pub async fn create_location(&self, draft: NewLocation) -> Result<Location, PlannerError> {
        let draft = validate_new_location(draft)?;
        let location = self.store.insert_location(draft).await?;
        info!(location_id = location.id, name = %location.name, "location created");
        Ok(location)
    }

    pub async fn get_location(&self, id: i64) -> Result<Location, PlannerError> {
        self.require_location(id).await
    }

    pub async fn update_location(&self, id: i64, draft: NewLocation) -> Result<Location, PlannerError> {
        let draft = validate_new_location(draft)?;
        self.store
            .update_location(id, draft)
            .await?
            .ok_or_else(|| PlannerError::location(id))
    }

    pub async fn delete_location(&self, id: i64) -> Result<LocationDeletion, PlannerError> {
        let deletion = self
            .store
            .delete_location(id)
            .await?
            .ok_or_else(|| PlannerError::location(id))?;
        info!(
            location_id = id,
            affected_route_requests = deletion.affected_route_requests,
            "location deleted"
        );
        Ok(deletion)
    }

    pub async fn list_locations(
        &self,
        search: Option<&str>,
        page: Option<&str>,
    ) -> Result<Page<Location>, PlannerError> {
        let search = search
            .map(camroute_core::normalize_text)
            .filter(|term| !term.is_empty());
        Ok(self
            .store
            .list_locations(search.as_deref(), PageRequest::parse(page, LOCATIONS_PER_PAGE))
            .await?)
    }

    /// Short type-ahead lookup; queries under two characters return nothing.
    pub async fn quick_search(&self, query: Option<&str>) -> Result<Vec<Location>, PlannerError> {
        let Some(term) = search_term(query) else {
            return Ok(Vec::new());
        };
        let page = self
            .store
            .list_locations(Some(&term), PageRequest::new(1, QUICK_SEARCH_LIMIT))
            .await?;
        Ok(page.items)
    }

    pub async fn route_history(
        &self,
        user_id: Option<&str>,
        page: Option<&str>,
    ) -> Result<RouteHistory, PlannerError> {
        let user_id = user_id.map(str::trim).filter(|user| !user.is_empty());
        Ok(self
            .store
            .route_history(user_id, PageRequest::parse(page, ROUTES_PER_PAGE))
            .await?)
    }

    pub async fn route_detail(&self, id: i64) -> Result<RouteDetail, PlannerError> {
        let route = self
            .store
            .get_route(id)
            .await?
            .ok_or_else(|| PlannerError::route(id))?;
        Ok(self.detail(route))
    }

    pub async fn compare_routes(&self, ids: &[i64]) -> Result<RouteComparison, PlannerError> {
        let mut unique = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(id) {
                unique.push(*id);
            }
        }
        if unique.len() < MIN_COMPARED_ROUTES {
            return Err(InvalidInputError::new(
                "ids",
                format!("select at least {MIN_COMPARED_ROUTES} different routes to compare"),
            )
            .into());
        }

        let mut routes = Vec::with_capacity(unique.len());
        for id in unique {
            let route = self
                .store
                .get_route(id)
                .await?
                .ok_or_else(|| PlannerError::route(id))?;
            routes.push(route);
        }

        Ok(RouteComparison {
            fastest_id: best_by(&routes, |route| route.duration_minutes as f64),
            shortest_id: best_by(&routes, |route| route.distance_km),
            cheapest_id: best_by(&routes, |route| route.cost_fcfa),
            routes,
        })
    }

    pub async fn statistics(&self) -> Result<Statistics, PlannerError> {
        Ok(self.store.statistics(Utc::now()).await?)
    }

    pub async fn locations_map(&self) -> Result<MapView, PlannerError> {
        let locations = self.store.all_locations().await?;
        Ok(locations_map(&locations))
    }

    /// Inserts the sample catalogue when no location exists yet.
    pub async fn seed_sample_locations(&self) -> Result<Vec<Location>, PlannerError> {
        let existing = self
            .store
            .list_locations(None, PageRequest::new(1, 1))
            .await?;
        if existing.total > 0 {
            info!(existing = existing.total, "catalogue not empty, skipping sample data");
            return Ok(Vec::new());
        }

        let mut created = Vec::new();
        for draft in sample_locations() {
            created.push(self.store.insert_location(draft).await?);
        }
        info!(created = created.len(), "sample locations seeded");
        Ok(created)
    }

    async fn require_location(&self, id: i64) -> Result<Location, PlannerError> {
        self.store
            .get_location(id)
            .await?
            .ok_or_else(|| PlannerError::location(id))
    }

    fn detail(&self, route: StoredRoute) -> RouteDetail {
        RouteDetail {
            map: route_map(&route.result),
            cost_eur: route.result.cost_in_eur(self.eur_to_fcfa),
            route,
        }
    }
}

/// Id of the route with the smallest metric; the first one wins ties.
fn best_by(routes: &[StoredRoute], metric: impl Fn(&StoredRoute) -> f64) -> i64 {
    routes
        .iter()
        .fold(None::<&StoredRoute>, |best, route| match best {
            Some(current) if metric(current) <= metric(route) => Some(current),
            _ => Some(route),
        })
        .map(|route| route.id)
        .unwrap_or_default()
}
