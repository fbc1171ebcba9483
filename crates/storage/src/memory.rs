use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use camroute_core::{
    Location, LocationDeletion, LocationSummary, NewLocation, NewRouteRequest,
    OptimizedRouteResult, Page, PopularLocation, RouteHistory, RouteRequestRecord, Statistics,
    StoredRoute, TransportMode, TransportModeStats,
};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use crate::{
    history_stats, matches_search, route_columns, LocationRepository, PageRequest,
    RouteRepository, POPULAR_LOCATIONS_LIMIT, RECENT_WINDOW_DAYS,
};

#[derive(Debug, Clone)]
struct RouteRow {
    id: i64,
    request_id: i64,
    result: OptimizedRouteResult,
    distance_km: f64,
    duration_minutes: i64,
    cost_fcfa: f64,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MemoryState {
    last_location_id: i64,
    last_request_id: i64,
    last_route_id: i64,
    locations: BTreeMap<i64, Location>,
    requests: BTreeMap<i64, RouteRequestRecord>,
    routes: BTreeMap<i64, RouteRow>,
}

impl MemoryState {
    fn stored_route(&self, row: &RouteRow) -> Option<StoredRoute> {
        let request = self.requests.get(&row.request_id)?;
        let departure = self.locations.get(&request.departure_id)?;
        let destination = self.locations.get(&request.destination_id)?;

        Some(StoredRoute {
            id: row.id,
            request: request.clone(),
            departure: LocationSummary::from(departure),
            destination: LocationSummary::from(destination),
            result: row.result.clone(),
            distance_km: row.distance_km,
            duration_minutes: row.duration_minutes,
            cost_fcfa: row.cost_fcfa,
            created_at: row.created_at,
        })
    }

    fn newest_locations(&self) -> Vec<Location> {
        let mut locations: Vec<Location> = self.locations.values().cloned().collect();
        locations.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        locations
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocationRepository for MemoryStore {
    async fn insert_location(&self, location: NewLocation) -> Result<Location> {
        let mut state = self.state.write();
        state.last_location_id += 1;
        let stored = Location {
            id: state.last_location_id,
            name: location.name,
            address: location.address,
            latitude: location.latitude,
            longitude: location.longitude,
            created_at: Utc::now(),
        };
        state.locations.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_location(&self, id: i64) -> Result<Option<Location>> {
        Ok(self.state.read().locations.get(&id).cloned())
    }

    async fn update_location(&self, id: i64, location: NewLocation) -> Result<Option<Location>> {
        let mut state = self.state.write();
        let Some(existing) = state.locations.get_mut(&id) else {
            return Ok(None);
        };
        existing.name = location.name;
        existing.address = location.address;
        existing.latitude = location.latitude;
        existing.longitude = location.longitude;
        Ok(Some(existing.clone()))
    }

    async fn delete_location(&self, id: i64) -> Result<Option<LocationDeletion>> {
        let mut state = self.state.write();
        let Some(location) = state.locations.remove(&id) else {
            return Ok(None);
        };

        let doomed: Vec<i64> = state
            .requests
            .values()
            .filter(|request| request.departure_id == id || request.destination_id == id)
            .map(|request| request.id)
            .collect();
        for request_id in &doomed {
            state.requests.remove(request_id);
        }
        state
            .routes
            .retain(|_, row| !doomed.contains(&row.request_id));

        Ok(Some(LocationDeletion {
            location: LocationSummary::from(&location),
            affected_route_requests: doomed.len(),
        }))
    }

    async fn list_locations(&self, search: Option<&str>, page: PageRequest) -> Result<Page<Location>> {
        let locations: Vec<Location> = self
            .state
            .read()
            .newest_locations()
            .into_iter()
            .filter(|location| search.map_or(true, |term| matches_search(location, term)))
            .collect();
        Ok(page.slice(locations))
    }

    async fn all_locations(&self) -> Result<Vec<Location>> {
        Ok(self.state.read().newest_locations())
    }
}

impl RouteRepository for MemoryStore {
    async fn insert_route_request(&self, request: NewRouteRequest) -> Result<RouteRequestRecord> {
        let mut state = self.state.write();
        for location_id in [request.departure_id, request.destination_id] {
            if !state.locations.contains_key(&location_id) {
                return Err(anyhow!("location {location_id} does not exist"));
            }
        }

        state.last_request_id += 1;
        let record = RouteRequestRecord {
            id: state.last_request_id,
            departure_id: request.departure_id,
            destination_id: request.destination_id,
            transport_mode: request.transport_mode,
            user_id: request.user_id,
            created_at: Utc::now(),
        };
        state.requests.insert(record.id, record.clone());
        Ok(record)
    }

    async fn insert_route(
        &self,
        request: &RouteRequestRecord,
        result: &OptimizedRouteResult,
    ) -> Result<StoredRoute> {
        let mut state = self.state.write();
        if state.routes.values().any(|row| row.request_id == request.id) {
            return Err(anyhow!("route request {} already has a route", request.id));
        }

        let (distance_km, duration_minutes, cost_fcfa) = route_columns(result);
        state.last_route_id += 1;
        let row = RouteRow {
            id: state.last_route_id,
            request_id: request.id,
            result: result.clone(),
            distance_km,
            duration_minutes,
            cost_fcfa,
            created_at: Utc::now(),
        };

        let stored = state
            .stored_route(&row)
            .ok_or_else(|| anyhow!("route request {} no longer exists", request.id))?;
        state.routes.insert(row.id, row);
        Ok(stored)
    }

    async fn get_route(&self, id: i64) -> Result<Option<StoredRoute>> {
        let state = self.state.read();
        Ok(state.routes.get(&id).and_then(|row| state.stored_route(row)))
    }

    async fn route_history(&self, user_id: Option<&str>, page: PageRequest) -> Result<RouteHistory> {
        let state = self.state.read();
        let mut routes: Vec<StoredRoute> = state
            .routes
            .values()
            .filter_map(|row| state.stored_route(row))
            .filter(|route| user_id.map_or(true, |user| route.request.user_id.as_deref() == Some(user)))
            .collect();
        routes.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let stats = history_stats(routes.iter().map(|route| (route.distance_km, route.cost_fcfa)));
        Ok(RouteHistory {
            routes: page.slice(routes),
            stats,
        })
    }

    async fn statistics(&self, now: DateTime<Utc>) -> Result<Statistics> {
        let state = self.state.read();
        let since = now - Duration::days(RECENT_WINDOW_DAYS);

        let mut by_mode: HashMap<TransportMode, (usize, Vec<f64>, Vec<f64>)> = HashMap::new();
        for request in state.requests.values() {
            let entry = by_mode.entry(request.transport_mode).or_default();
            entry.0 += 1;
            if let Some(row) = state.routes.values().find(|row| row.request_id == request.id) {
                entry.1.push(row.distance_km);
                entry.2.push(row.cost_fcfa);
            }
        }
        let mut transport_modes: Vec<TransportModeStats> = by_mode
            .into_iter()
            .map(|(transport_mode, (count, distances, costs))| TransportModeStats {
                transport_mode,
                count,
                avg_distance_km: mean(&distances),
                avg_cost_fcfa: mean(&costs),
            })
            .collect();
        transport_modes.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.transport_mode.as_code().cmp(b.transport_mode.as_code()))
        });

        let mut popular_locations: Vec<(i64, PopularLocation)> = state
            .locations
            .values()
            .map(|location| {
                let departure_count = state
                    .requests
                    .values()
                    .filter(|request| request.departure_id == location.id)
                    .count();
                let destination_count = state
                    .requests
                    .values()
                    .filter(|request| request.destination_id == location.id)
                    .count();
                (
                    location.id,
                    PopularLocation {
                        location: LocationSummary::from(location),
                        departure_count,
                        destination_count,
                    },
                )
            })
            .collect();
        popular_locations.sort_by(|(a_id, a), (b_id, b)| {
            b.departure_count
                .cmp(&a.departure_count)
                .then_with(|| b.destination_count.cmp(&a.destination_count))
                .then_with(|| a_id.cmp(b_id))
        });
        popular_locations.truncate(POPULAR_LOCATIONS_LIMIT);

        Ok(Statistics {
            total_locations: state.locations.len(),
            total_routes: state.routes.len(),
            recent_routes: state
                .routes
                .values()
                .filter(|row| row.created_at >= since)
                .count(),
            transport_modes,
            popular_locations: popular_locations
                .into_iter()
                .map(|(_, popular)| popular)
                .collect(),
        })
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
