mod memory;
mod sqlite;

use anyhow::Result;
use camroute_core::{
    Location, LocationDeletion, NewLocation, NewRouteRequest, OptimizedRouteResult, Page,
    RouteHistory, RouteHistoryStats, RouteRequestRecord, Statistics, StoredRoute,
};
use chrono::{DateTime, Utc};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub const LOCATIONS_PER_PAGE: usize = 12;
pub const ROUTES_PER_PAGE: usize = 10;
pub const QUICK_SEARCH_LIMIT: usize = 10;
pub const POPULAR_LOCATIONS_LIMIT: usize = 10;
pub const RECENT_WINDOW_DAYS: i64 = 30;

pub trait LocationRepository: Send + Sync {
    async fn insert_location(&self, location: NewLocation) -> Result<Location>;
    async fn get_location(&self, id: i64) -> Result<Option<Location>>;
    async fn update_location(&self, id: i64, location: NewLocation) -> Result<Option<Location>>;
    /// Removes the location together with every route request and route that used it.
    async fn delete_location(&self, id: i64) -> Result<Option<LocationDeletion>>;
    async fn list_locations(&self, search: Option<&str>, page: PageRequest) -> Result<Page<Location>>;
    async fn all_locations(&self) -> Result<Vec<Location>>;
}

pub trait RouteRepository: Send + Sync {
    async fn insert_route_request(&self, request: NewRouteRequest) -> Result<RouteRequestRecord>;
    async fn insert_route(
        &self,
        request: &RouteRequestRecord,
        result: &OptimizedRouteResult,
    ) -> Result<StoredRoute>;
    async fn get_route(&self, id: i64) -> Result<Option<StoredRoute>>;
    async fn route_history(&self, user_id: Option<&str>, page: PageRequest) -> Result<RouteHistory>;
    async fn statistics(&self, now: DateTime<Utc>) -> Result<Statistics>;
}

/// A 1-based page number and page size, clamped against the row count when resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub per_page: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PageWindow {
    pub page: usize,
    pub total_pages: usize,
    pub offset: usize,
}

impl PageRequest {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self {
            page,
            per_page: per_page.max(1),
        }
    }

    /// Lenient query-string parsing: anything that is not a positive integer means page 1.
    pub fn parse(raw: Option<&str>, per_page: usize) -> Self {
        let page = raw
            .and_then(|value| value.trim().parse::<usize>().ok())
            .filter(|page| *page > 0)
            .unwrap_or(1);
        Self::new(page, per_page)
    }

    pub(crate) fn window(&self, total: usize) -> PageWindow {
        let total_pages = total.div_ceil(self.per_page).max(1);
        let page = self.page.clamp(1, total_pages);
        PageWindow {
            page,
            total_pages,
            offset: (page - 1) * self.per_page,
        }
    }

    pub(crate) fn slice<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len();
        let window = self.window(total);
        let items = items
            .into_iter()
            .skip(window.offset)
            .take(self.per_page)
            .collect();
        self.page_of(items, window, total)
    }

    pub(crate) fn page_of<T>(&self, items: Vec<T>, window: PageWindow, total: usize) -> Page<T> {
        Page {
            items,
            page: window.page,
            per_page: self.per_page,
            total,
            total_pages: window.total_pages,
        }
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub(crate) fn history_stats(rows: impl IntoIterator<Item = (f64, f64)>) -> RouteHistoryStats {
    let mut stats = RouteHistoryStats::default();
    for (distance, cost) in rows {
        stats.total_routes += 1;
        stats.total_distance_km += distance;
        stats.total_cost_fcfa += cost;
    }
    if stats.total_routes > 0 {
        stats.avg_distance_km = round2(stats.total_distance_km / stats.total_routes as f64);
    }
    stats
}

/// The denormalized numeric columns stored beside each route's JSON result.
pub(crate) fn route_columns(result: &OptimizedRouteResult) -> (f64, i64, f64) {
    let primary = &result.analysis.primary;
    (
        primary.distance_km,
        primary.duration_minutes.round() as i64,
        primary.cost_fcfa,
    )
}

pub(crate) fn matches_search(location: &Location, term: &str) -> bool {
    let term = term.to_lowercase();
    location.name.to_lowercase().contains(&term) || location.address.to_lowercase().contains(&term)
}

#[derive(Clone)]
pub enum Store {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl Store {
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::new())
    }

    pub async fn sqlite(database_url: &str) -> Result<Self> {
        let sqlite = SqliteStore::connect(database_url).await?;
        Ok(Self::Sqlite(sqlite))
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Store::Memory(_) => "memory",
            Store::Sqlite(_) => "sqlite",
        }
    }
}

impl LocationRepository for Store {
    async fn insert_location(&self, location: NewLocation) -> Result<Location> {
        match self {
            Store::Memory(store) => store.insert_location(location).await,
            Store::Sqlite(store) => store.insert_location(location).await,
        }
    }

    async fn get_location(&self, id: i64) -> Result<Option<Location>> {
        match self {
            Store::Memory(store) => store.get_location(id).await,
            Store::Sqlite(store) => store.get_location(id).await,
        }
    }

    async fn update_location(&self, id: i64, location: NewLocation) -> Result<Option<Location>> {
        match self {
            Store::Memory(store) => store.update_location(id, location).await,
            Store::Sqlite(store) => store.update_location(id, location).await,
        }
    }

    async fn delete_location(&self, id: i64) -> Result<Option<LocationDeletion>> {
        match self {
            Store::Memory(store) => store.delete_location(id).await,
            Store::Sqlite(store) => store.delete_location(id).await,
        }
    }

    async fn list_locations(&self, search: Option<&str>, page: PageRequest) -> Result<Page<Location>> {
        match self {
            Store::Memory(store) => store.list_locations(search, page).await,
            Store::Sqlite(store) => store.list_locations(search, page).await,
        }
    }

    async fn all_locations(&self) -> Result<Vec<Location>> {
        match self {
            Store::Memory(store) => store.all_locations().await,
            Store::Sqlite(store) => store.all_locations().await,
        }
    }
}

impl RouteRepository for Store {
    async fn insert_route_request(&self, request: NewRouteRequest) -> Result<RouteRequestRecord> {
        match self {
            Store::Memory(store) => store.insert_route_request(request).await,
            Store::Sqlite(store) => store.insert_route_request(request).await,
        }
    }

    async fn insert_route(
        &self,
        request: &RouteRequestRecord,
        result: &OptimizedRouteResult,
    ) -> Result<StoredRoute> {
        match self {
            Store::Memory(store) => store.insert_route(request, result).await,
            Store::Sqlite(store) => store.insert_route(request, result).await,
        }
    }

    async fn get_route(&self, id: i64) -> Result<Option<StoredRoute>> {
        match self {
            Store::Memory(store) => store.get_route(id).await,
            Store::Sqlite(store) => store.get_route(id).await,
        }
    }

    async fn route_history(&self, user_id: Option<&str>, page: PageRequest) -> Result<RouteHistory> {
        match self {
            Store::Memory(store) => store.route_history(user_id, page).await,
            Store::Sqlite(store) => store.route_history(user_id, page).await,
        }
    }

    async fn statistics(&self, now: DateTime<Utc>) -> Result<Statistics> {
        match self {
            Store::Memory(store) => store.statistics(now).await,
            Store::Sqlite(store) => store.statistics(now).await,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use camroute_core::{
        Coordinate, Endpoint, FallbackFlags, NewLocation, OptimizedRouteResult, RouteAnalysis,
        TransportMode, CURRENCY, REGION,
    };

    pub fn draft(name: &str, address: &str) -> NewLocation {
        NewLocation {
            name: name.to_string(),
            address: address.to_string(),
            latitude: 4.05,
            longitude: 9.7,
        }
    }

    pub fn result(duration: f64, distance: f64, cost: f64) -> OptimizedRouteResult {
        let mut analysis = RouteAnalysis::fallback();
        analysis.primary.duration_minutes = duration;
        analysis.primary.distance_km = distance;
        analysis.primary.cost_fcfa = cost;
        OptimizedRouteResult {
            departure: Endpoint {
                address: "Douala".to_string(),
                coordinate: Coordinate::new(4.05, 9.7),
            },
            destination: Endpoint {
                address: "Yaoundé".to_string(),
                coordinate: Coordinate::new(3.87, 11.52),
            },
            transport_mode: TransportMode::Car,
            analysis,
            fallbacks: FallbackFlags::default(),
            currency: CURRENCY.to_string(),
            region: REGION.to_string(),
        }
    }
}
