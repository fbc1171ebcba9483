use std::str::FromStr;

use anyhow::{Context, Result};
use camroute_core::{
    Location, LocationDeletion, LocationSummary, NewLocation, NewRouteRequest,
    OptimizedRouteResult, Page, PopularLocation, RouteHistory, RouteHistoryStats,
    RouteRequestRecord, Statistics, StoredRoute, TransportMode, TransportModeStats,
};
use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::{
    round2, route_columns, LocationRepository, PageRequest, RouteRepository,
    POPULAR_LOCATIONS_LIMIT, RECENT_WINDOW_DAYS,
};

const ROUTE_SELECT: &str = r#"
    SELECT r.id, r.route_data, r.distance, r.duration, r.cost_estimate, r.created_at,
           q.id AS request_id, q.departure_id, q.destination_id, q.transport_mode,
           q.user_id, q.created_at AS request_created_at,
           d.name AS departure_name, d.address AS departure_address,
           a.name AS destination_name, a.address AS destination_address
    FROM optimized_routes r
    JOIN route_requests q ON q.id = r.route_request_id
    JOIN locations d ON d.id = q.departure_id
    JOIN locations a ON a.id = q.destination_id
"#;

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid sqlite url {}", database_url))?
            .create_if_missing(true)
            .foreign_keys(true);

        // An in-memory database lives and dies with its single connection.
        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("failed connecting to sqlite at {}", database_url))?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS locations (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              name TEXT NOT NULL,
              address TEXT NOT NULL,
              latitude REAL NOT NULL,
              longitude REAL NOT NULL,
              created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS route_requests (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              departure_id INTEGER NOT NULL REFERENCES locations(id) ON DELETE CASCADE,
              destination_id INTEGER NOT NULL REFERENCES locations(id) ON DELETE CASCADE,
              transport_mode TEXT NOT NULL,
              user_id TEXT,
              created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS optimized_routes (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              route_request_id INTEGER NOT NULL UNIQUE REFERENCES route_requests(id) ON DELETE CASCADE,
              route_data TEXT NOT NULL,
              distance REAL NOT NULL,
              duration INTEGER NOT NULL,
              cost_estimate REAL NOT NULL,
              created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Current time at the precision the text columns keep.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("invalid stored timestamp {}", raw))?
        .with_timezone(&Utc))
}

fn parse_mode(raw: &str) -> Result<TransportMode> {
    TransportMode::parse(raw).with_context(|| format!("invalid stored transport mode {}", raw))
}

fn location_from_row(row: &SqliteRow) -> Result<Location> {
    Ok(Location {
        id: row.get("id"),
        name: row.get("name"),
        address: row.get("address"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    })
}

fn route_from_row(row: &SqliteRow) -> Result<StoredRoute> {
    let route_data: String = row.get("route_data");
    let result: OptimizedRouteResult =
        serde_json::from_str(&route_data).context("stored route data is not valid JSON")?;

    let request = RouteRequestRecord {
        id: row.get("request_id"),
        departure_id: row.get("departure_id"),
        destination_id: row.get("destination_id"),
        transport_mode: parse_mode(&row.get::<String, _>("transport_mode"))?,
        user_id: row.get("user_id"),
        created_at: parse_timestamp(&row.get::<String, _>("request_created_at"))?,
    };

    Ok(StoredRoute {
        id: row.get("id"),
        departure: LocationSummary {
            id: request.departure_id,
            name: row.get("departure_name"),
            address: row.get("departure_address"),
        },
        destination: LocationSummary {
            id: request.destination_id,
            name: row.get("destination_name"),
            address: row.get("destination_address"),
        },
        request,
        result,
        distance_km: row.get("distance"),
        duration_minutes: row.get("duration"),
        cost_fcfa: row.get("cost_estimate"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    })
}

/// Escapes LIKE wildcards so user input only ever matches literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

impl LocationRepository for SqliteStore {
    async fn insert_location(&self, location: NewLocation) -> Result<Location> {
        let created_at = now();
        let result = sqlx::query(
            r#"
            INSERT INTO locations (name, address, latitude, longitude, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&location.name)
        .bind(&location.address)
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(timestamp(created_at))
        .execute(&self.pool)
        .await
        .context("failed inserting location")?;

        Ok(Location {
            id: result.last_insert_rowid(),
            name: location.name,
            address: location.address,
            latitude: location.latitude,
            longitude: location.longitude,
            created_at,
        })
    }

    async fn get_location(&self, id: i64) -> Result<Option<Location>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, address, latitude, longitude, created_at
            FROM locations
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(location_from_row).transpose()
    }

    async fn update_location(&self, id: i64, location: NewLocation) -> Result<Option<Location>> {
        let result = sqlx::query(
            r#"
            UPDATE locations
            SET name = ?2, address = ?3, latitude = ?4, longitude = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&location.name)
        .bind(&location.address)
        .bind(location.latitude)
        .bind(location.longitude)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed updating location {}", id))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_location(id).await
    }

    async fn delete_location(&self, id: i64) -> Result<Option<LocationDeletion>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT id, name, address, latitude, longitude, created_at FROM locations WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let location = location_from_row(&row)?;

        let affected: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM route_requests WHERE departure_id = ?1 OR destination_id = ?1",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM optimized_routes
            WHERE route_request_id IN (
              SELECT id FROM route_requests WHERE departure_id = ?1 OR destination_id = ?1
            )
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM route_requests WHERE departure_id = ?1 OR destination_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM locations WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit()
            .await
            .with_context(|| format!("failed deleting location {}", id))?;

        Ok(Some(LocationDeletion {
            location: LocationSummary::from(&location),
            affected_route_requests: affected as usize,
        }))
    }

    async fn list_locations(&self, search: Option<&str>, page: PageRequest) -> Result<Page<Location>> {
        let pattern = search.map(like_pattern);

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM locations
            WHERE ?1 IS NULL
               OR lower(name) LIKE ?1 ESCAPE '\'
               OR lower(address) LIKE ?1 ESCAPE '\'
            "#,
        )
        .bind(pattern.as_deref())
        .fetch_one(&self.pool)
        .await?;

        let total = total as usize;
        let window = page.window(total);
        let rows = sqlx::query(
            r#"
            SELECT id, name, address, latitude, longitude, created_at
            FROM locations
            WHERE ?1 IS NULL
               OR lower(name) LIKE ?1 ESCAPE '\'
               OR lower(address) LIKE ?1 ESCAPE '\'
            ORDER BY created_at DESC, id DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(pattern.as_deref())
        .bind(page.per_page as i64)
        .bind(window.offset as i64)
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .iter()
            .map(location_from_row)
            .collect::<Result<Vec<_>>>()?;
        Ok(page.page_of(items, window, total))
    }

    async fn all_locations(&self) -> Result<Vec<Location>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, address, latitude, longitude, created_at
            FROM locations
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(location_from_row).collect()
    }
}

impl RouteRepository for SqliteStore {
    async fn insert_route_request(&self, request: NewRouteRequest) -> Result<RouteRequestRecord> {
        let created_at = now();
        let result = sqlx::query(
            r#"
            INSERT INTO route_requests (departure_id, destination_id, transport_mode, user_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(request.departure_id)
        .bind(request.destination_id)
        .bind(request.transport_mode.as_code())
        .bind(request.user_id.as_deref())
        .bind(timestamp(created_at))
        .execute(&self.pool)
        .await
        .context("failed inserting route request")?;

        Ok(RouteRequestRecord {
            id: result.last_insert_rowid(),
            departure_id: request.departure_id,
            destination_id: request.destination_id,
            transport_mode: request.transport_mode,
            user_id: request.user_id,
            created_at,
        })
    }

    async fn insert_route(
        &self,
        request: &RouteRequestRecord,
        result: &OptimizedRouteResult,
    ) -> Result<StoredRoute> {
        let (distance_km, duration_minutes, cost_fcfa) = route_columns(result);
        let route_data = serde_json::to_string(result)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO optimized_routes
              (route_request_id, route_data, distance, duration, cost_estimate, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(request.id)
        .bind(route_data)
        .bind(distance_km)
        .bind(duration_minutes)
        .bind(cost_fcfa)
        .bind(timestamp(now()))
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed storing route for request {}", request.id))?;

        self.get_route(inserted.last_insert_rowid())
            .await?
            .with_context(|| format!("route for request {} was not readable after insert", request.id))
    }

    async fn get_route(&self, id: i64) -> Result<Option<StoredRoute>> {
        let row = sqlx::query(&format!("{ROUTE_SELECT} WHERE r.id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(route_from_row).transpose()
    }

    async fn route_history(&self, user_id: Option<&str>, page: PageRequest) -> Result<RouteHistory> {
        let totals = sqlx::query(
            r#"
            SELECT COUNT(*) AS total,
                   COALESCE(SUM(r.distance), 0.0) AS total_distance,
                   COALESCE(SUM(r.cost_estimate), 0.0) AS total_cost
            FROM optimized_routes r
            JOIN route_requests q ON q.id = r.route_request_id
            WHERE ?1 IS NULL OR q.user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let total = totals.get::<i64, _>("total") as usize;
        let total_distance_km: f64 = totals.get("total_distance");
        let stats = RouteHistoryStats {
            total_routes: total,
            total_distance_km,
            total_cost_fcfa: totals.get("total_cost"),
            avg_distance_km: if total == 0 {
                0.0
            } else {
                round2(total_distance_km / total as f64)
            },
        };

        let window = page.window(total);
        let rows = sqlx::query(&format!(
            "{ROUTE_SELECT} WHERE ?1 IS NULL OR q.user_id = ?1 \
             ORDER BY r.created_at DESC, r.id DESC LIMIT ?2 OFFSET ?3"
        ))
        .bind(user_id)
        .bind(page.per_page as i64)
        .bind(window.offset as i64)
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .iter()
            .map(route_from_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(RouteHistory {
            routes: page.page_of(items, window, total),
            stats,
        })
    }

    async fn statistics(&self, now: DateTime<Utc>) -> Result<Statistics> {
        let total_locations: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM locations")
            .fetch_one(&self.pool)
            .await?;
        let total_routes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM optimized_routes")
            .fetch_one(&self.pool)
            .await?;
        let recent_routes: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM optimized_routes WHERE created_at >= ?1")
                .bind(timestamp(now - Duration::days(RECENT_WINDOW_DAYS)))
                .fetch_one(&self.pool)
                .await?;

        let mode_rows = sqlx::query(
            r#"
            SELECT q.transport_mode,
                   COUNT(q.id) AS count,
                   AVG(r.distance) AS avg_distance,
                   AVG(r.cost_estimate) AS avg_cost
            FROM route_requests q
            LEFT JOIN optimized_routes r ON r.route_request_id = q.id
            GROUP BY q.transport_mode
            ORDER BY count DESC, q.transport_mode ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let transport_modes = mode_rows
            .iter()
            .map(|row| {
                Ok(TransportModeStats {
                    transport_mode: parse_mode(&row.get::<String, _>("transport_mode"))?,
                    count: row.get::<i64, _>("count") as usize,
                    avg_distance_km: row.get("avg_distance"),
                    avg_cost_fcfa: row.get("avg_cost"),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let popular_rows = sqlx::query(
            r#"
            SELECT l.id, l.name, l.address,
                   (SELECT COUNT(*) FROM route_requests WHERE departure_id = l.id) AS departure_count,
                   (SELECT COUNT(*) FROM route_requests WHERE destination_id = l.id) AS destination_count
            FROM locations l
            ORDER BY departure_count DESC, destination_count DESC, l.id ASC
            LIMIT ?1
            "#,
        )
        .bind(POPULAR_LOCATIONS_LIMIT as i64)
        .fetch_all(&self.pool)
        .await?;

        let popular_locations = popular_rows
            .iter()
            .map(|row| PopularLocation {
                location: LocationSummary {
                    id: row.get("id"),
                    name: row.get("name"),
                    address: row.get("address"),
                },
                departure_count: row.get::<i64, _>("departure_count") as usize,
                destination_count: row.get::<i64, _>("destination_count") as usize,
            })
            .collect();

        Ok(Statistics {
            total_locations: total_locations as usize,
            total_routes: total_routes as usize,
            recent_routes: recent_routes as usize,
            transport_modes,
            popular_locations,
        })
    }
}
