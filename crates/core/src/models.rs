use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::InvalidInputError;

pub const CURRENCY: &str = "FCFA";
pub const REGION: &str = "Cameroon";

/// Cameroon bounding box; every resolved coordinate must fall inside it.
pub const CAMEROON_BOUNDS: BoundingBox = BoundingBox {
    min_latitude: 2.0,
    max_latitude: 13.0,
    min_longitude: 8.0,
    max_longitude: 16.0,
};

/// Yaoundé, used whenever an address cannot be resolved.
pub const DEFAULT_COORDINATE: Coordinate = Coordinate {
    latitude: 3.8480,
    longitude: 11.5021,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    Car,
    Public,
    Walking,
    Bike,
}

impl TransportMode {
    pub const ALL: [TransportMode; 4] = [Self::Car, Self::Public, Self::Walking, Self::Bike];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "car" | "voiture" => Some(Self::Car),
            "public" | "public_transport" | "transport_public" | "bus" => Some(Self::Public),
            "walking" | "walk" | "marche" => Some(Self::Walking),
            "bike" | "velo" | "vélo" => Some(Self::Bike),
            _ => None,
        }
    }

    pub fn as_code(self) -> &'static str {
        match self {
            Self::Car => "car",
            Self::Public => "public",
            Self::Walking => "walking",
            Self::Bike => "bike",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Car => "Voiture",
            Self::Public => "Transport public",
            Self::Walking => "Marche",
            Self::Bike => "Vélo",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

impl FromStr for TransportMode {
    type Err = InvalidInputError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().is_empty() {
            return Err(InvalidInputError::missing("transport_mode"));
        }
        Self::parse(value).ok_or_else(|| {
            InvalidInputError::new(
                "transport_mode",
                format!("unsupported transport mode '{}'", value.trim()),
            )
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// General WGS84 range check, independent of the deployment box.
    pub fn is_on_globe(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn midpoint(&self, other: &Coordinate) -> Coordinate {
        Coordinate {
            latitude: (self.latitude + other.latitude) / 2.0,
            longitude: (self.longitude + other.longitude) / 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl BoundingBox {
    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        coordinate.latitude.is_finite()
            && coordinate.longitude.is_finite()
            && (self.min_latitude..=self.max_latitude).contains(&coordinate.latitude)
            && (self.min_longitude..=self.max_longitude).contains(&coordinate.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryRoute {
    pub steps: Vec<String>,
    pub duration_minutes: f64,
    pub distance_km: f64,
    pub cost_fcfa: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeRoute {
    pub description: String,
    pub duration_minutes: f64,
    pub distance_km: f64,
    pub cost_fcfa: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalInfo {
    pub weather: String,
    pub road_conditions: String,
    pub safety: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteAnalysis {
    pub primary: PrimaryRoute,
    pub alternatives: Vec<AlternativeRoute>,
    pub recommendations: Vec<String>,
    pub points_of_interest: Vec<String>,
    pub local_info: LocalInfo,
}

impl RouteAnalysis {
    /// The fixed analysis substituted whenever the model answer is unusable.
    pub fn fallback() -> Self {
        Self {
            primary: PrimaryRoute {
                steps: vec![
                    "Départ depuis le point indiqué".to_string(),
                    "Arrivée à la destination".to_string(),
                ],
                duration_minutes: 60.0,
                distance_km: 25.0,
                cost_fcfa: 2_500.0,
            },
            alternatives: Vec::new(),
            recommendations: vec![
                "Vérifiez l'état des routes avant de partir".to_string(),
                "Prévoyez de la marge pendant la saison des pluies".to_string(),
            ],
            points_of_interest: Vec::new(),
            local_info: LocalInfo {
                weather: "Conditions météo variables selon la saison".to_string(),
                road_conditions: "État des routes variable selon les régions".to_string(),
                safety: "Voyagez de jour et gardez vos documents sur vous".to_string(),
            },
        }
    }

    pub fn numeric_fields(&self) -> Vec<f64> {
        let mut values = vec![
            self.primary.duration_minutes,
            self.primary.distance_km,
            self.primary.cost_fcfa,
        ];
        for alternative in &self.alternatives {
            values.push(alternative.duration_minutes);
            values.push(alternative.distance_km);
            values.push(alternative.cost_fcfa);
        }
        values
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub address: String,
    pub coordinate: Coordinate,
}

/// Which parts of a result were substituted by deterministic defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackFlags {
    pub departure: bool,
    pub destination: bool,
    pub analysis: bool,
}

impl FallbackFlags {
    pub fn any(&self) -> bool {
        self.departure || self.destination || self.analysis
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizedRouteResult {
    pub departure: Endpoint,
    pub destination: Endpoint,
    pub transport_mode: TransportMode,
    pub analysis: RouteAnalysis,
    pub fallbacks: FallbackFlags,
    pub currency: String,
    pub region: String,
}

impl OptimizedRouteResult {
    pub fn cost_in_eur(&self, eur_to_fcfa: f64) -> Option<f64> {
        if eur_to_fcfa > 0.0 {
            Some((self.analysis.primary.cost_fcfa / eur_to_fcfa * 100.0).round() / 100.0)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: DateTime<Utc>,
}

impl Location {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLocation {
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSummary {
    pub id: i64,
    pub name: String,
    pub address: String,
}

impl From<&Location> for LocationSummary {
    fn from(location: &Location) -> Self {
        Self {
            id: location.id,
            name: location.name.clone(),
            address: location.address.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequestRecord {
    pub id: i64,
    pub departure_id: i64,
    pub destination_id: i64,
    pub transport_mode: TransportMode,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRouteRequest {
    pub departure_id: i64,
    pub destination_id: i64,
    pub transport_mode: TransportMode,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRoute {
    pub id: i64,
    pub request: RouteRequestRecord,
    pub departure: LocationSummary,
    pub destination: LocationSummary,
    pub result: OptimizedRouteResult,
    pub distance_km: f64,
    pub duration_minutes: i64,
    pub cost_fcfa: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteHistoryStats {
    pub total_routes: usize,
    pub total_distance_km: f64,
    pub total_cost_fcfa: f64,
    pub avg_distance_km: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteHistory {
    pub routes: Page<StoredRoute>,
    pub stats: RouteHistoryStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportModeStats {
    pub transport_mode: TransportMode,
    pub count: usize,
    pub avg_distance_km: Option<f64>,
    pub avg_cost_fcfa: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopularLocation {
    pub location: LocationSummary,
    pub departure_count: usize,
    pub destination_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    pub total_locations: usize,
    pub total_routes: usize,
    pub recent_routes: usize,
    pub transport_modes: Vec<TransportModeStats>,
    pub popular_locations: Vec<PopularLocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteComparison {
    pub routes: Vec<StoredRoute>,
    pub fastest_id: i64,
    pub shortest_id: i64,
    pub cheapest_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationDeletion {
    pub location: LocationSummary,
    pub affected_route_requests: usize,
}
