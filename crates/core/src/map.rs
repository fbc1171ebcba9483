use serde::{Deserialize, Serialize};

use crate::models::{Coordinate, Location, OptimizedRouteResult, DEFAULT_COORDINATE};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapMarker {
    pub coordinate: Coordinate,
    pub label: String,
    pub tooltip: String,
    pub color: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapPolyline {
    pub points: Vec<Coordinate>,
    pub weight: u8,
    pub color: String,
    pub opacity: f32,
}

/// Everything a browser map widget needs to draw a view; tiles are the client's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    pub center: Coordinate,
    pub zoom: u8,
    pub markers: Vec<MapMarker>,
    pub polylines: Vec<MapPolyline>,
    pub fit_bounds: Option<[Coordinate; 2]>,
}

pub fn default_map() -> MapView {
    MapView {
        center: DEFAULT_COORDINATE,
        zoom: 7,
        markers: vec![marker(
            DEFAULT_COORDINATE,
            "Yaoundé - capitale du Cameroun",
            "Yaoundé",
            "red",
            "star",
        )],
        polylines: Vec::new(),
        fit_bounds: None,
    }
}

pub fn locations_map(locations: &[Location]) -> MapView {
    if locations.is_empty() {
        return default_map();
    }

    let count = locations.len() as f64;
    let center = Coordinate::new(
        locations.iter().map(|loc| loc.latitude).sum::<f64>() / count,
        locations.iter().map(|loc| loc.longitude).sum::<f64>() / count,
    );

    MapView {
        center,
        zoom: 10,
        markers: locations
            .iter()
            .map(|loc| {
                marker(
                    loc.coordinate(),
                    &format!("{} ({})", loc.name, loc.address),
                    &loc.name,
                    "blue",
                    "info-sign",
                )
            })
            .collect(),
        polylines: Vec::new(),
        fit_bounds: None,
    }
}

pub fn route_map(result: &OptimizedRouteResult) -> MapView {
    let start = result.departure.coordinate;
    let end = result.destination.coordinate;

    MapView {
        center: start.midpoint(&end),
        zoom: 12,
        markers: vec![
            marker(
                start,
                &format!("Départ : {}", result.departure.address),
                "Point de départ",
                "green",
                "play",
            ),
            marker(
                end,
                &format!("Destination : {}", result.destination.address),
                "Point d'arrivée",
                "red",
                "stop",
            ),
        ],
        polylines: vec![MapPolyline {
            points: vec![start, end],
            weight: 4,
            color: "blue".to_string(),
            opacity: 0.8,
        }],
        fit_bounds: Some([start, end]),
    }
}

fn marker(coordinate: Coordinate, label: &str, tooltip: &str, color: &str, icon: &str) -> MapMarker {
    MapMarker {
        coordinate,
        label: label.to_string(),
        tooltip: tooltip.to_string(),
        color: color.to_string(),
        icon: icon.to_string(),
    }
}
