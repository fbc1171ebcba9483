use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::MalformedResponse;
use crate::extract::parse_embedded;
use crate::models::{
    AlternativeRoute, BoundingBox, Coordinate, LocalInfo, PrimaryRoute, RouteAnalysis,
};

static NUMERIC_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[-+]?\d[\d\s'.,]*").expect("valid numeric token regex")
});

/// Hour unit right after a number, with an optional minute part ("2h30", "1 heure et 30").
static HOUR_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:heures?|hours?|hrs?|h)\.?(?:\s*(?:et|and)?\s*(\d{1,2})(?:\D|$))?")
        .expect("valid duration regex")
});

static METRE_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:mètres?|metres?|meters?|m)\b").expect("valid distance regex")
});

/// Canonical unit a free-form model value is converted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Minutes,
    Kilometres,
    Fcfa,
    Degrees,
}

#[derive(Debug, Deserialize)]
struct RawCoordinate {
    latitude: Value,
    longitude: Value,
}

#[derive(Debug, Deserialize)]
struct RawRouteAnalysis {
    optimal_route: RawOptimalRoute,
    alternatives: Vec<RawAlternative>,
    recommendations: Vec<String>,
    points_of_interest: Vec<String>,
    local_info: RawLocalInfo,
}

#[derive(Debug, Deserialize)]
struct RawOptimalRoute {
    steps: Vec<String>,
    estimated_time: Value,
    estimated_distance: Value,
    cost_estimate: Value,
}

#[derive(Debug, Deserialize)]
struct RawAlternative {
    route: String,
    time: Value,
    distance: Value,
    cost: Value,
}

#[derive(Debug, Deserialize)]
struct RawLocalInfo {
    weather_considerations: String,
    road_conditions: String,
    safety_tips: String,
}

/// Parses a model answer into a coordinate that lies inside `bounds`.
pub fn parse_coordinate(text: &str, bounds: &BoundingBox) -> Result<Coordinate, MalformedResponse> {
    let raw: RawCoordinate = parse_embedded(text)?;
    let coordinate = Coordinate::new(
        coerce_number("latitude", &raw.latitude, Quantity::Degrees)?,
        coerce_number("longitude", &raw.longitude, Quantity::Degrees)?,
    );

    if !bounds.contains(&coordinate) {
        return Err(MalformedResponse::OutsideServiceArea {
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
        });
    }

    Ok(coordinate)
}

/// Parses a model answer into a fully numeric route analysis.
///
/// Every declared numeric field is coerced explicitly; the first failure
/// aborts the whole parse so callers never see a half-converted record.
pub fn parse_route_analysis(text: &str) -> Result<RouteAnalysis, MalformedResponse> {
    let raw: RawRouteAnalysis = parse_embedded(text)?;

    let steps = clean_list(raw.optimal_route.steps);
    if steps.is_empty() {
        return Err(MalformedResponse::MissingField("optimal_route.steps"));
    }

    let primary = PrimaryRoute {
        steps,
        duration_minutes: non_negative(
            "optimal_route.estimated_time",
            &raw.optimal_route.estimated_time,
            Quantity::Minutes,
        )?,
        distance_km: non_negative(
            "optimal_route.estimated_distance",
            &raw.optimal_route.estimated_distance,
            Quantity::Kilometres,
        )?,
        cost_fcfa: non_negative(
            "optimal_route.cost_estimate",
            &raw.optimal_route.cost_estimate,
            Quantity::Fcfa,
        )?,
    };

    let alternatives = raw
        .alternatives
        .into_iter()
        .map(|alt| {
            Ok(AlternativeRoute {
                description: alt.route.trim().to_string(),
                duration_minutes: non_negative("alternatives.time", &alt.time, Quantity::Minutes)?,
                distance_km: non_negative(
                    "alternatives.distance",
                    &alt.distance,
                    Quantity::Kilometres,
                )?,
                cost_fcfa: non_negative("alternatives.cost", &alt.cost, Quantity::Fcfa)?,
            })
        })
        .collect::<Result<Vec<_>, MalformedResponse>>()?;

    Ok(RouteAnalysis {
        primary,
        alternatives,
        recommendations: clean_list(raw.recommendations),
        points_of_interest: clean_list(raw.points_of_interest),
        local_info: LocalInfo {
            weather: raw.local_info.weather_considerations.trim().to_string(),
            road_conditions: raw.local_info.road_conditions.trim().to_string(),
            safety: raw.local_info.safety_tips.trim().to_string(),
        },
    })
}

/// Converts a JSON number or a loosely formatted numeric string into `f64`.
///
/// Accepted string forms include `"120"`, `"45,5 km"`, `"5 000 FCFA"`,
/// `"1,234.5"`, `"environ 2h30"` and `"800 m"`; the unit following the first
/// number is converted into the canonical one for `quantity`. A single comma is
/// a decimal separator except for FCFA amounts. Ranges such as `"4000-6000"` keep the lower
/// bound.
pub fn coerce_number(
    field: &'static str,
    value: &Value,
    quantity: Quantity,
) -> Result<f64, MalformedResponse> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => parse_quantity(text, quantity),
        _ => None,
    };

    match parsed {
        Some(number) if number.is_finite() => Ok(number),
        _ => Err(MalformedResponse::NotNumeric {
            field,
            value: value.to_string(),
        }),
    }
}

fn non_negative(
    field: &'static str,
    value: &Value,
    quantity: Quantity,
) -> Result<f64, MalformedResponse> {
    let number = coerce_number(field, value, quantity)?;
    if number < 0.0 {
        return Err(MalformedResponse::OutOfRange {
            field,
            value: number,
        });
    }
    // -0.0 would otherwise leak into stored columns
    Ok(number.abs())
}

fn parse_quantity(text: &str, quantity: Quantity) -> Option<f64> {
    let lowered = text.trim().to_lowercase();
    let token = NUMERIC_TOKEN.find(&lowered)?;
    let number = parse_grouped_number(token.as_str(), quantity)?;
    // the unit, if any, follows the first number; prose before it is ignored
    let unit = &lowered[token.end()..];

    match quantity {
        Quantity::Minutes => {
            if let Some(captures) = HOUR_SUFFIX.captures(unit) {
                let minutes = match captures.get(1) {
                    Some(value) => value.as_str().parse::<f64>().ok()?,
                    None => 0.0,
                };
                return Some(number * 60.0 + minutes);
            }
        }
        Quantity::Kilometres => {
            if METRE_SUFFIX.is_match(unit) {
                return Some(number / 1000.0);
            }
        }
        Quantity::Fcfa | Quantity::Degrees => {}
    }

    Some(number)
}

/// Resolves thousands and decimal separators in a single numeric token.
fn parse_grouped_number(token: &str, quantity: Quantity) -> Option<f64> {
    let compact: String = token
        .chars()
        .filter(|ch| !ch.is_whitespace() && *ch != '\'' && *ch != '\u{2019}')
        .collect();
    let compact = compact.trim_end_matches(['.', ',']);
    if compact.is_empty() {
        return None;
    }

    let commas = compact.matches(',').count();
    let dots = compact.matches('.').count();

    let canonical = if commas > 0 && dots > 0 {
        let last_comma = compact.rfind(',')?;
        let last_dot = compact.rfind('.')?;
        if last_comma > last_dot {
            compact.replace('.', "").replace(',', ".")
        } else {
            compact.replace(',', "")
        }
    } else if commas > 1 {
        compact.replace(',', "")
    } else if dots > 1 {
        compact.replace('.', "")
    } else if commas == 1 {
        // a lone comma is decimal except in prices ("6,000 FCFA")
        if quantity == Quantity::Fcfa && is_thousands_group(compact, ',') {
            compact.replace(',', "")
        } else {
            compact.replace(',', ".")
        }
    } else if dots == 1 && quantity == Quantity::Fcfa && is_thousands_group(compact, '.') {
        compact.replace('.', "")
    } else {
        compact.to_string()
    };

    canonical.parse::<f64>().ok()
}

fn is_thousands_group(token: &str, separator: char) -> bool {
    match token.split_once(separator) {
        Some((head, tail)) => {
            let head = head.trim_start_matches(['-', '+']);
            !head.is_empty()
                && head.len() <= 3
                && head != "0"
                && tail.len() == 3
                && tail.chars().all(|ch| ch.is_ascii_digit())
        }
        None => false,
    }
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::CAMEROON_BOUNDS;

    fn well_formed_analysis() -> String {
        json!({
            "optimal_route": {
                "steps": ["Prendre la N3 vers Édéa", "Continuer vers Yaoundé"],
                "estimated_time": "180",
                "estimated_distance": "243,5 km",
                "cost_estimate": "7 500 FCFA"
            },
            "alternatives": [
                { "route": "Par le train Camrail", "time": 240, "distance": "262", "cost": "6,000" }
            ],
            "recommendations": ["Partir tôt", "  "],
            "points_of_interest": ["Pont sur la Sanaga"],
            "local_info": {
                "weather_considerations": "Saison des pluies",
                "road_conditions": "Route bitumée",
                "safety_tips": "Éviter la nuit"
            }
        })
        .to_string()
    }

    #[test]
    fn exact_coordinates_round_trip() {
        let coordinate =
            parse_coordinate(r#"{"latitude": 4.05, "longitude": 9.70}"#, &CAMEROON_BOUNDS).unwrap();
        assert_eq!(coordinate, Coordinate::new(4.05, 9.70));
    }

    #[test]
    fn coordinates_accept_strings_and_decimal_commas() {
        let coordinate = parse_coordinate(
            r#"Réponse: {"latitude": "4,0511", "longitude": "9.7679"}"#,
            &CAMEROON_BOUNDS,
        )
        .unwrap();
        assert_eq!(coordinate, Coordinate::new(4.0511, 9.7679));
    }

    #[test]
    fn coordinates_outside_cameroon_are_rejected() {
        let result = parse_coordinate(r#"{"latitude": 48.85, "longitude": 2.35}"#, &CAMEROON_BOUNDS);
        assert!(matches!(
            result,
            Err(MalformedResponse::OutsideServiceArea { .. })
        ));
    }

    #[test]
    fn coordinates_missing_key_are_rejected() {
        let result = parse_coordinate(r#"{"latitude": 4.05}"#, &CAMEROON_BOUNDS);
        assert!(matches!(result, Err(MalformedResponse::InvalidJson(_))));
    }

    #[test]
    fn stringified_time_becomes_float() {
        let analysis = parse_route_analysis(&well_formed_analysis()).unwrap();
        assert_eq!(analysis.primary.duration_minutes, 180.0);
        assert_eq!(analysis.primary.distance_km, 243.5);
        assert_eq!(analysis.primary.cost_fcfa, 7_500.0);
        assert_eq!(analysis.alternatives[0].duration_minutes, 240.0);
        assert_eq!(analysis.alternatives[0].cost_fcfa, 6_000.0);
        assert_eq!(analysis.recommendations, vec!["Partir tôt".to_string()]);
    }

    #[test]
    fn plain_string_minutes_are_parsed() {
        assert_eq!(
            coerce_number("t", &json!("120"), Quantity::Minutes).unwrap(),
            120.0
        );
    }

    #[test]
    fn missing_alternatives_is_malformed() {
        let mut value: Value = serde_json::from_str(&well_formed_analysis()).unwrap();
        value.as_object_mut().unwrap().remove("alternatives");
        assert!(parse_route_analysis(&value.to_string()).is_err());
    }

    #[test]
    fn non_numeric_alternative_is_malformed() {
        let mut value: Value = serde_json::from_str(&well_formed_analysis()).unwrap();
        value["alternatives"][0]["cost"] = json!("gratuit");
        assert!(matches!(
            parse_route_analysis(&value.to_string()),
            Err(MalformedResponse::NotNumeric {
                field: "alternatives.cost",
                ..
            })
        ));
    }

    #[test]
    fn negative_values_are_malformed() {
        let mut value: Value = serde_json::from_str(&well_formed_analysis()).unwrap();
        value["optimal_route"]["estimated_distance"] = json!(-3);
        assert!(matches!(
            parse_route_analysis(&value.to_string()),
            Err(MalformedResponse::OutOfRange { .. })
        ));
    }

    #[test]
    fn empty_steps_are_malformed() {
        let mut value: Value = serde_json::from_str(&well_formed_analysis()).unwrap();
        value["optimal_route"]["steps"] = json!([]);
        assert!(matches!(
            parse_route_analysis(&value.to_string()),
            Err(MalformedResponse::MissingField("optimal_route.steps"))
        ));
    }

    #[test]
    fn durations_in_hours_are_converted() {
        assert_eq!(
            coerce_number("t", &json!("2h30"), Quantity::Minutes).unwrap(),
            150.0
        );
        assert_eq!(
            coerce_number("t", &json!("1,5 heures"), Quantity::Minutes).unwrap(),
            90.0
        );
        assert_eq!(
            coerce_number("t", &json!("45 min"), Quantity::Minutes).unwrap(),
            45.0
        );
    }

    #[test]
    fn distances_in_metres_are_converted() {
        assert_eq!(
            coerce_number("d", &json!("800 m"), Quantity::Kilometres).unwrap(),
            0.8
        );
        assert_eq!(
            coerce_number("d", &json!("12 km"), Quantity::Kilometres).unwrap(),
            12.0
        );
    }

    #[test]
    fn units_after_leading_prose_are_converted() {
        for (raw, expected) in [
            ("environ 2h30", 150.0),
            ("~3h", 180.0),
            ("1 heure et 30 minutes", 90.0),
            ("2 h 15 min", 135.0),
            ("environ 45 min", 45.0),
        ] {
            assert_eq!(
                coerce_number("t", &json!(raw), Quantity::Minutes).unwrap(),
                expected,
                "{raw}"
            );
        }
        for (raw, expected) in [
            ("environ 800 m", 0.8),
            ("800 mètres environ", 0.8),
            ("2 500 m", 2.5),
            ("env. 12 km", 12.0),
        ] {
            assert_eq!(
                coerce_number("d", &json!(raw), Quantity::Kilometres).unwrap(),
                expected,
                "{raw}"
            );
        }
    }

    #[test]
    fn lone_comma_is_decimal_outside_prices() {
        assert_eq!(
            coerce_number("d", &json!("2,500 km"), Quantity::Kilometres).unwrap(),
            2.5
        );
        assert_eq!(
            coerce_number("t", &json!("1,250 h"), Quantity::Minutes).unwrap(),
            75.0
        );
        assert_eq!(
            coerce_number("c", &json!("2,500 FCFA"), Quantity::Fcfa).unwrap(),
            2_500.0
        );
    }

    #[test]
    fn grouped_costs_are_parsed() {
        for (raw, expected) in [
            ("5 000 FCFA", 5_000.0),
            ("5\u{202f}000 FCFA", 5_000.0),
            ("5.000 FCFA", 5_000.0),
            ("1,234,500", 1_234_500.0),
            ("1.234,50", 1_234.5),
            ("4000-6000 FCFA", 4_000.0),
        ] {
            assert_eq!(
                coerce_number("c", &json!(raw), Quantity::Fcfa).unwrap(),
                expected,
                "{raw}"
            );
        }
    }

    #[test]
    fn null_and_words_are_not_numeric() {
        assert!(coerce_number("c", &Value::Null, Quantity::Fcfa).is_err());
        assert!(coerce_number("c", &json!("environ"), Quantity::Fcfa).is_err());
        assert!(coerce_number("c", &json!(true), Quantity::Fcfa).is_err());
    }
}
