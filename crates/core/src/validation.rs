use unicode_segmentation::UnicodeSegmentation;

use crate::error::InvalidInputError;
use crate::models::{NewLocation, TransportMode};

pub const MAX_NAME_LEN: usize = 200;
pub const MAX_ADDRESS_LEN: usize = 500;
pub const MIN_NAME_LEN: usize = 2;
pub const MIN_ADDRESS_LEN: usize = 5;
pub const MIN_SEARCH_LEN: usize = 2;

/// Collapses runs of whitespace into single spaces.
pub fn normalize_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Caps `input` at `max` user-perceived characters without splitting graphemes.
pub fn truncate_graphemes(input: &str, max: usize) -> String {
    input.graphemes(true).take(max).collect()
}

/// Validated inputs for one route optimization.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteQuery {
    pub departure: String,
    pub destination: String,
    pub transport_mode: TransportMode,
}

impl RouteQuery {
    pub fn parse(departure: &str, destination: &str, mode: &str) -> Result<Self, InvalidInputError> {
        let departure = required_address("departure", departure)?;
        let destination = required_address("destination", destination)?;
        let transport_mode = mode.parse::<TransportMode>()?;

        Ok(Self {
            departure,
            destination,
            transport_mode,
        })
    }
}

fn required_address(field: &'static str, value: &str) -> Result<String, InvalidInputError> {
    let normalized = normalize_text(value);
    if normalized.is_empty() {
        return Err(InvalidInputError::missing(field));
    }
    Ok(truncate_graphemes(&normalized, MAX_ADDRESS_LEN))
}

pub fn validate_new_location(draft: NewLocation) -> Result<NewLocation, InvalidInputError> {
    let name = normalize_text(&draft.name);
    if name.graphemes(true).count() < MIN_NAME_LEN {
        return Err(InvalidInputError::new(
            "name",
            format!("must contain at least {MIN_NAME_LEN} characters"),
        ));
    }
    if name.graphemes(true).count() > MAX_NAME_LEN {
        return Err(InvalidInputError::new(
            "name",
            format!("must contain at most {MAX_NAME_LEN} characters"),
        ));
    }

    let address = normalize_text(&draft.address);
    if address.graphemes(true).count() < MIN_ADDRESS_LEN {
        return Err(InvalidInputError::new("address", "must be more detailed"));
    }
    if address.graphemes(true).count() > MAX_ADDRESS_LEN {
        return Err(InvalidInputError::new(
            "address",
            format!("must contain at most {MAX_ADDRESS_LEN} characters"),
        ));
    }

    if !draft.latitude.is_finite() || !(-90.0..=90.0).contains(&draft.latitude) {
        return Err(InvalidInputError::new(
            "latitude",
            "must be between -90 and 90",
        ));
    }
    if !draft.longitude.is_finite() || !(-180.0..=180.0).contains(&draft.longitude) {
        return Err(InvalidInputError::new(
            "longitude",
            "must be between -180 and 180",
        ));
    }

    Ok(NewLocation {
        name,
        address,
        latitude: draft.latitude,
        longitude: draft.longitude,
    })
}

pub fn validate_distinct_endpoints(
    departure_id: i64,
    destination_id: i64,
) -> Result<(), InvalidInputError> {
    if departure_id == destination_id {
        return Err(InvalidInputError::new(
            "destination_id",
            "departure and destination must be different locations",
        ));
    }
    Ok(())
}

/// Returns the trimmed query when it is long enough to search with.
pub fn search_term(raw: Option<&str>) -> Option<String> {
    let trimmed = normalize_text(raw?);
    (trimmed.chars().count() >= MIN_SEARCH_LEN).then_some(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> NewLocation {
        NewLocation {
            name: "  Gare   de Douala ".to_string(),
            address: "Bessengue, Douala, Cameroun".to_string(),
            latitude: 4.0511,
            longitude: 9.7679,
        }
    }

    #[test]
    fn empty_departure_is_rejected() {
        let err = RouteQuery::parse("", "Douala", "car").unwrap_err();
        assert_eq!(err.field, "departure");
    }

    #[test]
    fn blank_destination_and_unknown_mode_are_rejected() {
        assert_eq!(
            RouteQuery::parse("Douala", "   ", "car").unwrap_err().field,
            "destination"
        );
        assert_eq!(
            RouteQuery::parse("Douala", "Yaoundé", "plane")
                .unwrap_err()
                .field,
            "transport_mode"
        );
        assert_eq!(
            RouteQuery::parse("Douala", "Yaoundé", "").unwrap_err().field,
            "transport_mode"
        );
    }

    #[test]
    fn query_normalizes_whitespace() {
        let query = RouteQuery::parse(" Douala\n", "Yaoundé", "Voiture").unwrap();
        assert_eq!(query.departure, "Douala");
        assert_eq!(query.transport_mode, TransportMode::Car);
    }

    #[test]
    fn location_name_is_normalized() {
        let location = validate_new_location(draft()).unwrap();
        assert_eq!(location.name, "Gare de Douala");
    }

    #[test]
    fn short_address_and_bad_latitude_are_rejected() {
        let mut short = draft();
        short.address = "Dla".to_string();
        assert_eq!(validate_new_location(short).unwrap_err().field, "address");

        let mut far = draft();
        far.latitude = 123.0;
        assert_eq!(validate_new_location(far).unwrap_err().field, "latitude");
    }

    #[test]
    fn identical_endpoints_are_rejected() {
        assert!(validate_distinct_endpoints(3, 3).is_err());
        assert!(validate_distinct_endpoints(3, 4).is_ok());
    }

    #[test]
    fn search_term_requires_two_characters() {
        assert_eq!(search_term(Some(" y ")), None);
        assert_eq!(search_term(Some("ya")), Some("ya".to_string()));
        assert_eq!(search_term(None), None);
    }

    #[test]
    fn truncation_keeps_whole_graphemes() {
        assert_eq!(truncate_graphemes("Yaoundé", 7), "Yaoundé");
        assert_eq!(truncate_graphemes("Yaoundé", 3), "Yao");
    }
}
