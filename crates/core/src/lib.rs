pub mod error;
pub mod extract;
pub mod map;
pub mod models;
pub mod normalize;
pub mod prompt;
pub mod samples;
pub mod validation;

pub use error::{InvalidInputError, MalformedResponse};
pub use extract::{extract_json_object, parse_embedded, MAX_RESPONSE_BYTES};
pub use map::{default_map, locations_map, route_map, MapMarker, MapPolyline, MapView};
pub use models::*;
pub use normalize::{coerce_number, parse_coordinate, parse_route_analysis, Quantity};
pub use prompt::{coordinate_prompt, coordinate_retry_prompt, route_analysis_prompt};
pub use samples::sample_locations;
pub use validation::{
    normalize_text, search_term, truncate_graphemes, validate_distinct_endpoints,
    validate_new_location, RouteQuery,
};
