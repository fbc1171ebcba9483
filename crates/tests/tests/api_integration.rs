use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use camroute_agents::PlannerConfig;
use camroute_api::{build_app_with, ApiSettings, DEFAULT_API_KEY};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn app() -> Router {
    build_app_with(ApiSettings::default(), PlannerConfig::default())
        .await
        .expect("app should build")
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-api-key", DEFAULT_API_KEY);
    let body = match body {
        Some(payload) => {
            builder = builder.header("content-type", "application/json");
            Body::from(payload.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, parsed)
}

async fn create_location(app: &Router, name: &str, address: &str, lat: f64, lon: f64) -> i64 {
    let (status, body) = send(
        app,
        "POST",
        "/v1/locations",
        Some(json!({
            "name": name,
            "address": address,
            "latitude": lat,
            "longitude": lon
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let app = app().await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["status"], "ok");
    assert_eq!(parsed["capabilities"]["completion"], false);
    assert_eq!(parsed["capabilities"]["storage"], "memory");
}

#[tokio::test]
async fn locations_require_api_key() {
    let app = app().await;

    let request = Request::builder()
        .uri("/v1/locations")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/v1/locations")
        .header("x-api-key", "wrong-key")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn location_crud_round() {
    let app = app().await;
    let id = create_location(&app, "Marché Central", "Marché Central, Douala", 4.0469, 9.7084).await;

    let (status, body) = send(&app, "GET", &format!("/v1/locations/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Marché Central");

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/v1/locations/{id}"),
        Some(json!({
            "name": "Marché  Central de Douala",
            "address": "Boulevard Ahmadou Ahidjo, Douala",
            "latitude": 4.047,
            "longitude": 9.709
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Marché Central de Douala");

    let (status, body) = send(&app, "GET", "/v1/locations?search=douala", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let (status, body) = send(&app, "DELETE", &format!("/v1/locations/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["affected_route_requests"], 0);

    let (status, body) = send(&app, "GET", &format!("/v1/locations/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn invalid_location_is_rejected() {
    let app = app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/locations",
        Some(json!({
            "name": "X",
            "address": "Quelque part à Yaoundé",
            "latitude": 3.86,
            "longitude": 11.52
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_input");

    let (status, _) = send(
        &app,
        "POST",
        "/v1/locations",
        Some(json!({ "name": "Poste Centrale" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/v1/locations/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn quick_search_returns_coordinates() {
    let app = app().await;
    create_location(&app, "Aéroport de Douala", "Aéroport International, Douala", 4.0061, 9.7195).await;

    let (status, body) = send(&app, "GET", "/v1/locations/search?q=a", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["locations"].as_array().unwrap().len(), 0);

    let (_, body) = send(&app, "GET", "/v1/locations/search?q=Douala", None).await;
    let hit = &body["locations"][0];
    assert_eq!(hit["name"], "Aéroport de Douala");
    assert_eq!(hit["coordinates"][0], 4.0061);
    assert_eq!(hit["coordinates"][1], 9.7195);
}

#[tokio::test]
async fn optimize_without_credentials_uses_fallbacks() {
    let app = app().await;
    let douala = create_location(&app, "Gare de Bessengue", "Gare de Bessengue, Douala", 4.0511, 9.7085).await;
    let yaounde = create_location(&app, "Poste Centrale", "Poste Centrale, Yaoundé", 3.8667, 11.5167).await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/routes/optimize",
        Some(json!({
            "departure_id": douala,
            "destination_id": yaounde,
            "transport_mode": "public",
            "user_id": "visiteur-1"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let route = &body["route"];
    assert_eq!(route["result"]["fallbacks"]["departure"], true);
    assert_eq!(route["result"]["fallbacks"]["destination"], true);
    assert_eq!(route["result"]["fallbacks"]["analysis"], true);
    assert_eq!(route["result"]["currency"], "FCFA");
    assert_eq!(route["result"]["transport_mode"], "public");
    assert_eq!(route["distance_km"], 25.0);
    assert_eq!(route["duration_minutes"], 60);
    assert!(body["map"]["polylines"].as_array().is_some());

    let route_id = route["id"].as_i64().unwrap();
    let (status, body) = send(&app, "GET", &format!("/v1/routes/{route_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["route"]["id"], route_id);

    let (status, body) = send(&app, "GET", "/v1/routes?user_id=visiteur-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["total_routes"], 1);

    let (_, body) = send(&app, "GET", "/v1/routes?user_id=quelqu-un", None).await;
    assert_eq!(body["stats"]["total_routes"], 0);

    let (_, health) = send(&app, "GET", "/health", None).await;
    assert_eq!(health["metrics"]["routes_persisted_total"], 1);
}

#[tokio::test]
async fn optimize_rejects_bad_input() {
    let app = app().await;
    let id = create_location(&app, "Port de Kribi", "Port autonome, Kribi", 2.9400, 9.9100).await;
    let other = create_location(&app, "Plage de Limbé", "Down Beach, Limbé", 4.0100, 9.2000).await;

    let (status, _) = send(
        &app,
        "POST",
        "/v1/routes/optimize",
        Some(json!({ "departure_id": id, "destination_id": id, "transport_mode": "car" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/v1/routes/optimize",
        Some(json!({ "departure_id": id, "destination_id": other, "transport_mode": "bateau" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/v1/routes/optimize",
        Some(json!({ "departure_id": id, "destination_id": 9999, "transport_mode": "car" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "POST",
        "/v1/routes/preview",
        Some(json!({ "departure": "   ", "destination": "Kribi", "transport_mode": "car" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn preview_does_not_persist() {
    let app = app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/routes/preview",
        Some(json!({
            "departure": "Douala",
            "destination": "Bafoussam",
            "transport_mode": "car"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fallbacks"]["analysis"], true);
    assert_eq!(body["region"], "Cameroon");

    let (_, stats) = send(&app, "GET", "/v1/statistics", None).await;
    assert_eq!(stats["total_routes"], 0);
}

#[tokio::test]
async fn compare_and_statistics() {
    let app = app().await;
    let a = create_location(&app, "Université de Yaoundé I", "Ngoa-Ekellé, Yaoundé", 3.8600, 11.5000).await;
    let b = create_location(&app, "Stade Omnisport", "Mfandena, Yaoundé", 3.8850, 11.5390).await;

    let mut route_ids = Vec::new();
    for mode in ["car", "walking"] {
        let (status, body) = send(
            &app,
            "POST",
            "/v1/routes/optimize",
            Some(json!({ "departure_id": a, "destination_id": b, "transport_mode": mode })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        route_ids.push(body["route"]["id"].as_i64().unwrap());
    }

    let uri = format!("/v1/routes/compare?ids={},{}", route_ids[0], route_ids[1]);
    let (status, body) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["routes"].as_array().unwrap().len(), 2);
    assert_eq!(body["fastest_id"], route_ids[0]);

    let uri = format!("/v1/routes/compare?ids={}", route_ids[0]);
    let (status, _) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, stats) = send(&app, "GET", "/v1/statistics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_locations"], 2);
    assert_eq!(stats["total_routes"], 2);
    assert_eq!(stats["recent_routes"], 2);
    assert_eq!(stats["transport_modes"].as_array().unwrap().len(), 2);
    assert_eq!(stats["popular_locations"][0]["location"]["id"], a);

    let (status, map) = send(&app, "GET", "/v1/map", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(map["markers"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn seeding_fills_an_empty_catalogue() {
    let settings = ApiSettings {
        seed_sample_data: true,
        ..ApiSettings::default()
    };
    let app = build_app_with(settings, PlannerConfig::default())
        .await
        .expect("app should build");

    let (status, body) = send(&app, "GET", "/v1/locations", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 12);
}

#[tokio::test]
async fn rate_limit_returns_retry_after() {
    let settings = ApiSettings {
        rate_limit_max: 1,
        ..ApiSettings::default()
    };
    let app = build_app_with(settings, PlannerConfig::default())
        .await
        .expect("app should build");

    let (status, _) = send(&app, "GET", "/v1/statistics", None).await;
    assert_eq!(status, StatusCode::OK);

    let request = Request::builder()
        .uri("/v1/statistics")
        .header("x-api-key", DEFAULT_API_KEY)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
}
