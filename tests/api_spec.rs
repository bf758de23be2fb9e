use axum::http::StatusCode;
use axum_test::TestServer;
use driftpad::api::{create_router, AppState};
use driftpad::config::EngineConfig;
use driftpad::db::Database;
use driftpad::models::*;
use driftpad::ports::Viewport;
use serde_json::{json, Value};

fn setup() -> (TestServer, Database) {
    let db = Database::open_memory().expect("Failed to create database");
    db.migrate().expect("Failed to migrate");
    let state = AppState::new(db.clone(), EngineConfig::default(), Viewport::default());
    let app = create_router(state);
    (
        TestServer::new(app).expect("Failed to create test server"),
        db,
    )
}

fn create_forest_park(db: &Database) -> LocationRecord {
    db.create_location(CreateLocationInput {
        name: "Forest Park".to_string(),
        slug: "forest-park".to_string(),
        latitude: 38.6359,
        longitude: -90.2951,
        radius_meters: 1500.0,
        city: Some("St. Louis".to_string()),
        state: Some("MO".to_string()),
        is_active: None,
    })
    .expect("Failed to create location")
}

fn create_prompt(db: &Database, category: PromptCategory) -> PromptRecord {
    db.create_prompt(CreatePromptInput {
        content: "draw a tree".to_string(),
        category,
        requires_shape: category == PromptCategory::CompleteShape,
        requires_gallery_image: false,
        location_id: None,
        weight: None,
        active: None,
    })
    .expect("Failed to create prompt")
}

mod health {
    use super::*;

    #[tokio::test]
    async fn reports_ok() {
        let (server, _db) = setup();
        let response = server.get("/api/v1/health").await;
        response.assert_status_ok();
        response.assert_json(&json!({ "status": "ok" }));
    }
}

mod prompts {
    use super::*;

    #[tokio::test]
    async fn current_is_not_found_before_first_load() {
        let (server, _db) = setup();
        let response = server.get("/api/v1/prompts/current").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn serves_fallback_from_empty_database() {
        let (server, _db) = setup();

        let response = server.post("/api/v1/prompts/next").await;
        response.assert_status_ok();
        let outcome: Value = response.json();
        assert_eq!(outcome["prompt"]["source"], "fallback");
        assert_eq!(outcome["asset_started"], false);

        let current: ServedPrompt = server.get("/api/v1/prompts/current").await.json();
        assert_eq!(current.content, outcome["prompt"]["content"]);
    }

    #[tokio::test]
    async fn serves_stored_prompt_and_records_history() {
        let (server, db) = setup();
        let prompt = create_prompt(&db, PromptCategory::Subject);

        let current: Value = server.post("/api/v1/prompts/next").await.json();
        assert_eq!(current["prompt"]["id"], prompt.id.to_string());

        let session: SessionState = server.get("/api/v1/session").await.json();
        assert!(session.session_id.starts_with("session_"));
        assert_eq!(session.prompt_history.front(), Some(&prompt.id));
        assert_eq!(session.last_prompt_id, Some(prompt.id));
    }

    #[tokio::test]
    async fn rejects_next_while_shape_is_loading() {
        let (server, db) = setup();
        create_prompt(&db, PromptCategory::CompleteShape);

        server.post("/api/v1/prompts/next").await.assert_status_ok();

        let controls: Value = server.get("/api/v1/controls").await.json();
        assert_eq!(controls["enabled"], false);
        assert_eq!(controls["loading"], "shape");
        assert_eq!(controls["message"], "A shape is drifting into view...");

        server
            .post("/api/v1/prompts/next")
            .await
            .assert_status(StatusCode::CONFLICT);

        server
            .post("/api/v1/shapes/complete")
            .await
            .assert_status(StatusCode::NO_CONTENT);
        let controls: Value = server.get("/api/v1/controls").await.json();
        assert_eq!(controls["enabled"], true);
        assert_eq!(controls["message"], Value::Null);

        let surface: Value = server.get("/api/v1/surface").await.json();
        let ops: Vec<&str> = surface["commands"]
            .as_array()
            .expect("commands")
            .iter()
            .filter_map(|c| c["op"].as_str())
            .collect();
        assert_eq!(ops, vec!["clear", "shape"]);
    }
}

mod location {
    use super::*;

    #[tokio::test]
    async fn starts_unresolved_with_default_ink() {
        let (server, _db) = setup();
        let view: Value = server.get("/api/v1/location").await.json();
        assert_eq!(view["resolution"]["state"], "unresolved");
        assert_eq!(view["theme"]["ink"][4], "#e6e6e6");
        assert_eq!(view["css"], json!({}));
    }

    #[tokio::test]
    async fn override_applies_named_theme() {
        let (server, db) = setup();
        create_forest_park(&db);

        let response = server
            .post("/api/v1/location/override")
            .json(&json!({ "slug": "forest-park" }))
            .await;
        response.assert_status_ok();

        let view: Value = response.json();
        assert_eq!(view["resolution"]["state"], "resolved");
        assert_eq!(view["resolution"]["context"]["kind"], "named");
        assert_eq!(view["resolution"]["context"]["slug"], "forest-park");
        assert!(view["css"]["--location-primary"]
            .as_str()
            .expect("css variable")
            .starts_with("hsl("));
    }

    #[tokio::test]
    async fn rejects_blank_override() {
        let (server, _db) = setup();
        server
            .post("/api/v1/location/override")
            .json(&json!({ "slug": "  " }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reported_fix_outside_radius_is_virtual() {
        let (server, db) = setup();
        create_forest_park(&db);

        let view: Value = server
            .post("/api/v1/location/position")
            .json(&json!({ "latitude": 41.8781, "longitude": -87.6298 }))
            .await
            .json();

        assert_eq!(view["resolution"]["context"]["kind"], "virtual");
        assert_eq!(view["resolution"]["context"]["name"], "Your Location");
        assert_eq!(view["theme"]["ink"][0], "#000000");
        assert_eq!(view["theme"]["ink"][1], "#333333");
    }

    #[tokio::test]
    async fn reported_permission_denial_is_none() {
        let (server, _db) = setup();

        let view: Value = server
            .post("/api/v1/location/position")
            .json(&json!({ "code": 1, "message": "User denied Geolocation" }))
            .await
            .json();

        assert_eq!(view["resolution"]["context"]["kind"], "none");
        assert_eq!(view["theme"]["palette"], Value::Null);
    }
}
