use driftpad::db::{Database, SeedData};
use driftpad::models::*;
use driftpad::ports::{KeyValueStore, LocationRepository};
use speculate2::speculate;
use uuid::Uuid;

fn create_test_location(db: &Database, slug: &str, is_active: bool) -> LocationRecord {
    db.create_location(CreateLocationInput {
        name: "Forest Park".to_string(),
        slug: slug.to_string(),
        latitude: 38.6359,
        longitude: -90.2951,
        radius_meters: 1500.0,
        city: Some("St. Louis".to_string()),
        state: Some("mo".to_string()),
        is_active: Some(is_active),
    })
    .expect("Failed to create location")
}

fn create_test_prompt(db: &Database, location_id: Option<Uuid>, active: bool) -> PromptRecord {
    db.create_prompt(CreatePromptInput {
        content: "draw the nearest tree".to_string(),
        category: PromptCategory::Subject,
        requires_shape: false,
        requires_gallery_image: false,
        location_id,
        weight: None,
        active: Some(active),
    })
    .expect("Failed to create prompt")
}

fn generic_filter(exclude_ids: Vec<Uuid>) -> PromptFilter {
    PromptFilter {
        location: LocationScope::Generic,
        exclude_ids,
        active_only: true,
    }
}

fn drawing(erase: bool, add: bool, public: bool) -> CreateDrawingInput {
    CreateDrawingInput {
        image_data: Some("data:image/png;base64,AAAA".to_string()),
        image_url: None,
        title: None,
        description: None,
        is_erase_eligible: erase,
        is_add_eligible: add,
        is_public: public,
    }
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
    }

    describe "locations" {
        describe "create_location" {
            it "defaults to active and upper-cases the state" {
                let location = db.create_location(CreateLocationInput {
                    name: "Tower Grove".to_string(),
                    slug: "tower-grove".to_string(),
                    latitude: 38.6,
                    longitude: -90.25,
                    radius_meters: 800.0,
                    city: None,
                    state: Some("mo".to_string()),
                    is_active: None,
                }).expect("Failed to create location");

                assert!(location.is_active);
                assert_eq!(location.state, Some("MO".to_string()));
            }

            it "rejects duplicate slugs" {
                create_test_location(&db, "forest-park", true);
                let result = db.create_location(CreateLocationInput {
                    name: "Other".to_string(),
                    slug: "forest-park".to_string(),
                    latitude: 0.0,
                    longitude: 0.0,
                    radius_meters: 10.0,
                    city: None,
                    state: None,
                    is_active: None,
                });
                assert!(result.is_err());
            }
        }

        describe "get_active_location_by_slug" {
            it "finds an active location" {
                let created = create_test_location(&db, "forest-park", true);
                let found = db.get_active_location_by_slug("forest-park").expect("Query failed");
                assert_eq!(found, Some(created));
            }

            it "ignores inactive locations" {
                create_test_location(&db, "closed-park", false);
                let found = db.get_active_location_by_slug("closed-park").expect("Query failed");
                assert!(found.is_none());
            }
        }

        describe "list_active_locations" {
            it "returns active locations in insertion order" {
                let first = create_test_location(&db, "first", true);
                create_test_location(&db, "hidden", false);
                let third = create_test_location(&db, "third", true);

                let locations = db.list_active_locations().expect("Query failed");
                let ids: Vec<Uuid> = locations.iter().map(|l| l.id).collect();
                assert_eq!(ids, vec![first.id, third.id]);
            }

            it "is exposed through the repository trait" {
                create_test_location(&db, "forest-park", true);
                let locations = tokio_test::block_on(db.list_active()).expect("Query failed");
                assert_eq!(locations.len(), 1);
            }
        }
    }

    describe "prompts" {
        describe "create_prompt" {
            it "defaults weight to one and active to true" {
                let prompt = db.create_prompt(CreatePromptInput {
                    content: "draw a cloud".to_string(),
                    category: PromptCategory::Generative,
                    requires_shape: false,
                    requires_gallery_image: false,
                    location_id: None,
                    weight: None,
                    active: None,
                }).expect("Failed to create prompt");

                assert_eq!(prompt.weight, 1);
                assert!(prompt.active);
            }
        }

        describe "query_prompts" {
            it "scopes generic queries to prompts without a location" {
                let location = create_test_location(&db, "forest-park", true);
                let generic = create_test_prompt(&db, None, true);
                create_test_prompt(&db, Some(location.id), true);

                let prompts = db.query_prompts(&generic_filter(vec![]), 50).expect("Query failed");
                assert_eq!(prompts.len(), 1);
                assert_eq!(prompts[0].id, generic.id);
            }

            it "scopes located queries to that location" {
                let location = create_test_location(&db, "forest-park", true);
                create_test_prompt(&db, None, true);
                let local = create_test_prompt(&db, Some(location.id), true);

                let filter = PromptFilter {
                    location: LocationScope::At(location.id),
                    exclude_ids: vec![],
                    active_only: true,
                };
                let prompts = db.query_prompts(&filter, 50).expect("Query failed");
                assert_eq!(prompts.len(), 1);
                assert_eq!(prompts[0].id, local.id);
            }

            it "skips inactive prompts" {
                create_test_prompt(&db, None, false);
                let prompts = db.query_prompts(&generic_filter(vec![]), 50).expect("Query failed");
                assert!(prompts.is_empty());
            }

            it "excludes the given ids" {
                let a = create_test_prompt(&db, None, true);
                let b = create_test_prompt(&db, None, true);
                let c = create_test_prompt(&db, None, true);

                let prompts = db.query_prompts(&generic_filter(vec![a.id, c.id]), 50).expect("Query failed");
                let ids: Vec<Uuid> = prompts.iter().map(|p| p.id).collect();
                assert_eq!(ids, vec![b.id]);
            }

            it "respects the limit" {
                for _ in 0..5 {
                    create_test_prompt(&db, None, true);
                }
                let prompts = db.query_prompts(&generic_filter(vec![]), 3).expect("Query failed");
                assert_eq!(prompts.len(), 3);
            }
        }
    }

    describe "drawings" {
        describe "query_drawings" {
            it "filters by direction and visibility" {
                let erase = db.create_drawing(drawing(true, false, true)).expect("Failed to create drawing");
                db.create_drawing(drawing(false, true, true)).expect("Failed to create drawing");
                db.create_drawing(drawing(true, false, false)).expect("Failed to create drawing");

                let filter = DrawingFilter { eligibility: Eligibility::Erase, public_only: true };
                let drawings = db.query_drawings(&filter, 10).expect("Query failed");
                assert_eq!(drawings.len(), 1);
                assert_eq!(drawings[0].id, erase.id);
            }

            it "returns nothing when no drawing is eligible" {
                db.create_drawing(drawing(false, true, true)).expect("Failed to create drawing");
                let filter = DrawingFilter { eligibility: Eligibility::Erase, public_only: true };
                let drawings = db.query_drawings(&filter, 10).expect("Query failed");
                assert!(drawings.is_empty());
            }
        }
    }

    describe "key value store" {
        it "round trips and overwrites values" {
            assert_eq!(db.get("missing").expect("get failed"), None);

            db.set("driftpad_session_id", "session_1_abc").expect("set failed");
            db.set("driftpad_session_id", "session_2_def").expect("set failed");
            assert_eq!(
                db.get("driftpad_session_id").expect("get failed"),
                Some("session_2_def".to_string())
            );

            db.remove("driftpad_session_id").expect("remove failed");
            assert_eq!(db.get("driftpad_session_id").expect("get failed"), None);
        }
    }

    describe "seed" {
        it "links prompts to locations by slug" {
            let data = SeedData::from_json(r#"{
                "locations": [
                    { "name": "Forest Park", "slug": "forest-park", "latitude": 38.6359,
                      "longitude": -90.2951, "radius_meters": 1500, "city": "St. Louis", "state": "MO" }
                ],
                "prompts": [
                    { "content": "draw the boathouse", "category": "subject", "location_slug": "forest-park" },
                    { "content": "draw a cloud", "category": "generative", "weight": 3 }
                ],
                "drawings": [
                    { "image_url": "https://example.test/a.png", "is_erase_eligible": true, "is_public": true }
                ]
            }"#).expect("Invalid seed");

            let summary = db.seed(data).expect("Seed failed");
            assert_eq!((summary.locations, summary.prompts, summary.drawings), (1, 2, 1));

            let location = db.get_active_location_by_slug("forest-park").expect("Query failed").expect("location");
            let filter = PromptFilter {
                location: LocationScope::At(location.id),
                exclude_ids: vec![],
                active_only: true,
            };
            let local = db.query_prompts(&filter, 50).expect("Query failed");
            assert_eq!(local.len(), 1);
            assert_eq!(local[0].content, "draw the boathouse");

            let generic = db.query_prompts(&generic_filter(vec![]), 50).expect("Query failed");
            assert_eq!(generic[0].weight, 3);
        }

        it "fails on an unknown location slug" {
            let data = SeedData::from_json(r#"{
                "prompts": [ { "content": "x", "category": "subject", "location_slug": "nowhere" } ]
            }"#).expect("Invalid seed");
            assert!(db.seed(data).is_err());
        }
    }

    describe "open" {
        it "creates the database file and parent directories" {
            let dir = tempfile::tempdir().expect("tempdir");
            let path = dir.path().join("nested").join("driftpad.db");

            let on_disk = Database::open(path.clone()).expect("open failed");
            on_disk.migrate().expect("migrate failed");
            create_test_location(&on_disk, "forest-park", true);

            assert!(path.exists());
            let reopened = Database::open(path).expect("reopen failed");
            assert_eq!(reopened.list_active_locations().expect("Query failed").len(), 1);
        }
    }
}
