use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use chrono::{TimeZone, Utc};
use serde_json::{Value, json};
use storage::repository::MemoryStore;
use storage::services::{FixedClock, Lifecycle};
use tower::ServiceExt;
use uuid::Uuid;

use crate::app;
use crate::features::live::broadcaster::LiveBroadcaster;
use crate::middleware::auth::{ACTOR_ID_HEADER, ACTOR_ROLE_HEADER, ApiKeys};
use crate::state::AppState;

const API_KEY: &str = "test-key";

struct TestApp {
    router: Router,
    clock: Arc<FixedClock>,
    organizer: Uuid,
}

fn test_app() -> TestApp {
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2025, 5, 20, 10, 0, 0).unwrap(),
    ));
    let broadcaster = LiveBroadcaster::new(64);
    let engine = Lifecycle::new(
        Arc::new(MemoryStore::new()),
        clock.clone(),
        Arc::new(broadcaster.clone()),
        Duration::from_secs(3600),
    );
    let state = AppState {
        engine,
        broadcaster,
    };

    TestApp {
        router: app(state, ApiKeys::from_comma_separated(API_KEY)),
        clock,
        organizer: Uuid::new_v4(),
    }
}

fn competition_body(slug: &str, entry_fee: u32, max_participants: i32) -> Value {
    json!({
        "name": "Summer Beatbox Battle",
        "slug": slug,
        "rules": "Two minutes, no backing track",
        "entry_fee": entry_fee,
        "max_participants": max_participants,
        "start_date": "2025-06-01",
        "start_time": "18:00:00",
        "duration_minutes": 120,
        "prizes": [
            { "position": 1, "percentage": 60 },
            { "position": 2, "percentage": 40 }
        ],
        "judging_criteria": [
            { "name": "flow", "weight": 40 },
            { "name": "technique", "weight": 60 }
        ]
    })
}

impl TestApp {
    async fn call(
        &self,
        method: Method,
        uri: &str,
        actor: Option<(Uuid, &str)>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {API_KEY}"));
        if let Some((user_id, role)) = actor {
            builder = builder
                .header(ACTOR_ID_HEADER, user_id.to_string())
                .header(ACTOR_ROLE_HEADER, role);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn published(&self, slug: &str, entry_fee: u32, max_participants: i32) -> String {
        let (status, created) = self
            .call(
                Method::POST,
                "/api/competitions",
                Some((self.organizer, "user")),
                Some(competition_body(slug, entry_fee, max_participants)),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["competition_id"].as_str().unwrap().to_string();

        let (status, published) = self
            .call(
                Method::POST,
                &format!("/api/competitions/{id}/publish"),
                Some((self.organizer, "user")),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(published["status"], "published");
        id
    }

    async fn register(&self, competition_id: &str, user: Uuid) -> (StatusCode, Value) {
        self.call(
            Method::POST,
            &format!("/api/competitions/{competition_id}/participants"),
            Some((user, "user")),
            Some(json!({})),
        )
        .await
    }
}

#[tokio::test]
async fn test_public_listing_needs_no_credentials() {
    let app = test_app();
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/competitions")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_mutations_require_api_key_and_actor() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/competitions")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(competition_body("no-key", 0, 8).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/competitions",
            None,
            Some(competition_body("no-actor", 0, 8)),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn test_invalid_payload_reports_field_details() {
    let app = test_app();
    let mut body = competition_body("Bad Slug!", 0, 8);
    body["max_participants"] = json!(0);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/competitions",
            Some((app.organizer, "user")),
            Some(body),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_failed");
    assert!(body["details"].as_array().unwrap().len() >= 2);
}

#[tokio::test]
async fn test_registration_outcomes() {
    let app = test_app();
    let id = app.published("full-house", 0, 2).await;
    let first = Uuid::new_v4();

    let (status, registration) = app.register(&id, first).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(registration["participant"]["user_id"], first.to_string());
    assert!(registration["payment"].is_null());

    let (status, body) = app.register(&id, first).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "already_registered");

    let (status, _) = app.register(&id, Uuid::new_v4()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.register(&id, Uuid::new_v4()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "competition_full");
    assert_eq!(body["status_code"], "full");

    let (status, registration) = app
        .call(
            Method::GET,
            &format!("/api/competitions/{id}/registration"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(registration["status"], "full");
    assert_eq!(registration["can_register"], false);
}

#[tokio::test]
async fn test_draft_rejects_registration_with_status_code() {
    let app = test_app();
    let (_, created) = app
        .call(
            Method::POST,
            "/api/competitions",
            Some((app.organizer, "user")),
            Some(competition_body("still-draft", 0, 8)),
        )
        .await;
    let id = created["competition_id"].as_str().unwrap();

    let (status, body) = app.register(id, Uuid::new_v4()).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "registration_closed");
    assert_eq!(body["status_code"], "not_published");
}

#[tokio::test]
async fn test_only_organizer_publishes() {
    let app = test_app();
    let (_, created) = app
        .call(
            Method::POST,
            "/api/competitions",
            Some((app.organizer, "user")),
            Some(competition_body("owned", 0, 8)),
        )
        .await;
    let id = created["competition_id"].as_str().unwrap();

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/competitions/{id}/publish"),
            Some((Uuid::new_v4(), "user")),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");
}

#[tokio::test]
async fn test_paid_entry_opens_pending_payment_until_callback() {
    let app = test_app();
    let id = app.published("paid-entry", 5000, 8).await;
    let entrant = Uuid::new_v4();

    let (status, registration) = app.register(&id, entrant).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(registration["payment"]["status"], "pending");
    let payment_id = registration["payment"]["payment_id"].as_str().unwrap();

    let (status, payment) = app
        .call(
            Method::POST,
            &format!("/api/payments/{payment_id}/complete"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payment["status"], "completed");

    let (status, payment) = app
        .call(
            Method::GET,
            &format!("/api/payments/{payment_id}"),
            Some((entrant, "user")),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payment["status"], "completed");

    let (status, _) = app
        .call(
            Method::GET,
            &format!("/api/payments/{payment_id}"),
            Some((Uuid::new_v4(), "user")),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_live_flow_scores_and_completes() {
    let app = test_app();
    let id = app.published("live-flow", 0, 8).await;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let (_, alice_entry) = app.register(&id, alice).await;
    let (_, bob_entry) = app.register(&id, bob).await;
    let alice_id = alice_entry["participant"]["participant_id"].as_str().unwrap().to_string();
    let bob_id = bob_entry["participant"]["participant_id"].as_str().unwrap().to_string();

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/competitions/{id}/start"),
            Some((app.organizer, "user")),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "not_yet_due");

    app.clock
        .set(Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).unwrap());
    let (status, live) = app
        .call(
            Method::POST,
            &format!("/api/competitions/{id}/start"),
            Some((app.organizer, "user")),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(live["status"], "active");

    for (participant, flow, technique) in [(&alice_id, 80, 90), (&bob_id, 95, 70)] {
        let (status, _) = app
            .call(
                Method::PUT,
                &format!("/api/participants/{participant}/scores"),
                Some((app.organizer, "user")),
                Some(json!({ "scores": { "flow": flow, "technique": technique } })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/competitions/{id}/votes"),
            Some((Uuid::new_v4(), "user")),
            Some(json!({ "participant_id": alice_id, "score": 5 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_vote");

    let (status, results) = app
        .call(
            Method::POST,
            &format!("/api/competitions/{id}/complete"),
            Some((app.organizer, "user")),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results["competition"]["status"], "completed");
    let standings = results["standings"].as_array().unwrap();
    assert_eq!(standings.len(), 2);
    assert_eq!(standings[0]["participant_id"], alice_id);
    assert_eq!(standings[0]["position"], 1);
    assert_eq!(standings[1]["participant_id"], bob_id);
}

#[tokio::test]
async fn test_commission_rate_is_admin_only() {
    let app = test_app();

    let (status, _) = app
        .call(
            Method::PUT,
            "/api/admin/commission",
            Some((Uuid::new_v4(), "user")),
            Some(json!({ "rate": 12 })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(
            Method::PUT,
            "/api/admin/commission",
            Some((Uuid::new_v4(), "admin")),
            Some(json!({ "rate": 12 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.call(Method::GET, "/api/commission", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rate"], "12");
}

#[tokio::test]
async fn test_scheduler_hook_starts_due_competitions() {
    let app = test_app();
    let id = app.published("scheduled", 0, 8).await;

    app.clock
        .set(Utc.with_ymd_and_hms(2025, 6, 1, 18, 5, 0).unwrap());
    let (status, report) = app
        .call(Method::POST, "/api/admin/transitions", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["started"], json!([id.as_str()]));

    let (_, competition) = app
        .call(Method::GET, &format!("/api/competitions/{id}"), None, None)
        .await;
    assert_eq!(competition["status"], "active");
}

#[tokio::test]
async fn test_live_stream_for_unknown_competition_is_404() {
    let app = test_app();
    let (status, body) = app
        .call(
            Method::GET,
            &format!("/api/competitions/{}/live", Uuid::new_v4()),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}
