use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use storage::Database;
use storage::services::{Lifecycle, SystemClock};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod error;
mod features;
mod middleware;
mod state;

#[cfg(test)]
mod api_tests;

use config::Config;
use features::live::broadcaster::LiveBroadcaster;
use middleware::auth::ApiKeys;
use state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        features::competitions::handlers::list_competitions,
        features::competitions::handlers::get_competition,
        features::competitions::handlers::registration_status,
        features::competitions::handlers::standings,
        features::competitions::handlers::create_competition,
        features::competitions::handlers::update_competition,
        features::competitions::handlers::delete_competition,
        features::competitions::handlers::publish_competition,
        features::competitions::handlers::start_competition,
        features::competitions::handlers::complete_competition,
        features::competitions::handlers::cancel_competition,
        features::entries::handlers::list_participants,
        features::entries::handlers::register_participant,
        features::entries::handlers::remove_participant,
        features::entries::handlers::confirm_participant,
        features::entries::handlers::disqualify_participant,
        features::payments::handlers::get_commission_rate,
        features::payments::handlers::get_payment,
        features::payments::handlers::list_competition_payments,
        features::payments::handlers::complete_payment,
        features::payments::handlers::fail_payment,
        features::payments::handlers::refund_payment,
        features::performances::handlers::list_performances,
        features::performances::handlers::submit_performance,
        features::performances::handlers::approve_performance,
        features::performances::handlers::reject_performance,
        features::performances::handlers::assign_play_order,
        features::performances::handlers::advance_queue,
        features::scoring::handlers::record_scores,
        features::scoring::handlers::compute_ranking,
        features::live::handlers::subscribe,
        features::live::handlers::react,
        features::live::handlers::vote,
        features::live::handlers::chat,
        features::live::handlers::start_broadcast,
        features::admin::handlers::update_commission_rate,
        features::admin::handlers::process_due_transitions,
    ),
    components(
        schemas(
            storage::dto::competition::CreateCompetitionRequest,
            storage::dto::competition::UpdateCompetitionRequest,
            storage::dto::competition::CompetitionResponse,
            storage::dto::competition::RegistrationStatusResponse,
            storage::dto::competition::CancellationResponse,
            storage::dto::competition::RefundReport,
            storage::dto::competition::RefundFailure,
            storage::dto::competition::DueTransitions,
            storage::dto::competition::TransitionFailure,
            storage::dto::entry::RegisterParticipantRequest,
            storage::dto::entry::DisqualifyRequest,
            storage::dto::entry::Registration,
            storage::dto::payment::FailPaymentRequest,
            storage::dto::payment::UpdateCommissionRateRequest,
            storage::dto::payment::CommissionRateResponse,
            storage::dto::performance::SubmitPerformanceRequest,
            storage::dto::performance::RejectPerformanceRequest,
            storage::dto::performance::PlayOrderRequest,
            storage::dto::performance::AdvanceOutcome,
            storage::dto::scoring::RecordScoresRequest,
            storage::dto::scoring::RankingEntry,
            storage::dto::scoring::CompetitionResults,
            storage::dto::live::ReactRequest,
            storage::dto::live::VoteRequest,
            storage::dto::live::ChatRequest,
            storage::dto::live::ReactionOutcome,
            storage::models::Competition,
            storage::models::CompetitionStatus,
            storage::models::RegistrationStatus,
            storage::models::Prize,
            storage::models::JudgingCriterion,
            storage::models::Participant,
            storage::models::ParticipantStatus,
            storage::models::EntryPaymentStatus,
            storage::models::Payment,
            storage::models::PaymentStatus,
            storage::models::Performance,
            storage::models::PerformanceStatus,
            storage::models::ChatMessage,
            storage::models::ReactionCount,
            storage::models::VoteTally,
            storage::services::LiveEvent,
            storage::services::LiveEventType,
        )
    ),
    tags(
        (name = "competitions", description = "Competition lifecycle"),
        (name = "entries", description = "Registration and participant management"),
        (name = "payments", description = "Entry payments, refunds and commission"),
        (name = "performances", description = "Submission review and the live play queue"),
        (name = "scoring", description = "Judge scores and rankings"),
        (name = "live", description = "Spectator interactions and the live event stream"),
        (name = "admin", description = "Platform settings and scheduler hooks"),
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("API Key")
                        .build(),
                ),
            )
        }
    }
}

pub(crate) fn app(state: AppState, api_keys: ApiKeys) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600));

    Router::new()
        .merge(features::competitions::routes::routes(api_keys.clone()))
        .merge(features::entries::routes::routes(api_keys.clone()))
        .merge(features::payments::routes::routes(api_keys.clone()))
        .merge(features::performances::routes::routes(api_keys.clone()))
        .merge(features::scoring::routes::routes(api_keys.clone()))
        .merge(features::live::routes::routes(api_keys.clone()))
        .merge(features::admin::routes::routes(api_keys))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Periodic sweep for deployments without an external scheduler.
fn spawn_scheduler(engine: Lifecycle, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if let Err(e) = engine.registry.process_due_transitions().await {
                tracing::warn!("Due transition sweep failed: {}", e);
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("Starting competition lifecycle API");

    let config = Config::from_env().context("Failed to load API configuration")?;
    tracing::info!("Configuration loaded successfully");

    tracing::info!(
        "Connecting to database at: {}",
        config
            .database_url
            .split('@')
            .next_back()
            .unwrap_or("unknown")
    );
    let db = Database::new(&config.database_url)
        .await
        .context("Failed to initialize database")?;
    tracing::info!("Database connection established");

    tracing::info!("Running database migrations");
    db.run_migrations()
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Database migrations completed successfully");

    let broadcaster = LiveBroadcaster::new(config.event_buffer);
    let engine = db.lifecycle(
        Arc::new(SystemClock),
        Arc::new(broadcaster.clone()),
        config.commission_cache_ttl,
    );

    if let Some(period) = config.scheduler_interval {
        tracing::info!("Scheduling due transitions every {:?}", period);
        spawn_scheduler(engine.clone(), period);
    }

    let api_keys = ApiKeys::from_comma_separated(&config.api_keys);
    let state = AppState {
        engine,
        broadcaster,
    };

    let bind_address = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server at http://{}", bind_address);
    tracing::info!(
        "Swagger UI available at http://{}/swagger-ui/",
        bind_address
    );

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;
    axum::serve(listener, app(state, api_keys))
        .await
        .context("Server error")?;

    Ok(())
}
