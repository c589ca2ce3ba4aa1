use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::{auth_middleware, rate_limit_middleware, rbac_middleware};
use crate::state::AppState;

/// Create the main application router with all routes and middleware
#[tracing::instrument(skip(state))]
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Unauthenticated endpoints that accept credentials or provider callbacks
    let throttled_routes = Router::new()
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/login", post(handlers::pages::login_submit))
        .route("/webhooks/nylas", post(handlers::webhooks::nylas_webhook))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/", get(handlers::pages::root))
        .route("/login", get(handlers::pages::login_page))
        .route("/logout", get(handlers::pages::logout))
        .route("/health", get(handlers::health::health_check))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/refresh", post(handlers::auth::refresh_token))
        .route("/webhooks/nylas", get(handlers::webhooks::nylas_challenge));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        // Session and organization management
        .route("/api/auth/switch", post(handlers::auth::switch_organization))
        .route("/api/auth/me", get(handlers::auth::me))
        .route(
            "/api/orgs",
            get(handlers::organizations::list_organizations)
                .post(handlers::organizations::create_organization),
        )
        .route(
            "/api/org",
            get(handlers::organizations::get_organization)
                .put(handlers::organizations::update_organization)
                .delete(handlers::organizations::delete_organization),
        )
        .route(
            "/api/org/members",
            get(handlers::organizations::list_members).post(handlers::organizations::add_member),
        )
        .route(
            "/api/org/members/:user_id",
            put(handlers::organizations::update_member_role)
                .delete(handlers::organizations::remove_member),
        )
        // CRM
        .route(
            "/api/contacts",
            get(handlers::contacts::list_contacts).post(handlers::contacts::create_contact),
        )
        .route("/api/contacts/import", post(handlers::contacts::import_contacts))
        .route("/api/contacts/export", get(handlers::contacts::export_contacts))
        .route(
            "/api/contacts/:id",
            get(handlers::contacts::get_contact)
                .put(handlers::contacts::update_contact)
                .delete(handlers::contacts::delete_contact),
        )
        .route(
            "/api/deals",
            get(handlers::deals::list_deals).post(handlers::deals::create_deal),
        )
        .route("/api/deals/metrics", get(handlers::deals::sales_metrics))
        .route(
            "/api/deals/:id",
            get(handlers::deals::get_deal)
                .put(handlers::deals::update_deal)
                .delete(handlers::deals::delete_deal),
        )
        .route("/api/deals/:id/stage", put(handlers::deals::move_stage))
        .route(
            "/api/activities",
            get(handlers::activities::list_activities).post(handlers::activities::log_activity),
        )
        .route("/api/activities/:id", delete(handlers::activities::delete_activity))
        // Projects and onboarding
        .route(
            "/api/projects",
            get(handlers::projects::list_projects).post(handlers::projects::create_project),
        )
        .route(
            "/api/projects/:id",
            get(handlers::projects::get_project).delete(handlers::projects::delete_project),
        )
        .route("/api/projects/:id/status", put(handlers::projects::update_project_status))
        .route(
            "/api/projects/:id/tasks",
            get(handlers::projects::list_tasks).post(handlers::projects::create_task),
        )
        .route("/api/projects/:id/onboarding", post(handlers::onboarding::start_session))
        .route(
            "/api/templates",
            get(handlers::projects::list_templates).post(handlers::projects::create_template),
        )
        .route("/api/templates/:id", get(handlers::projects::get_template))
        .route("/api/tasks/:id", delete(handlers::projects::delete_task))
        .route("/api/tasks/:id/status", put(handlers::projects::update_task_status))
        .route("/api/onboarding/:id", get(handlers::onboarding::get_session))
        .route(
            "/api/onboarding/:id/steps/:index",
            put(handlers::onboarding::save_step),
        )
        .route("/api/onboarding/:id/complete", post(handlers::onboarding::complete_session))
        // Mail
        .route(
            "/api/mailboxes",
            get(handlers::emails::list_mailboxes).post(handlers::emails::connect_mailbox),
        )
        .route("/api/mailboxes/:id/status", get(handlers::emails::mailbox_status))
        .route("/api/mailboxes/:id/sync", post(handlers::emails::trigger_sync))
        .route("/api/emails", get(handlers::emails::list_messages))
        .route("/api/emails/:id/read", put(handlers::emails::mark_read))
        .route("/api/threads", get(handlers::emails::list_threads))
        .route("/api/threads/:id", get(handlers::emails::get_thread))
        .route("/api/threads/:id/summarize", post(handlers::emails::summarize_thread))
        .route("/api/threads/:id/draft-reply", post(handlers::emails::draft_reply))
        .route("/api/threads/:id/reply", post(handlers::emails::send_reply))
        .route("/api/screening/queue", get(handlers::screening::screener_queue))
        .route(
            "/api/screening/decisions",
            get(handlers::screening::list_decisions).post(handlers::screening::record_decision),
        )
        .route(
            "/api/screening/decisions/:sender",
            delete(handlers::screening::clear_decision),
        )
        // Voice campaigns
        .route(
            "/api/campaigns",
            get(handlers::campaigns::list_campaigns).post(handlers::campaigns::create_campaign),
        )
        .route("/api/campaigns/categorize", post(handlers::campaigns::bulk_categorize))
        .route(
            "/api/campaigns/:id",
            get(handlers::campaigns::get_campaign)
                .put(handlers::campaigns::update_campaign)
                .delete(handlers::campaigns::delete_campaign),
        )
        .route("/api/campaigns/:id/status", put(handlers::campaigns::change_status))
        // Billing
        .route("/api/billing/usage", get(handlers::billing::usage_summary))
        .route("/api/billing/usage/:metric", get(handlers::billing::check_usage))
        .route("/api/billing/plan", put(handlers::billing::change_plan))
        // Reminders and notifications
        .route(
            "/api/reminders",
            get(handlers::reminders::list_upcoming).post(handlers::reminders::create_reminder),
        )
        .route("/api/reminders/:id", delete(handlers::reminders::cancel_reminder))
        .route("/api/reminders/:id/snooze", put(handlers::reminders::snooze_reminder))
        .route("/api/notifications", get(handlers::reminders::list_notifications))
        .route(
            "/api/notifications/:id/read",
            put(handlers::reminders::mark_notification_read),
        )
        // Server-rendered pages
        .route("/app/dashboard", get(handlers::pages::dashboard))
        .route("/app/mail/:placement", get(handlers::pages::mail))
        .route("/app/screener/decide", post(handlers::pages::screener_decide))
        .route(
            "/app/onboarding/:session_id",
            get(handlers::pages::onboarding_page).post(handlers::pages::onboarding_submit),
        )
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    rbac_middleware,
                )),
        );

    // Metrics endpoint (no authentication for Prometheus scraping)
    let metrics_routes = Router::new().route("/metrics", get(handlers::metrics::metrics_handler));

    // Combine all routes
    Router::new()
        .merge(throttled_routes)
        .merge(public_routes)
        .merge(protected_routes)
        .merge(metrics_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
