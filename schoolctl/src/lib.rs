//! # schoolctl: administration backend for a school
//!
//! `schoolctl` is the server behind a school's staff dashboard and parent-facing forms. It
//! tracks families from their first admission application through enrollment, billing and
//! day-to-day staff collaboration.
//!
//! ## Overview
//!
//! A family starts as a **lead**: a public application carrying one or more prospective
//! students and their parents. Admissions staff move the lead through its statuses, assign
//! follow-up **tasks**, and send **enrollment forms**. When a parent submits a form the lead is
//! converted into **students**, each with a financial account, and accounting is notified.
//!
//! The billing side keeps a ledger per student (invoices, payments and credits), a catalogue of
//! preset invoice items, subsidy programs and recurring tuition plans. A background scheduler
//! turns due subscriptions into invoices and emails them to the family.
//!
//! Staff belong to **departments**, which decide which dashboards they see and which
//! notifications they receive. A single **super admin** owns the installation: they register
//! once with an emailed one-time code and can do everything staff can do.
//!
//! ## Architecture
//!
//! The HTTP layer is [Axum](https://github.com/tokio-rs/axum) and every piece of state lives in
//! PostgreSQL, accessed through the repositories in [`db::handlers`]. Each write endpoint opens
//! a transaction, performs its changes together with the matching activity log entry, and
//! commits before any email or push message leaves the process.
//!
//! ### Request Flow
//!
//! 1. CORS and tracing middleware wrap every request
//! 2. Routes under `/api` are matched; authenticated routes extract the caller from the
//!    `Authorization: Bearer` session token ([`auth::current_user`])
//! 3. Permission extractors check the caller's role and departments ([`auth::permissions`])
//! 4. The handler runs its repository calls inside a transaction
//! 5. Errors are converted into JSON `{"message": ...}` bodies ([`errors::Error`])
//!
//! ### Background Services
//!
//! - **Recurring invoicing**: [`invoicing::run_invoicing_loop`] runs a pass on the configured
//!   interval until shutdown. The same pass is available once from the command line with
//!   `--generate-invoices`.
//!
//! ## Configuration
//!
//! Configuration is loaded from a YAML file (default `config.yaml`) with environment variable
//! overrides prefixed `SCHOOLCTL_`, plus the raw `DATABASE_URL`. See [`config::Config`].
//!
//! ## Getting Started
//!
//! ```no_run
//! use schoolctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let app = Application::new(config).await?;
//!     app.serve(async { tokio::signal::ctrl_c().await.ok(); }).await
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
mod email;
pub mod errors;
pub mod invoicing;
mod notifications;
mod openapi;
mod push;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use crate::{config::CorsOrigin, email::EmailService, invoicing::InvoicingSummary, openapi::ApiDoc, push::PushDispatcher};
use axum::{
    Json, Router,
    http::{self, HeaderName, HeaderValue, Method},
    routing::{delete, get, post, put},
};
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::{CancellationToken, DropGuard};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .email(Arc::new(email))
///     .push(Arc::new(push))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub email: Arc<EmailService>,
    pub push: Arc<PushDispatcher>,
}

/// Get the schoolctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Connect to the configured database and bring the schema up to date
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let settings = &config.database.pool;
    info!(
        max_connections = settings.max_connections,
        min_connections = settings.min_connections,
        "Connecting to database"
    );

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout)
        .connect(&config.database.url)
        .await?;

    migrator().run(&pool).await?;
    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.auth.security.cors;

    let mut origins = Vec::new();
    for origin in &cors_config.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            // Browsers send origins without the trailing slash `Url` adds
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut exposed = vec![http::header::LOCATION];
    for name in &cors_config.exposed_headers {
        let header = name.parse::<HeaderName>()?;
        if !exposed.contains(&header) {
            exposed.push(header);
        }
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(cors_config.allow_credentials)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .expose_headers(exposed);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Routes served under `/api`
fn api_routes() -> Router<AppState> {
    use api::handlers::{
        activity, auth, billing, dashboard, departments, enrollment, leads, messaging, notifications, staff, students,
        subsidies, superadmin, tasks,
    };

    Router::new()
        // Authentication
        .route("/auth/login", post(auth::login))
        .route("/superadmin/check", get(superadmin::check))
        .route("/superadmin/register", post(superadmin::register))
        .route("/superadmin/verify", post(superadmin::verify))
        .route("/superadmin/login", post(superadmin::login))
        .route("/superadmin/profile", get(superadmin::profile))
        // Organisation
        .route("/departments", get(departments::list_departments).post(departments::create_department))
        .route(
            "/departments/{id}",
            put(departments::update_department).delete(departments::delete_department),
        )
        .route("/staff", get(staff::list_staff).post(staff::create_staff))
        .route("/staff/{id}", put(staff::update_staff).delete(staff::delete_staff))
        // Admissions
        .route("/admissions/leads", get(leads::list_leads).post(leads::create_lead))
        .route("/admissions/leads/{token}", get(leads::get_lead).put(leads::update_lead))
        .route("/admissions/leads/{token}/details", put(leads::update_lead_details))
        .route("/students/from-lead/{lead_id}", post(students::convert_lead))
        .route("/students", get(students::list_students))
        .route("/students/{id}", get(students::get_student))
        // Tasks
        .route("/tasks", post(tasks::create_task))
        .route("/tasks/my-tasks", get(tasks::my_tasks))
        .route("/tasks/my-tasks/count", get(tasks::my_task_count))
        .route("/tasks/lead/{token}", get(tasks::lead_tasks))
        .route("/tasks/{id}", put(tasks::update_task))
        .route("/tasks/{id}/status", put(tasks::update_task_status))
        // Messaging
        .route("/messaging/users", get(messaging::list_contacts))
        .route(
            "/messaging/conversations",
            get(messaging::list_conversations).post(messaging::create_conversation),
        )
        .route(
            "/messaging/conversations/{id}/messages",
            get(messaging::list_messages).post(messaging::send_message),
        )
        .route("/administration/message-logs", get(messaging::list_message_logs))
        // Notifications
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/mark-all-as-read", post(notifications::mark_all_read))
        .route("/push/vapid-key", get(notifications::vapid_key))
        .route("/push/subscribe", post(notifications::subscribe))
        // Billing
        .route(
            "/billing/preset-items",
            get(billing::list_preset_items).post(billing::create_preset_item),
        )
        .route(
            "/billing/preset-items/{id}",
            put(billing::update_preset_item).delete(billing::delete_preset_item),
        )
        .route("/billing/accounts", get(billing::list_accounts))
        .route("/billing/accounts/{student_id}", get(billing::get_ledger))
        .route("/billing/accounts/{student_id}/invoices", post(billing::create_invoice))
        .route("/billing/accounts/{student_id}/payments", post(billing::record_payment))
        .route("/billing/accounts/{student_id}/credits", post(billing::add_credit))
        .route("/billing/plans", get(billing::list_plans).post(billing::create_plan))
        .route(
            "/billing/subscriptions",
            get(billing::list_subscriptions).post(billing::create_subscriptions),
        )
        .route("/subsidies", get(subsidies::list_subsidies).post(subsidies::create_subsidy))
        // Enrollment
        .route("/enrollment/forms", get(enrollment::list_forms).post(enrollment::create_form))
        .route(
            "/enrollment/forms/{id}",
            get(enrollment::get_form)
                .put(enrollment::update_form)
                .delete(enrollment::delete_form),
        )
        .route("/enrollment/forms/{id}/copy", post(enrollment::copy_form))
        .route("/enrollment/forms/{id}/send", post(enrollment::send_form))
        .route("/enrollment/submissions", get(enrollment::list_submissions))
        .route("/enrollment/submissions/{id}", delete(enrollment::delete_submission))
        .route("/enrollment/submissions/{id}/resend", post(enrollment::resend_submission))
        .route("/enrollment/potential-recipients", get(enrollment::potential_recipients))
        .route(
            "/enrollment/public/submission/{token}",
            get(enrollment::public_submission).post(enrollment::public_submit),
        )
        // Audit and dashboards
        .route("/activity/logs", get(activity::list_activity_logs))
        .route("/dashboard/overview", get(dashboard::overview))
        .route("/accounting/overview", get(dashboard::accounting_overview))
        .route("/administration/overview", get(dashboard::administration_overview))
        .route("/profile", get(dashboard::profile))
        .route("/profile/change-password", put(dashboard::change_password))
}

/// Build the main application router with all endpoints and middleware.
///
/// - API routes nested under `/api`
/// - OpenAPI document at `/api/openapi.json`, rendered at `/api/docs`
/// - `/healthz` liveness check
/// - CORS and tracing middleware
///
/// # Errors
///
/// Returns an error if the CORS configuration is invalid.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let api = api_routes()
        .route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .with_state(state.clone());

    let router = Router::new().route("/healthz", get(|| async { "OK" })).nest("/api", api);

    let cors_layer = create_cors_layer(&state.config)?;
    let router = router.layer(cors_layer);

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Container for background services and their lifecycle management.
///
/// Dropping the struct cancels the shutdown token through `drop_guard`, which stops every
/// task; [`shutdown`](BackgroundServices::shutdown) additionally waits for them to finish.
pub struct BackgroundServices {
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
    shutdown_token: CancellationToken,
    // Pub so that we can disarm it if we want to
    pub drop_guard: Option<DropGuard>,
}

impl BackgroundServices {
    /// Gracefully shutdown all background tasks
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();

        for handle in self.background_tasks {
            let _ = handle.await;
        }
    }
}

/// Start the background services enabled in `config`
fn setup_background_services(pool: PgPool, email: Arc<EmailService>, config: &Config) -> BackgroundServices {
    let shutdown_token = CancellationToken::new();
    let mut background_tasks = Vec::new();

    if config.background_services.invoicing.enabled {
        background_tasks.push(tokio::spawn(invoicing::run_invoicing_loop(
            pool,
            email,
            config.clone(),
            shutdown_token.clone(),
        )));
    } else {
        info!("Recurring invoice scheduler disabled");
    }

    BackgroundServices {
        background_tasks,
        drop_guard: Some(shutdown_token.clone().drop_guard()),
        shutdown_token,
    }
}

/// Run one recurring-invoice pass for today and return what it did
pub async fn generate_invoices(config: &Config) -> anyhow::Result<InvoicingSummary> {
    let pool = setup_database(config).await?;
    let email = EmailService::new(config)?;

    let summary = invoicing::run_invoicing_pass(&pool, &email, config, chrono::Utc::now().date_naive()).await;
    pool.close().await;
    summary
}

/// Main application struct that owns all resources and manages the lifecycle.
///
/// 1. **Create**: [`Application::new`] connects to the database, runs migrations and starts
///    background services
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: when the shutdown future resolves, stops background services and closes
///    the pool
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
    bg_services: BackgroundServices,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Like [`Application::new`], reusing `pool` instead of connecting when given
    pub async fn new_with_pool(config: Config, pool: Option<PgPool>) -> anyhow::Result<Self> {
        debug!("Starting schoolctl with configuration: {:#?}", config);

        let pool = match pool {
            Some(pool) => {
                migrator().run(&pool).await?;
                pool
            }
            None => setup_database(&config).await?,
        };

        let email = Arc::new(EmailService::new(&config)?);
        let push = Arc::new(PushDispatcher::new(&config.push)?);

        let bg_services = setup_background_services(pool.clone(), email.clone(), &config);

        let app_state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .email(email)
            .push(push)
            .build();

        let router = build_router(&app_state)?;

        Ok(Self {
            router,
            config,
            pool,
            bg_services,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> (axum_test::TestServer, BackgroundServices) {
        let server = axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server");
        (server, self.bg_services)
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "schoolctl listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        self.bg_services.shutdown().await;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
