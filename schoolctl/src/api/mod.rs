//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! Every route is served under `/api`:
//!
//! - **Authentication** (`/auth/*`, `/superadmin/*`): Staff login and the super admin bootstrap
//! - **People** (`/staff/*`, `/departments/*`, `/profile/*`): Roster, departments and the caller
//! - **Admissions** (`/admissions/*`, `/students/*`, `/tasks/*`): Leads, conversion and follow-ups
//! - **Communication** (`/notifications/*`, `/messaging/*`): Notifications, push and messaging
//! - **Finance** (`/billing/*`, `/subsidies`, `/accounting/overview`): Billing and subsidies
//! - **Enrollment** (`/enrollment/*`): Forms and the public form pages
//! - **Administration** (`/activity/logs`, `/administration/*`, `/dashboard/*`): Audit and counters
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with `utoipa`. The rendered docs are served at `/api/docs`.

pub mod handlers;
pub mod models;
