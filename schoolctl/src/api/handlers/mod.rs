//! HTTP request handlers for all API endpoints.
//!
//! Handlers validate the request, check permissions through the extractors in
//! [`crate::auth`], run their writes and activity log entries in one transaction, and only
//! send emails or pushes after that transaction commits.
//!
//! # Handler Modules
//!
//! - [`auth`]: Staff login
//! - [`superadmin`]: Super admin bootstrap (register, verify, login) and profile
//! - [`staff`]: Staff roster
//! - [`departments`]: Departments and their dashboard routes
//! - [`leads`]: Public admission applications and the admissions dashboard
//! - [`students`]: Lead conversion and the student directory
//! - [`tasks`]: Lead follow-up tasks
//! - [`activity`]: Activity log
//! - [`notifications`]: In-app notifications and push subscriptions
//! - [`messaging`]: Conversations and the message log
//! - [`dashboard`]: Dashboard counters, profile and password changes
//! - [`billing`]: Accounts, invoices, payments, credits and recurring plans
//! - [`enrollment`]: Enrollment forms, submissions and the public form pages
//! - [`subsidies`]: Subsidy programs

pub mod activity;
pub mod auth;
pub mod billing;
pub mod dashboard;
pub mod departments;
pub mod enrollment;
pub mod leads;
pub mod messaging;
pub mod notifications;
pub mod staff;
pub mod students;
pub mod subsidies;
pub mod superadmin;
pub mod tasks;

use crate::{api::models::auth::CurrentUser, db::models::activity::ActivityLogCreateDBRequest};

/// Activity log entry attributed to the caller
pub(crate) fn activity_entry(user: &CurrentUser, action: impl Into<String>) -> ActivityLogCreateDBRequest {
    ActivityLogCreateDBRequest::by(user.id, user.actor_type(), &user.name, action)
}
