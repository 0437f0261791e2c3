//! Database record models matching table schemas.
//!
//! These structs are what repositories in [`crate::db::handlers`] accept and return. They are
//! kept separate from the JSON types in [`crate::api::models`] so that storage and wire formats
//! can evolve independently; conversions live next to the API types.
//!
//! # Model Categories
//!
//! ## People
//!
//! - [`staff`]: Staff accounts and their department memberships
//! - [`departments`]: Departments and their dashboard routes
//! - [`super_admins`]: The single super administrator and pending registrations
//!
//! ## Admissions
//!
//! - [`leads`]: Prospective-student applications with their student and parent data
//! - [`students`]: Enrolled students and their parents
//! - [`enrollment`]: Enrollment forms and per-lead submissions
//!
//! ## Collaboration
//!
//! - [`tasks`]: Tasks attached to leads and assigned to departments or staff
//! - [`messaging`]: Conversations, messages and the message audit log
//! - [`notifications`]: In-app notifications
//! - [`push_subscriptions`]: Browser push subscriptions
//! - [`activity`]: Audit trail of actor/action/target entries
//!
//! ## Money
//!
//! - [`billing`]: Financial accounts, invoices, payments, credits, plans and subscriptions
//! - [`subsidies`]: Subsidy programs

pub mod activity;
pub mod billing;
pub mod departments;
pub mod enrollment;
pub mod leads;
pub mod messaging;
pub mod notifications;
pub mod push_subscriptions;
pub mod staff;
pub mod students;
pub mod subsidies;
pub mod super_admins;
pub mod tasks;
