//! API request and response data models.
//!
//! These types define the public HTTP contract and are kept separate from the
//! database models in [`crate::db::models`]. Every model is annotated with
//! `utoipa` so it shows up in the generated OpenAPI document.
//!
//! - [`auth`]: sessions, the super admin bootstrap, and the caller's identity
//! - [`staff`], [`departments`]: school directory
//! - [`leads`], [`students`], [`enrollment`]: admissions and enrollment
//! - [`tasks`], [`notifications`], [`messaging`], [`activity`]: staff collaboration
//! - [`billing`], [`subsidies`]: accounting
//! - [`dashboard`]: overview counters and the caller's profile

pub mod activity;
pub mod auth;
pub mod billing;
pub mod dashboard;
pub mod departments;
pub mod enrollment;
pub mod leads;
pub mod messaging;
pub mod notifications;
pub mod pagination;
pub mod staff;
pub mod students;
pub mod subsidies;
pub mod tasks;
