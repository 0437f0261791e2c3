//! Repository implementations for database access.
//!
//! This module provides repository structs for each major entity in the system.
//! Repositories that manage a plain table implement the [`Repository`] trait; the rest
//! expose the operations their workflows need.
//!
//! # Design Pattern
//!
//! Each repository:
//! - Wraps a SQLx connection or transaction
//! - Provides strongly-typed operations
//! - Handles query construction and parameter binding
//! - Returns domain models from [`crate::db::models`]
//!
//! # Available Repositories
//!
//! - [`SuperAdmins`]: The super admin account and pending registrations
//! - [`Staff`]: Staff accounts and department membership
//! - [`Departments`]: Departments and the seeded core departments
//! - [`Leads`]: Admission applications with their students and parents
//! - [`Students`]: Enrolled students, parents and lead conversion
//! - [`Tasks`]: Lead follow-up tasks and their assignments
//! - [`ActivityLogs`]: Audit trail of mutating actions
//! - [`Notifications`]: In-app notifications for staff
//! - [`PushSubscriptions`]: Browser push subscriptions
//! - [`Conversations`]: Messaging conversations, messages and the message log
//! - [`Billing`]: Financial accounts, invoices, payments and credits
//! - [`PresetItems`]: Reusable invoice line items
//! - [`Subscriptions`]: Billing plan templates and recurring subscriptions
//! - [`EnrollmentForms`] / [`EnrollmentSubmissions`]: Enrollment packets sent to families
//! - [`Subsidies`]: Subsidy programs
//!
//! # Common Pattern
//!
//! ```ignore
//! use schoolctl::db::handlers::{Departments, Repository};
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tx = pool.begin().await?;
//!     let mut repo = Departments::new(&mut tx);
//!     let departments = repo.list(&Default::default()).await?;
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```

pub mod activity;
pub mod billing;
pub mod departments;
pub mod enrollment;
pub mod leads;
pub mod messaging;
pub mod notifications;
pub mod preset_items;
pub mod push_subscriptions;
pub mod repository;
pub mod staff;
pub mod students;
pub mod subscriptions;
pub mod subsidies;
pub mod super_admins;
pub mod tasks;

pub use activity::ActivityLogs;
pub use billing::Billing;
pub use departments::Departments;
pub use enrollment::{EnrollmentForms, EnrollmentSubmissions};
pub use leads::Leads;
pub use messaging::Conversations;
pub use notifications::Notifications;
pub use preset_items::PresetItems;
pub use push_subscriptions::PushSubscriptions;
pub use repository::Repository;
pub use staff::Staff;
pub use students::Students;
pub use subscriptions::Subscriptions;
pub use subsidies::Subsidies;
pub use super_admins::SuperAdmins;
pub use tasks::Tasks;
