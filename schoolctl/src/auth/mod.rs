//! Authentication and authorization.
//!
//! # Authentication
//!
//! Every protected route expects an `Authorization: Bearer <jwt>` header. Tokens are issued by
//! `POST /auth/login` (staff) and `POST /superadmin/login` (the super admin) and carry the
//! principal's id, name, role and, for staff, their department names and dashboard routes.
//! There is no server-side session store; a token is valid until it expires.
//!
//! # Authorization
//!
//! See [`permissions`] for the role policy and the [`permissions::RequiresPermission`] extractor.
//!
//! # Modules
//!
//! - [`current_user`]: Extractor for getting the authenticated principal in handlers
//! - [`password`]: Argon2 hashing for passwords and one-time codes
//! - [`permissions`]: Role policy and permission extractor
//! - [`session`]: JWT creation and verification
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use schoolctl::api::models::auth::CurrentUser;
//!
//! async fn protected_handler(current_user: CurrentUser) -> String {
//!     format!("Hello, {}!", current_user.name)
//! }
//! ```

pub mod current_user;
pub mod password;
pub mod permissions;
pub mod session;
