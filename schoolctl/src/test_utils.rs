//! Test utilities for integration testing.

use std::sync::Arc;

use crate::{
    AppState,
    api::models::auth::CurrentUser,
    auth::{
        password::{Argon2Params, hash_string_with_params},
        session,
    },
    config::{BackgroundServicesConfig, Config, EmailConfig, EmailTransportConfig, InvoicingConfig, PasswordConfig, PushConfig},
    db::{
        handlers::{Departments, Leads, Repository, Staff, SuperAdmins},
        models::{
            departments::{DepartmentCreateDBRequest, DepartmentDBResponse},
            leads::{LeadCreateDBRequest, LeadDBResponse, LeadParentFields, LeadStudentFields},
            staff::{StaffCreateDBRequest, StaffDBResponse},
            super_admins::{SuperAdminCreateDBRequest, SuperAdminDBResponse},
        },
    },
    email::EmailService,
    push::PushDispatcher,
    types::{DepartmentId, Role, StaffId, SuperAdminId},
};
use axum_test::TestServer;
use sqlx::PgPool;
use uuid::Uuid;

/// Password of every account created by these helpers
pub const TEST_PASSWORD: &str = "correct-horse-battery";
/// Address the test config allows to register as super admin
pub const TEST_SUPER_ADMIN_EMAIL: &str = "head@school.test";

fn fast_params() -> Argon2Params {
    Argon2Params {
        memory_kib: 128,
        iterations: 1,
        parallelism: 1,
    }
}

pub async fn create_test_app(pool: PgPool) -> (TestServer, crate::BackgroundServices) {
    let config = create_test_config();

    let app = crate::Application::new_with_pool(config, Some(pool))
        .await
        .expect("Failed to create application");

    app.into_test_server()
}

pub fn create_test_config() -> Config {
    // Use temp directory for test emails
    let temp_dir = std::env::temp_dir().join(format!("schoolctl-test-emails-{}", std::process::id()));

    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        super_admin_email: Some(TEST_SUPER_ADMIN_EMAIL.to_string()),
        email: EmailConfig {
            transport: EmailTransportConfig::File {
                path: temp_dir.to_string_lossy().to_string(),
            },
            ..Default::default()
        },
        push: PushConfig {
            vapid_public_key: Some("BTestVapidPublicKey".to_string()),
            ..Default::default()
        },
        background_services: BackgroundServicesConfig {
            invoicing: InvoicingConfig {
                enabled: false,
                ..Default::default()
            },
        },
        ..Default::default()
    };
    config.database.pool.max_connections = 4;
    config.auth.password = PasswordConfig {
        argon2_memory_kib: 128,
        argon2_iterations: 1,
        argon2_parallelism: 1,
    };
    config
}

/// App state over `pool` with the test config; email goes to a temp directory
pub fn create_test_app_state(pool: PgPool) -> AppState {
    let config = create_test_config();
    let email = EmailService::new(&config).expect("Failed to create email service");
    let push = PushDispatcher::new(&config.push).expect("Failed to create push dispatcher");

    AppState::builder()
        .db(pool)
        .config(config)
        .email(Arc::new(email))
        .push(Arc::new(push))
        .build()
}

pub fn staff_user(id: StaffId, name: &str, departments: &[&str]) -> CurrentUser {
    CurrentUser {
        id,
        role: Role::Staff,
        email: format!("{}@school.test", name.to_lowercase().replace(' ', ".")),
        name: name.to_string(),
        department_names: departments.iter().map(|d| d.to_string()).collect(),
        dashboard_routes: vec![],
    }
}

pub fn superadmin_user(id: SuperAdminId, name: &str) -> CurrentUser {
    CurrentUser {
        id,
        role: Role::SuperAdmin,
        email: TEST_SUPER_ADMIN_EMAIL.to_string(),
        name: name.to_string(),
        department_names: vec![],
        dashboard_routes: vec![],
    }
}

/// `Authorization` header carrying a session for `user`
pub fn add_auth_headers(user: &CurrentUser) -> (String, String) {
    let token = session::create_session_token(user, &create_test_config()).expect("Failed to create session token");
    ("authorization".to_string(), format!("Bearer {token}"))
}

pub async fn create_test_department(pool: &PgPool, name: &str, dashboard_route: Option<&str>) -> DepartmentDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Departments::new(&mut conn)
        .create(&DepartmentCreateDBRequest {
            name: name.to_string(),
            description: Some(format!("{name} for tests")),
            dashboard_route: dashboard_route.map(str::to_string),
        })
        .await
        .expect("Failed to create test department")
}

/// Active staff member with [`TEST_PASSWORD`] and a unique email
pub async fn create_test_staff(pool: &PgPool, name: &str, department_ids: &[DepartmentId]) -> StaffDBResponse {
    let password_hash = hash_string_with_params(TEST_PASSWORD, Some(fast_params())).expect("Failed to hash password");
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Staff::new(&mut conn)
        .create(&StaffCreateDBRequest {
            name: name.to_string(),
            email: format!(
                "{}.{}@school.test",
                name.to_lowercase().replace(' ', "."),
                Uuid::new_v4().simple()
            ),
            password_hash,
            department_ids: department_ids.to_vec(),
        })
        .await
        .expect("Failed to create test staff")
}

/// The super admin, registered with [`TEST_SUPER_ADMIN_EMAIL`] and [`TEST_PASSWORD`]
pub async fn create_test_superadmin(pool: &PgPool) -> SuperAdminDBResponse {
    let password_hash = hash_string_with_params(TEST_PASSWORD, Some(fast_params())).expect("Failed to hash password");
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    SuperAdmins::new(&mut conn)
        .create(&SuperAdminCreateDBRequest {
            name: "Head Principal".to_string(),
            email: TEST_SUPER_ADMIN_EMAIL.to_string(),
            password_hash,
        })
        .await
        .expect("Failed to create test super admin")
}

/// A lead with one student `{first_name} Student` and one parent with a unique email
pub async fn create_test_lead(pool: &PgPool, first_name: &str) -> LeadDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Leads::new(&mut conn)
        .create(&LeadCreateDBRequest {
            expected_start_date: None,
            amount: None,
            policy_agreed: true,
            students: vec![LeadStudentFields {
                first_name: first_name.to_string(),
                last_name: "Student".to_string(),
                date_of_birth: None,
                city_state: Some("Springfield, IL".to_string()),
                grade_level: Some("K".to_string()),
            }],
            parents: vec![LeadParentFields {
                first_name: "Pat".to_string(),
                last_name: "Parent".to_string(),
                email: format!("parent.{}@family.test", Uuid::new_v4().simple()),
                phone: None,
            }],
        })
        .await
        .expect("Failed to create test lead")
}
