//! OpenAPI documentation for the `/api/*` surface.
//!
//! Served as JSON at `/api/openapi.json` and rendered with Scalar at `/api/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api;

/// Session tokens issued by the login endpoints.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Session token from `POST /auth/login` or `POST /superadmin/login`:\n\n\
                            ```\nAuthorization: Bearer YOUR_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Schoolctl API",
        description = "Admissions, enrollment, billing and staff collaboration for a single school."
    ),
    servers(
        (url = "/api", description = "Schoolctl API server")
    ),
    modifiers(&SecurityAddon),
    paths(
        api::handlers::auth::login,
        api::handlers::superadmin::check,
        api::handlers::superadmin::register,
        api::handlers::superadmin::verify,
        api::handlers::superadmin::login,
        api::handlers::superadmin::profile,
        api::handlers::departments::create_department,
        api::handlers::departments::list_departments,
        api::handlers::departments::update_department,
        api::handlers::departments::delete_department,
        api::handlers::staff::create_staff,
        api::handlers::staff::list_staff,
        api::handlers::staff::update_staff,
        api::handlers::staff::delete_staff,
        api::handlers::leads::create_lead,
        api::handlers::leads::list_leads,
        api::handlers::leads::get_lead,
        api::handlers::leads::update_lead_details,
        api::handlers::leads::update_lead,
        api::handlers::students::convert_lead,
        api::handlers::students::list_students,
        api::handlers::students::get_student,
        api::handlers::tasks::my_tasks,
        api::handlers::tasks::my_task_count,
        api::handlers::tasks::lead_tasks,
        api::handlers::tasks::create_task,
        api::handlers::tasks::update_task,
        api::handlers::tasks::update_task_status,
        api::handlers::messaging::list_contacts,
        api::handlers::messaging::list_conversations,
        api::handlers::messaging::create_conversation,
        api::handlers::messaging::list_messages,
        api::handlers::messaging::send_message,
        api::handlers::messaging::list_message_logs,
        api::handlers::notifications::list_notifications,
        api::handlers::notifications::mark_all_read,
        api::handlers::notifications::vapid_key,
        api::handlers::notifications::subscribe,
        api::handlers::billing::list_preset_items,
        api::handlers::billing::create_preset_item,
        api::handlers::billing::update_preset_item,
        api::handlers::billing::delete_preset_item,
        api::handlers::billing::list_accounts,
        api::handlers::billing::get_ledger,
        api::handlers::billing::create_invoice,
        api::handlers::billing::record_payment,
        api::handlers::billing::add_credit,
        api::handlers::billing::list_plans,
        api::handlers::billing::create_plan,
        api::handlers::billing::list_subscriptions,
        api::handlers::billing::create_subscriptions,
        api::handlers::subsidies::list_subsidies,
        api::handlers::subsidies::create_subsidy,
        api::handlers::enrollment::list_forms,
        api::handlers::enrollment::create_form,
        api::handlers::enrollment::get_form,
        api::handlers::enrollment::update_form,
        api::handlers::enrollment::delete_form,
        api::handlers::enrollment::copy_form,
        api::handlers::enrollment::list_submissions,
        api::handlers::enrollment::delete_submission,
        api::handlers::enrollment::resend_submission,
        api::handlers::enrollment::potential_recipients,
        api::handlers::enrollment::send_form,
        api::handlers::enrollment::public_submission,
        api::handlers::enrollment::public_submit,
        api::handlers::activity::list_activity_logs,
        api::handlers::dashboard::overview,
        api::handlers::dashboard::accounting_overview,
        api::handlers::dashboard::administration_overview,
        api::handlers::dashboard::profile,
        api::handlers::dashboard::change_password,
    ),
    components(
        schemas(
            api::models::auth::CurrentUser,
            api::models::auth::MessageResponse,
        )
    ),
    tags(
        (name = "authentication", description = "Staff login"),
        (name = "superadmin", description = "Super admin bootstrap and login"),
        (name = "departments", description = "Department management"),
        (name = "staff", description = "Staff management"),
        (name = "admissions", description = "Admission leads"),
        (name = "students", description = "Enrolled students"),
        (name = "tasks", description = "Task assignment"),
        (name = "messaging", description = "Internal conversations"),
        (name = "notifications", description = "In-app notifications"),
        (name = "push", description = "Web push subscriptions"),
        (name = "billing", description = "Ledgers, invoices and recurring plans"),
        (name = "subsidies", description = "Subsidy programs"),
        (name = "enrollment", description = "Enrollment forms and submissions"),
        (name = "activity", description = "Audit trail"),
        (name = "dashboards", description = "Dashboard summaries"),
        (name = "profile", description = "The caller's own account"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_routes_and_security() {
        let doc = ApiDoc::openapi();

        assert!(doc.paths.paths.contains_key("/auth/login"));
        assert!(doc.paths.paths.contains_key("/billing/accounts/{student_id}"));
        assert!(doc.paths.paths.contains_key("/enrollment/public/submission/{token}"));

        let components = doc.components.expect("components present");
        assert!(components.security_schemes.contains_key("BearerAuth"));
    }
}
