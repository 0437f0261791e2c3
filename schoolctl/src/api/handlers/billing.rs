//! Student accounts, invoices, payments, credits and recurring billing plans.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;

use crate::{
    AppState,
    api::{
        handlers::activity_entry,
        models::{
            auth::{CurrentUser, MessageResponse, required},
            billing::{
                AccountSummaryResponse, BillingPlanCreate, BillingPlanResponse, CreditCreate, CreditResponse, InvoiceCreate,
                InvoiceResponse, LedgerResponse, PaymentCreate, PaymentResponse, PresetItemCreate, PresetItemResponse,
                PresetItemUpdate, SubscriptionCreate, SubscriptionResponse, SubscriptionsCreated, build_ledger, parse_plan_date,
            },
        },
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{ActivityLogs, Billing, PresetItems, Repository, Students, Subscriptions, preset_items::PresetItemFilter},
        models::{
            billing::{
                BillingPlanCreateDBRequest, CreditCreateDBRequest, DEFAULT_PAYMENT_METHOD, FinancialAccountDBResponse,
                INVOICE_STATUSES, InvoiceCreateDBRequest, InvoiceItemFields, MONTHLY_CYCLE, PaymentCreateDBRequest,
                PresetItemCreateDBRequest, PresetItemUpdateDBRequest, SubscriptionCreateDBRequest,
            },
            students::StudentDBResponse,
        },
    },
    errors::{Error, Result},
    invoicing::first_invoice_date,
    types::StudentId,
};
use sqlx::PgConnection;

const DEFAULT_INVOICE_STATUS: &str = "Draft";

/// The student and their financial account, 404 when either is missing
async fn student_account(conn: &mut PgConnection, student_id: StudentId) -> Result<(StudentDBResponse, FinancialAccountDBResponse)> {
    let student = Students::new(conn)
        .get_by_id(student_id)
        .await?
        .ok_or_else(|| Error::not_found("Student", student_id))?;
    let account = Billing::new(conn)
        .account_for_student(student_id)
        .await?
        .ok_or_else(|| Error::not_found("Financial account for student", student_id))?;
    Ok((student, account))
}

fn positive_amount(amount: Option<Decimal>) -> Result<Decimal> {
    amount
        .filter(|a| *a > Decimal::ZERO)
        .ok_or_else(|| Error::bad_request("Amount must be greater than zero"))
}

fn day_of_month(value: Option<u32>, field: &str) -> Result<u32> {
    match value {
        None => Ok(1),
        Some(day @ 1..=31) => Ok(day),
        Some(_) => Err(Error::bad_request(format!("{field} must be between 1 and 31"))),
    }
}

#[utoipa::path(
    get,
    path = "/billing/preset-items",
    tag = "billing",
    summary = "Preset charge items",
    responses((status = 200, description = "Active preset items by description", body = Vec<PresetItemResponse>)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_preset_items(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Billing, operation::ReadAll>,
) -> Result<Json<Vec<PresetItemResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let items = PresetItems::new(&mut conn).list(&PresetItemFilter { active_only: true }).await?;
    Ok(Json(items.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/billing/preset-items",
    request_body = PresetItemCreate,
    tag = "billing",
    summary = "Create a preset charge item",
    responses(
        (status = 201, description = "Created", body = PresetItemResponse),
        (status = 400, description = "Missing description or amount"),
        (status = 409, description = "Description already in use"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_preset_item(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Billing, operation::CreateAll>,
    Json(request): Json<PresetItemCreate>,
) -> Result<(StatusCode, Json<PresetItemResponse>)> {
    let (Some(description), Some(amount)) = (required(&request.description), request.amount) else {
        return Err(Error::bad_request("Description and amount are required"));
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let item = PresetItems::new(&mut conn)
        .create(&PresetItemCreateDBRequest {
            description: description.to_string(),
            amount,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(item.into())))
}

#[utoipa::path(
    put,
    path = "/billing/preset-items/{id}",
    request_body = PresetItemUpdate,
    tag = "billing",
    summary = "Update a preset charge item",
    params(("id" = i64, Path, description = "Preset item id")),
    responses(
        (status = 200, description = "Updated", body = PresetItemResponse),
        (status = 404, description = "Preset item not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_preset_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    _: RequiresPermission<resource::Billing, operation::UpdateAll>,
    Json(request): Json<PresetItemUpdate>,
) -> Result<Json<PresetItemResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = PresetItems::new(&mut conn);
    if repo.get_by_id(id).await?.is_none() {
        return Err(Error::not_found("Preset item", id));
    }

    let item = repo
        .update(
            id,
            &PresetItemUpdateDBRequest {
                description: required(&request.description).map(str::to_string),
                amount: request.amount,
                is_active: request.is_active,
            },
        )
        .await?;

    Ok(Json(item.into()))
}

#[utoipa::path(
    delete,
    path = "/billing/preset-items/{id}",
    tag = "billing",
    summary = "Delete a preset charge item",
    params(("id" = i64, Path, description = "Preset item id")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Preset item not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_preset_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    _: RequiresPermission<resource::Billing, operation::DeleteAll>,
) -> Result<Json<MessageResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !PresetItems::new(&mut conn).delete(id).await? {
        return Err(Error::not_found("Preset item", id));
    }
    Ok(Json(MessageResponse::new("Preset item deleted")))
}

/// Every active student's account; missing accounts are opened on the way
#[utoipa::path(
    get,
    path = "/billing/accounts",
    tag = "billing",
    summary = "Student accounts",
    responses((status = 200, description = "One row per active student", body = Vec<AccountSummaryResponse>)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_accounts(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Billing, operation::ReadAll>,
) -> Result<Json<Vec<AccountSummaryResponse>>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut billing = Billing::new(&mut tx);

    let opened = billing.ensure_accounts_for_active_students().await?;
    if opened > 0 {
        tracing::info!(opened, "Opened missing financial accounts");
    }
    let summaries = billing.account_summaries().await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(summaries.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/billing/accounts/{student_id}",
    tag = "billing",
    summary = "Student ledger",
    params(("student_id" = i64, Path, description = "Student id")),
    responses(
        (status = 200, description = "Ledger, newest first", body = LedgerResponse),
        (status = 404, description = "Student not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_ledger(
    State(state): State<AppState>,
    Path(student_id): Path<StudentId>,
    _: RequiresPermission<resource::Billing, operation::ReadAll>,
) -> Result<Json<LedgerResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let student = Students::new(&mut conn)
        .get_by_id(student_id)
        .await?
        .ok_or_else(|| Error::not_found("Student", student_id))?;

    let mut billing = Billing::new(&mut conn);
    let (transactions, summary) = match billing.account_for_student(student_id).await? {
        Some(account) => {
            let invoices = billing.invoices_for_account(account.id).await?;
            let payments = billing.payments_for_account(account.id).await?;
            let credits = billing.credits_for_account(account.id).await?;
            build_ledger(&invoices, &payments, &credits)
        }
        None => build_ledger(&[], &[], &[]),
    };

    Ok(Json(LedgerResponse {
        transactions,
        summary,
        student_name: student.full_name(),
    }))
}

#[utoipa::path(
    post,
    path = "/billing/accounts/{student_id}/invoices",
    request_body = InvoiceCreate,
    tag = "billing",
    summary = "Create an invoice",
    params(("student_id" = i64, Path, description = "Student id")),
    responses(
        (status = 201, description = "Invoice created", body = InvoiceResponse),
        (status = 400, description = "No items or an unknown status"),
        (status = 404, description = "Student or account not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_invoice(
    State(state): State<AppState>,
    Path(student_id): Path<StudentId>,
    current_user: CurrentUser,
    _: RequiresPermission<resource::Billing, operation::CreateAll>,
    Json(request): Json<InvoiceCreate>,
) -> Result<(StatusCode, Json<InvoiceResponse>)> {
    if request.items.is_empty() {
        return Err(Error::bad_request("An invoice needs at least one item"));
    }
    let status = required(&request.status).unwrap_or(DEFAULT_INVOICE_STATUS);
    if !INVOICE_STATUSES.contains(&status) {
        return Err(Error::bad_request(format!("Unknown invoice status '{status}'")));
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let (student, account) = student_account(&mut tx, student_id).await?;

    let invoice = Billing::new(&mut tx)
        .create_invoice(&InvoiceCreateDBRequest {
            account_id: account.id,
            status: status.to_string(),
            due_date: request.due_date,
            items: request
                .items
                .into_iter()
                .map(|i| InvoiceItemFields {
                    description: i.description,
                    amount: i.amount,
                })
                .collect(),
        })
        .await?;

    let student_name = student.full_name();
    ActivityLogs::new(&mut tx)
        .create(
            &activity_entry(&current_user, format!("Created invoice for {student_name}")).with_target(
                "Invoice",
                invoice.id,
                &student_name,
            ),
        )
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok((StatusCode::CREATED, Json(invoice.into())))
}

/// Record a payment; an invoice whose payments cover its total becomes `Paid`
#[utoipa::path(
    post,
    path = "/billing/accounts/{student_id}/payments",
    request_body = PaymentCreate,
    tag = "billing",
    summary = "Record a payment",
    params(("student_id" = i64, Path, description = "Student id")),
    responses(
        (status = 201, description = "Payment recorded", body = PaymentResponse),
        (status = 400, description = "Amount not positive"),
        (status = 404, description = "Student, account or invoice not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn record_payment(
    State(state): State<AppState>,
    Path(student_id): Path<StudentId>,
    current_user: CurrentUser,
    _: RequiresPermission<resource::Billing, operation::CreateAll>,
    Json(request): Json<PaymentCreate>,
) -> Result<(StatusCode, Json<PaymentResponse>)> {
    let amount = positive_amount(request.amount)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let (student, account) = student_account(&mut tx, student_id).await?;
    let mut billing = Billing::new(&mut tx);

    let invoice = match request.invoice_id {
        Some(invoice_id) => Some(
            billing
                .get_invoice(invoice_id)
                .await?
                .filter(|i| i.account_id == account.id)
                .ok_or_else(|| Error::not_found("Invoice", invoice_id))?,
        ),
        None => None,
    };

    let payment = billing
        .record_payment(&PaymentCreateDBRequest {
            account_id: account.id,
            invoice_id: request.invoice_id,
            amount,
            method: required(&request.method).unwrap_or(DEFAULT_PAYMENT_METHOD).to_string(),
            notes: required(&request.notes).map(str::to_string),
        })
        .await?;

    if let Some(invoice) = invoice
        && billing.invoice_paid_total(invoice.id).await? >= invoice.total
    {
        billing.set_invoice_status(invoice.id, "Paid").await?;
        tracing::debug!(invoice_id = invoice.id, "Invoice fully paid");
    }

    let student_name = student.full_name();
    ActivityLogs::new(&mut tx)
        .create(
            &activity_entry(&current_user, format!("Recorded payment of ${amount} for {student_name}")).with_target(
                "Payment",
                payment.id,
                &student_name,
            ),
        )
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok((StatusCode::CREATED, Json(payment.into())))
}

#[utoipa::path(
    post,
    path = "/billing/accounts/{student_id}/credits",
    request_body = CreditCreate,
    tag = "billing",
    summary = "Add a credit",
    params(("student_id" = i64, Path, description = "Student id")),
    responses(
        (status = 201, description = "Credit added", body = CreditResponse),
        (status = 400, description = "Amount not positive or reason missing"),
        (status = 404, description = "Student or account not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn add_credit(
    State(state): State<AppState>,
    Path(student_id): Path<StudentId>,
    current_user: CurrentUser,
    _: RequiresPermission<resource::Billing, operation::CreateAll>,
    Json(request): Json<CreditCreate>,
) -> Result<(StatusCode, Json<CreditResponse>)> {
    let amount = positive_amount(request.amount)?;
    let reason = required(&request.reason).ok_or_else(|| Error::bad_request("A reason is required"))?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let (student, account) = student_account(&mut tx, student_id).await?;

    let credit = Billing::new(&mut tx)
        .add_credit(&CreditCreateDBRequest {
            account_id: account.id,
            amount,
            reason: reason.to_string(),
        })
        .await?;

    let student_name = student.full_name();
    ActivityLogs::new(&mut tx)
        .create(
            &activity_entry(&current_user, format!("Added credit of ${amount} for {student_name}")).with_target(
                "Credit",
                credit.id,
                &student_name,
            ),
        )
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok((StatusCode::CREATED, Json(credit.into())))
}

#[utoipa::path(
    get,
    path = "/billing/plans",
    tag = "billing",
    summary = "Billing plan templates",
    responses((status = 200, description = "Active plans by name", body = Vec<BillingPlanResponse>)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_plans(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Billing, operation::ReadAll>,
) -> Result<Json<Vec<BillingPlanResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let plans = Subscriptions::new(&mut conn).list_plans().await?;
    Ok(Json(plans.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/billing/plans",
    request_body = BillingPlanCreate,
    tag = "billing",
    summary = "Create a billing plan template",
    responses(
        (status = 201, description = "Plan created", body = BillingPlanResponse),
        (status = 400, description = "Missing name or items"),
        (status = 409, description = "Name already in use"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_plan(
    State(state): State<AppState>,
    current_user: CurrentUser,
    _: RequiresPermission<resource::Billing, operation::CreateAll>,
    Json(request): Json<BillingPlanCreate>,
) -> Result<(StatusCode, Json<BillingPlanResponse>)> {
    let (Some(name), Some(items_json)) = (required(&request.name), request.items_json.filter(|v| !v.is_null())) else {
        return Err(Error::bad_request("Plan name and items are required"));
    };

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let plan = Subscriptions::new(&mut tx)
        .create_plan(&BillingPlanCreateDBRequest {
            name: name.to_string(),
            items_json,
        })
        .await?;

    ActivityLogs::new(&mut tx)
        .create(
            &activity_entry(&current_user, format!("Created billing plan template: '{}'", plan.name)).with_target(
                "BillingPlan",
                plan.id,
                &plan.name,
            ),
        )
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok((StatusCode::CREATED, Json(plan.into())))
}

#[utoipa::path(
    get,
    path = "/billing/subscriptions",
    tag = "billing",
    summary = "Active recurring plans",
    responses((status = 200, description = "Active subscriptions with student and total", body = Vec<SubscriptionResponse>)),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Billing, operation::ReadAll>,
) -> Result<Json<Vec<SubscriptionResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let subscriptions = Subscriptions::new(&mut conn).list_active().await?;
    Ok(Json(subscriptions.into_iter().map(Into::into).collect()))
}

/// Put each selected student on the same recurring plan; students without an account are skipped
#[utoipa::path(
    post,
    path = "/billing/subscriptions",
    request_body = SubscriptionCreate,
    tag = "billing",
    summary = "Create recurring plans",
    responses(
        (status = 201, description = "Recurring plans created", body = SubscriptionsCreated),
        (status = 400, description = "Missing students, plan name, start date or items"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_subscriptions(
    State(state): State<AppState>,
    current_user: CurrentUser,
    _: RequiresPermission<resource::Billing, operation::CreateAll>,
    Json(request): Json<SubscriptionCreate>,
) -> Result<(StatusCode, Json<SubscriptionsCreated>)> {
    let plan = request.plan_data.unwrap_or_default();
    if request.student_ids.is_empty() {
        return Err(Error::bad_request("Select at least one student"));
    }
    let (Some(plan_name), Some(start), Some(items_json)) = (
        required(&plan.plan_name),
        required(&plan.start_date),
        plan.items_json.clone().filter(|v| !v.is_null()),
    ) else {
        return Err(Error::bad_request("Plan name, start date and items are required"));
    };
    let start_date = parse_plan_date(start).ok_or_else(|| Error::bad_request(format!("Invalid start date '{start}'")))?;
    let end_date = match required(&plan.end_date) {
        Some(end) => Some(parse_plan_date(end).ok_or_else(|| Error::bad_request(format!("Invalid end date '{end}'")))?),
        None => None,
    };
    let generation_day = day_of_month(plan.invoice_generation_day, "Invoice generation day")?;
    let due_day = day_of_month(plan.due_day, "Due day")?;
    let cycle = required(&plan.cycle).unwrap_or(MONTHLY_CYCLE);
    let next_invoice_date = first_invoice_date(start_date, generation_day);

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut created = 0;
    for student_id in &request.student_ids {
        let Some(account) = Billing::new(&mut tx).account_for_student(*student_id).await? else {
            tracing::debug!(student_id, "Skipping student without a financial account");
            continue;
        };
        Subscriptions::new(&mut tx)
            .create(&SubscriptionCreateDBRequest {
                account_id: account.id,
                plan_name: plan_name.to_string(),
                cycle: cycle.to_string(),
                start_date,
                end_date,
                invoice_generation_day: generation_day as i32,
                due_day: due_day as i32,
                next_invoice_date,
                items_json: items_json.clone(),
            })
            .await?;
        created += 1;
    }

    ActivityLogs::new(&mut tx)
        .create(&activity_entry(
            &current_user,
            format!("Created recurring plan '{plan_name}' for {} student(s)", request.student_ids.len()),
        ))
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok((
        StatusCode::CREATED,
        Json(SubscriptionsCreated {
            message: "Recurring plans created successfully.".to_string(),
            created,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::day_of_month;
    use crate::{
        api::models::billing::{AccountSummaryResponse, InvoiceResponse, PresetItemResponse, SubscriptionsCreated},
        db::{
            handlers::{ActivityLogs, Billing, Students},
            models::students::StudentDBResponse,
        },
        test_utils::*,
    };
    use axum::http::StatusCode;
    use rust_decimal::Decimal;
    use serde_json::json;
    use sqlx::PgPool;
    use std::str::FromStr;

    async fn enrolled_student(pool: &PgPool, first_name: &str) -> StudentDBResponse {
        let lead = create_test_lead(pool, first_name).await;
        let mut conn = pool.acquire().await.unwrap();
        let converted = Students::new(&mut conn).convert_lead(&lead).await.unwrap().unwrap();
        Students::new(&mut conn).get_by_id(converted.student_id).await.unwrap().unwrap()
    }

    #[test]
    fn test_day_of_month_bounds() {
        assert_eq!(day_of_month(None, "Due day").unwrap(), 1);
        assert_eq!(day_of_month(Some(31), "Due day").unwrap(), 31);
        assert!(day_of_month(Some(0), "Due day").is_err());
        assert!(day_of_month(Some(32), "Due day").is_err());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_preset_items_crud(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let staff = create_test_staff(&pool, "Bea Bursar", &[]).await;
        let auth = add_auth_headers(&staff_user(staff.id, &staff.name, &["Accounting"]));

        let response = app
            .post("/api/billing/preset-items")
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({"description": "Tuition", "amount": "950.00"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let tuition: PresetItemResponse = response.json();

        app.post("/api/billing/preset-items")
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({"description": "Tuition", "amount": "1.00"}))
            .await
            .assert_status(StatusCode::CONFLICT);
        app.post("/api/billing/preset-items")
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({"description": "Lunch"}))
            .await
            .assert_status_bad_request();

        app.put(&format!("/api/billing/preset-items/{}", tuition.id))
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({"is_active": false}))
            .await
            .assert_status_ok();
        let items: Vec<PresetItemResponse> = app
            .get("/api/billing/preset-items")
            .add_header(auth.0.clone(), auth.1.clone())
            .await
            .json();
        assert!(items.is_empty());

        app.delete(&format!("/api/billing/preset-items/{}", tuition.id))
            .add_header(auth.0.clone(), auth.1.clone())
            .await
            .assert_status_ok();
        app.delete(&format!("/api/billing/preset-items/{}", tuition.id))
            .add_header(auth.0, auth.1)
            .await
            .assert_status_not_found();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_invoice_payment_and_ledger(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let staff = create_test_staff(&pool, "Bea Bursar", &[]).await;
        let auth = add_auth_headers(&staff_user(staff.id, &staff.name, &["Accounting"]));
        let student = enrolled_student(&pool, "Ada").await;

        // Accounts are opened lazily by the listing
        let accounts: Vec<AccountSummaryResponse> = app
            .get("/api/billing/accounts")
            .add_header(auth.0.clone(), auth.1.clone())
            .await
            .json();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].student_name, "Ada Student");
        assert_eq!(accounts[0].open_balance, Decimal::ZERO);

        let base = format!("/api/billing/accounts/{}", student.id);
        app.post(&format!("{base}/invoices"))
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({"items": []}))
            .await
            .assert_status_bad_request();

        let response = app
            .post(&format!("{base}/invoices"))
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({
                "items": [{"description": "Tuition", "amount": "100.00"}, {"description": "Lunch", "amount": "20.00"}],
                "status": "Sent"
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let invoice: InvoiceResponse = response.json();
        assert_eq!(invoice.total_amount, Decimal::from_str("120.00").unwrap());

        app.post(&format!("{base}/payments"))
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({"amount": "0"}))
            .await
            .assert_status_bad_request();

        app.post(&format!("{base}/payments"))
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({"amount": "50.00", "invoice_id": invoice.id}))
            .await
            .assert_status(StatusCode::CREATED);

        let mut conn = pool.acquire().await.unwrap();
        let stored = Billing::new(&mut conn).get_invoice(invoice.id).await.unwrap().unwrap();
        assert_eq!(stored.status, "Sent");

        app.post(&format!("{base}/payments"))
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({"amount": "70.00", "invoice_id": invoice.id, "method": "Card"}))
            .await
            .assert_status(StatusCode::CREATED);
        let stored = Billing::new(&mut conn).get_invoice(invoice.id).await.unwrap().unwrap();
        assert_eq!(stored.status, "Paid");

        app.post(&format!("{base}/credits"))
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({"amount": "10.00"}))
            .await
            .assert_status_bad_request();
        app.post(&format!("{base}/credits"))
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({"amount": "10.00", "reason": "Sibling discount"}))
            .await
            .assert_status(StatusCode::CREATED);

        let ledger: serde_json::Value = app.get(&base).add_header(auth.0.clone(), auth.1.clone()).await.json();
        assert_eq!(ledger["student_name"], "Ada Student");
        assert_eq!(ledger["transactions"].as_array().unwrap().len(), 4);
        assert_eq!(ledger["transactions"][0]["type"], "Credit");
        assert_eq!(ledger["transactions"][1]["description"], "Payment via Card");
        assert_eq!(ledger["transactions"][3]["description"], "Tuition, Lunch");

        let logs = ActivityLogs::new(&mut conn).list(0, 10).await.unwrap();
        let actions: Vec<_> = logs.iter().map(|l| l.action.as_str()).collect();
        assert!(actions.contains(&"Created invoice for Ada Student"));
        assert!(actions.contains(&"Recorded payment of $70.00 for Ada Student"));
        assert!(actions.contains(&"Added credit of $10.00 for Ada Student"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_ledger_without_account_is_empty(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let staff = create_test_staff(&pool, "Bea Bursar", &[]).await;
        let auth = add_auth_headers(&staff_user(staff.id, &staff.name, &[]));
        let student = enrolled_student(&pool, "Ben").await;
        sqlx::query("DELETE FROM student_financial_accounts WHERE student_id = $1")
            .bind(student.id)
            .execute(&pool)
            .await
            .unwrap();

        let ledger: serde_json::Value = app
            .get(&format!("/api/billing/accounts/{}", student.id))
            .add_header(auth.0.clone(), auth.1.clone())
            .await
            .json();
        assert!(ledger["transactions"].as_array().unwrap().is_empty());

        app.post(&format!("/api/billing/accounts/{}/invoices", student.id))
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({"items": [{"description": "Tuition", "amount": "1.00"}]}))
            .await
            .assert_status_not_found();

        app.get("/api/billing/accounts/999999")
            .add_header(auth.0, auth.1)
            .await
            .assert_status_not_found();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_plans_and_subscriptions(pool: PgPool) {
        let (app, _bg) = create_test_app(pool.clone()).await;
        let staff = create_test_staff(&pool, "Bea Bursar", &[]).await;
        let auth = add_auth_headers(&staff_user(staff.id, &staff.name, &[]));
        let with_account = enrolled_student(&pool, "Cy").await;
        let without_account = enrolled_student(&pool, "Dee").await;
        // Conversion opens an account; drop one to exercise the skip
        sqlx::query("DELETE FROM student_financial_accounts WHERE student_id = $1")
            .bind(without_account.id)
            .execute(&pool)
            .await
            .unwrap();

        let items = json!([{"description": "Tuition", "amount": "800"}, {"description": "Lunch", "amount": 45.5}]);
        app.post("/api/billing/plans")
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({"name": "Standard"}))
            .await
            .assert_status_bad_request();
        app.post("/api/billing/plans")
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({"name": "Standard", "items_json": items}))
            .await
            .assert_status(StatusCode::CREATED);
        let plans: serde_json::Value = app
            .get("/api/billing/plans")
            .add_header(auth.0.clone(), auth.1.clone())
            .await
            .json();
        assert_eq!(plans[0]["name"], "Standard");

        let response = app
            .post("/api/billing/subscriptions")
            .add_header(auth.0.clone(), auth.1.clone())
            .json(&json!({
                "student_ids": [with_account.id, without_account.id],
                "plan_data": {
                    "plan_name": "Standard",
                    "cycle": "Monthly",
                    "start_date": "2025-09-10T00:00:00.000Z",
                    "invoice_generation_day": 5,
                    "due_day": 15,
                    "items_json": items
                }
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let created: SubscriptionsCreated = response.json();
        assert_eq!(created.created, 1);
        assert_eq!(created.message, "Recurring plans created successfully.");

        let subscriptions: serde_json::Value = app
            .get("/api/billing/subscriptions")
            .add_header(auth.0, auth.1)
            .await
            .json();
        assert_eq!(subscriptions.as_array().unwrap().len(), 1);
        assert_eq!(subscriptions[0]["student_name"], "Cy Student");
        assert_eq!(subscriptions[0]["next_invoice_date"], "2025-10-05");
        assert_eq!(subscriptions[0]["total_amount"], "845.5");

        // The activity entry counts the students that were selected, skipped ones included
        let logged: String = sqlx::query_scalar("SELECT action FROM activity_logs ORDER BY id DESC LIMIT 1")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(logged, "Created recurring plan 'Standard' for 2 student(s)");
    }
}
