use crate::{
    api::{db_error, internal, paging},
    auth::auth::AuthUser,
    model::employee::Employee,
    state::AppState,
    store::change_feed::{EMPLOYEES, ChangeOp},
    store::directory::{Directory, RosterEntry},
    utils::{
        audit::record_action,
        db_utils::{build_update_sql, execute_update},
        lookup_filter::CARD_FILTER,
    },
};
use actix_web::{HttpRequest, HttpResponse, Responder, error::ErrorInternalServerError, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

const EMPLOYEE_COLUMNS: &str = "id, employee_code, first_name, last_name, email, phone, \
     department, position, card_id, hire_date, status";

/// Columns a partial update may touch.
const UPDATABLE: &[&str] = &[
    "employee_code",
    "first_name",
    "last_name",
    "email",
    "phone",
    "department",
    "position",
    "card_id",
    "hire_date",
    "status",
];

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "EMP-001")]
    pub employee_code: String,
    #[schema(example = "Ana")]
    pub first_name: String,
    #[schema(example = "Ruiz")]
    pub last_name: Option<String>,
    #[schema(example = "ana.ruiz@company.com", format = "email")]
    pub email: String,
    pub phone: Option<String>,
    #[schema(example = "Operations")]
    pub department: Option<String>,
    #[schema(example = "Technician")]
    pub position: Option<String>,
    #[schema(example = "04A1B2C3")]
    pub card_id: Option<String>,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub hire_date: NaiveDate,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub department: Option<String>,
    pub status: Option<String>,
    /// Name, e-mail or employee code fragment
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 10)]
    pub total: i64,
}

/// Partial update body; only the listed fields are accepted.
#[derive(Deserialize, ToSchema)]
pub struct UpdateEmployee {
    pub employee_code: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub card_id: Option<String>,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub hire_date: Option<NaiveDate>,
    #[schema(example = "inactive")]
    pub status: Option<String>,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

async fn card_of(pool: &MySqlPool, employee_id: &str) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, Option<String>>("SELECT card_id FROM employees WHERE id = ?")
        .bind(employee_id)
        .fetch_optional(pool)
        .await
        .map(Option::flatten)
}

/// Drops every cached view of an employee after a write.
/// Headline counts of the employee page.
#[derive(Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct EmployeeStats {
    pub total: usize,
    pub active: usize,
    pub with_card: usize,
}

impl EmployeeStats {
    fn tally(roster: &[RosterEntry]) -> Self {
        roster.iter().fold(Self::default(), |mut stats, e| {
            stats.total += 1;
            stats.active += usize::from(e.active);
            stats.with_card += usize::from(e.has_card);
            stats
        })
    }
}

async fn employee_changed(state: &AppState, employee_id: &str, op: ChangeOp) {
    state.directory.forget_name(employee_id).await;
    state.feed.publish(EMPLOYEES, op);
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employees",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = Employee),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Duplicate code, e-mail or card"),
        (status = 500, description = "Internal server error", body = Object, example = json!({
            "message": "Something went wrong, Contact with system admin"
        }))
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_employee(
    auth: AuthUser,
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    state: web::Data<AppState>,
    payload: web::Json<CreateEmployee>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let payload = payload.into_inner();
    let employee = Employee {
        id: Uuid::new_v4().to_string(),
        employee_code: payload.employee_code.trim().to_string(),
        first_name: payload.first_name.trim().to_string(),
        last_name: blank_to_none(payload.last_name),
        email: payload.email.trim().to_string(),
        phone: blank_to_none(payload.phone),
        department: blank_to_none(payload.department),
        position: blank_to_none(payload.position),
        card_id: blank_to_none(payload.card_id),
        hire_date: payload.hire_date,
        status: "active".to_string(),
    };

    if employee.first_name.is_empty() || employee.employee_code.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "employee_code and first_name are required"
        })));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO employees
        (id, employee_code, first_name, last_name, email, phone, department, position, card_id, hire_date, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&employee.id)
    .bind(&employee.employee_code)
    .bind(&employee.first_name)
    .bind(&employee.last_name)
    .bind(&employee.email)
    .bind(&employee.phone)
    .bind(&employee.department)
    .bind(&employee.position)
    .bind(&employee.card_id)
    .bind(employee.hire_date)
    .bind(&employee.status)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(_) => {
            if let Some(card) = &employee.card_id {
                CARD_FILTER.insert(card);
            }
            employee_changed(&state, &employee.id, ChangeOp::Insert).await;
            record_action(
                pool.get_ref(),
                &req,
                &auth,
                "employee.create",
                format!("id={} code={}", employee.id, employee.employee_code),
            )
            .await;
            info!(employee_id = %employee.id, "Employee created");
            Ok(HttpResponse::Created().json(employee))
        }
        Err(e) => {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.code().as_deref() == Some("23000") {
                    return Ok(HttpResponse::Conflict().json(json!({
                        "message": "Employee code, e-mail or card already in use"
                    })));
                }
            }
            error!(error = %e, "Failed to Create Employee");
            Ok(HttpResponse::InternalServerError().json(json!({
                "message": "Something went wrong, Contact with system admin"
            })))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse),
        (status = 403, description = "Admin only")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let (page, per_page, offset) = paging(query.page, query.per_page);

    // ---------- build WHERE clause dynamically ----------
    let mut conditions = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(department) = query.department.as_deref().filter(|d| !d.is_empty()) {
        conditions.push("department = ?");
        bindings.push(department.to_string());
    }

    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        conditions.push("status = ?");
        bindings.push(status.to_string());
    }

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        conditions.push(
            "(first_name LIKE ? OR last_name LIKE ? OR email LIKE ? OR employee_code LIKE ?)",
        );
        let like = format!("%{}%", search);
        bindings.extend(std::iter::repeat(like).take(4));
    }

    let where_clause = if conditions.is_empty() {
        "".to_string()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    // ---------- total count ----------
    let count_sql = format!("SELECT COUNT(*) as total FROM employees {}", where_clause);
    debug!(sql = %count_sql, bindings = ?bindings, "Counting employees");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = count_query.bind(b);
    }

    let total = count_query
        .fetch_one(pool.get_ref())
        .await
        .map_err(db_error("Failed to count employees"))?;

    // ---------- data query ----------
    let data_sql = format!(
        "SELECT {} FROM employees {} ORDER BY first_name, last_name LIMIT ? OFFSET ?",
        EMPLOYEE_COLUMNS, where_clause
    );
    debug!(sql = %data_sql, page, per_page, offset, "Fetching employees");

    let mut data_query = sqlx::query_as::<_, Employee>(&data_sql);
    for b in &bindings {
        data_query = data_query.bind(b);
    }
    data_query = data_query.bind(per_page as i64).bind(offset as i64);

    let employees = data_query
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_error("Failed to fetch employees"))?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: employees,
        page,
        per_page,
        total,
    }))
}

/// Update Employee
#[utoipa::path(
    put,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    request_body = UpdateEmployee,
    responses(
        (status = 200, description = "Employee updated successfully", body = Object, example = json!({
            "message": "Employee updated successfully"
        })),
        (status = 400, description = "Unknown or unsupported field"),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_employee(
    auth: AuthUser,
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let employee_id = path.into_inner();

    let update = build_update_sql("employees", &body, UPDATABLE, "id", &employee_id)?;

    let new_card = body.get("card_id").map(|v| v.as_str().map(str::to_string));
    let old_card = match new_card {
        Some(_) => card_of(pool.get_ref(), &employee_id)
            .await
            .map_err(db_error("Failed to read employee card"))?,
        None => None,
    };

    let affected = execute_update(pool.get_ref(), update)
        .await
        .map_err(|e| {
            error!(error = %e, employee_id = %employee_id, "Failed to update employee");
            ErrorInternalServerError("Internal Server Error")
        })?;

    if affected == 0 {
        return Ok(HttpResponse::NotFound().json(json!({ "message": "Employee not found" })));
    }

    if let Some(new_card) = new_card {
        if let Some(old) = old_card.filter(|old| Some(old) != new_card.as_ref()) {
            CARD_FILTER.remove(&old);
        }
        if let Some(card) = new_card.filter(|c| !c.trim().is_empty()) {
            CARD_FILTER.insert(&card);
        }
    }

    employee_changed(&state, &employee_id, ChangeOp::Update).await;
    record_action(
        pool.get_ref(),
        &req,
        &auth,
        "employee.update",
        format!("id={} fields={}", employee_id, body.as_object().map(|o| o.len()).unwrap_or(0)),
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({ "message": "Employee updated successfully" })))
}

/// Flip between active and inactive
#[utoipa::path(
    put,
    path = "/api/employees/{employee_id}/status",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "New status", body = Object, example = json!({
            "status": "inactive"
        })),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn toggle_status(
    auth: AuthUser,
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let employee_id = path.into_inner();

    let result = sqlx::query(
        "UPDATE employees SET status = IF(status = 'active', 'inactive', 'active') WHERE id = ?",
    )
    .bind(&employee_id)
    .execute(pool.get_ref())
    .await
    .map_err(db_error("Failed to toggle employee status"))?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::NotFound().json(json!({ "message": "Employee not found" })));
    }

    let status = sqlx::query_scalar::<_, String>("SELECT status FROM employees WHERE id = ?")
        .bind(&employee_id)
        .fetch_one(pool.get_ref())
        .await
        .map_err(db_error("Failed to read employee status"))?;

    employee_changed(&state, &employee_id, ChangeOp::Update).await;
    record_action(
        pool.get_ref(),
        &req,
        &auth,
        "employee.status",
        format!("id={} status={}", employee_id, status),
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({ "status": status })))
}

/// Delete Employee
#[utoipa::path(
    delete,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        })),
        (status = 500, description = "Internal server error", body = Object)
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_employee(
    auth: AuthUser,
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let employee_id = path.into_inner();

    let card = card_of(pool.get_ref(), &employee_id)
        .await
        .map_err(db_error("Failed to read employee card"))?;

    let result = sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(&employee_id)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(res) => {
            if res.rows_affected() == 0 {
                return Ok(HttpResponse::NotFound().json(json!({
                    "message": "Employee not found"
                })));
            }

            if let Some(card) = card {
                CARD_FILTER.remove(&card);
            }
            employee_changed(&state, &employee_id, ChangeOp::Delete).await;
            record_action(
                pool.get_ref(),
                &req,
                &auth,
                "employee.delete",
                format!("id={}", employee_id),
            )
            .await;

            Ok(HttpResponse::Ok().json(json!({
                "message": "Successfully deleted"
            })))
        }

        Err(e) => {
            error!(error = %e, employee_id = %employee_id, "Failed to delete employee");

            Ok(HttpResponse::InternalServerError().json(json!({
                "message": "Internal Server Error"
            })))
        }
    }
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let employee_id = path.into_inner();

    let employee = sqlx::query_as::<_, Employee>(&format!(
        "SELECT {} FROM employees WHERE id = ?",
        EMPLOYEE_COLUMNS
    ))
    .bind(&employee_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, employee_id = %employee_id, "Failed to fetch employee");
        ErrorInternalServerError("Internal Server Error")
    })?;

    match employee {
        Some(emp) => Ok(HttpResponse::Ok().json(emp)),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "Employee not found"
        }))),
    }
}

/// Active employees and badge coverage
#[utoipa::path(
    get,
    path = "/api/employees/stats",
    responses(
        (status = 200, description = "Employee counts", body = EmployeeStats),
        (status = 403, description = "Admin only")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn employee_stats(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let roster = state
        .directory
        .roster()
        .await
        .map_err(internal("Failed to load employee roster"))?;
    Ok(HttpResponse::Ok().json(EmployeeStats::tally(&roster)))
}
