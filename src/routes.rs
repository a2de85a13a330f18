use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::http::StatusCode;
use actix_web::middleware::DefaultHeaders;
use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse, ResponseError};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::schemas::{ExpenseDraft, ExpenseId, GroupId, MemberId};
use crate::service::{GroupInput, MemberInput, SplitService};

type Service = web::Data<SplitService>;
type Reply = Result<HttpResponse, ServiceError>;

const SECURITY_HEADERS: [(&str, &str); 10] = [
    ("Content-Security-Policy", "default-src 'self'; frame-ancestors 'self'; object-src 'none'"),
    ("Cross-Origin-Opener-Policy", "same-origin"),
    ("Cross-Origin-Resource-Policy", "same-origin"),
    ("Referrer-Policy", "no-referrer"),
    ("Strict-Transport-Security", "max-age=15552000; includeSubDomains"),
    ("X-Content-Type-Options", "nosniff"),
    ("X-DNS-Prefetch-Control", "off"),
    ("X-Frame-Options", "SAMEORIGIN"),
    ("X-Permitted-Cross-Domain-Policies", "none"),
    ("X-XSS-Protection", "0"),
];

/// Hardening headers added to every response.
pub fn security_headers() -> DefaultHeaders {
    SECURITY_HEADERS
        .iter()
        .fold(DefaultHeaders::new(), |headers, &(name, value)| headers.add((name, value)))
}

/// Path ids are UUIDs; anything else is rejected before reaching the service.
fn path_id<T: From<String>>(param: &'static str, raw: String) -> Result<T, ServiceError> {
    match Uuid::parse_str(&raw) {
        Ok(_) => Ok(T::from(raw)),
        Err(_) => Err(ServiceError::invalid(param, format!("Invalid {param} format"))),
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::InvalidInput { .. }
            | ServiceError::UnknownMembers { .. }
            | ServiceError::Conflict { .. }
            | ServiceError::MemberHasExpenses
            | ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Settlement(_) | ServiceError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = self.to_string();
        let body = match self {
            ServiceError::NotFound { id, .. } => json!({ "message": message, "id": id }),
            ServiceError::InvalidInput { field, .. } | ServiceError::Conflict { field, .. } => {
                json!({ "message": message, "field": field })
            }
            ServiceError::UnknownMembers { field, members } => json!({
                "message": message,
                "field": field,
                "invalidMembers": members,
            }),
            ServiceError::MemberHasExpenses => {
                json!({ "message": message, "code": "MEMBER_HAS_EXPENSES" })
            }
            ServiceError::Validation(err) => json!({ "message": message, "field": err.field() }),
            ServiceError::Settlement(_) | ServiceError::Storage(_) => {
                tracing::error!(error = %self, "request failed");
                json!({ "message": "Internal server error" })
            }
        };
        HttpResponse::build(self.status_code()).json(json!({ "error": body }))
    }
}

fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let body = json!({ "error": { "message": err.to_string() } });
    InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
}

async fn route_not_found(req: HttpRequest) -> HttpResponse {
    HttpResponse::NotFound().json(json!({ "error": "Route not found", "path": req.path() }))
}

#[derive(Deserialize)]
struct ExpenseQuery {
    #[serde(rename = "groupId")]
    group_id: Option<GroupId>,
}

#[get("/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "OK", "timestamp": Utc::now() }))
}

#[get("/groups")]
async fn list_groups(service: Service) -> Reply {
    let groups = service.list_groups().await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "count": groups.len(), "data": groups })))
}

#[post("/groups")]
async fn create_group(service: Service, json: web::Json<GroupInput>) -> Reply {
    let group = service.create_group(json.into_inner()).await?;
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "data": group,
        "message": "Group created successfully",
    })))
}

#[get("/groups/{group_id}")]
async fn get_group(service: Service, id: web::Path<String>) -> Reply {
    let id: GroupId = path_id("groupId", id.into_inner())?;
    let details = service.get_group(&id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": details })))
}

#[put("/groups/{group_id}")]
async fn update_group(
    service: Service,
    id: web::Path<String>,
    json: web::Json<GroupInput>,
) -> Reply {
    let id: GroupId = path_id("groupId", id.into_inner())?;
    let group = service.update_group(&id, json.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": group,
        "message": "Group updated successfully",
    })))
}

#[delete("/groups/{group_id}")]
async fn delete_group(service: Service, id: web::Path<String>) -> Reply {
    let id: GroupId = path_id("groupId", id.into_inner())?;
    service.delete_group(&id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Group and associated expenses deleted successfully",
    })))
}

#[post("/groups/{group_id}/members")]
async fn add_member(
    service: Service,
    id: web::Path<String>,
    json: web::Json<MemberInput>,
) -> Reply {
    let id: GroupId = path_id("groupId", id.into_inner())?;
    let member = service.add_member(&id, json.into_inner()).await?;
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "data": member,
        "message": "Member added successfully",
    })))
}

#[delete("/groups/{group_id}/members/{member_id}")]
async fn remove_member(service: Service, path: web::Path<(String, String)>) -> Reply {
    let (group_id, member_id) = path.into_inner();
    let group_id: GroupId = path_id("groupId", group_id)?;
    let member_id: MemberId = path_id("memberId", member_id)?;
    service.remove_member(&group_id, &member_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Member removed successfully" })))
}

#[post("/groups/{group_id}/expenses")]
async fn create_expense(
    service: Service,
    id: web::Path<String>,
    expense: web::Json<ExpenseDraft>,
) -> Reply {
    let id: GroupId = path_id("groupId", id.into_inner())?;
    let expense = service.create_expense(&id, expense.into_inner()).await?;
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "data": expense,
        "message": "Expense created successfully",
    })))
}

#[get("/groups/{group_id}/balances")]
async fn get_balances(service: Service, id: web::Path<String>) -> Reply {
    let id: GroupId = path_id("groupId", id.into_inner())?;
    let report = service.group_balances(&id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": report })))
}

#[get("/expenses")]
async fn list_expenses(service: Service, query: web::Query<ExpenseQuery>) -> Reply {
    let expenses = service.list_expenses(query.group_id.as_ref()).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "count": expenses.len(), "data": expenses })))
}

#[get("/expenses/{expense_id}")]
async fn get_expense(service: Service, id: web::Path<String>) -> Reply {
    let id: ExpenseId = path_id("expenseId", id.into_inner())?;
    let expense = service.get_expense(&id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": expense })))
}

#[put("/expenses/{expense_id}")]
async fn update_expense(
    service: Service,
    id: web::Path<String>,
    expense: web::Json<ExpenseDraft>,
) -> Reply {
    let id: ExpenseId = path_id("expenseId", id.into_inner())?;
    let expense = service.update_expense(&id, expense.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": expense,
        "message": "Expense updated successfully",
    })))
}

#[delete("/expenses/{expense_id}")]
async fn delete_expense(service: Service, id: web::Path<String>) -> Reply {
    let id: ExpenseId = path_id("expenseId", id.into_inner())?;
    service.delete_expense(&id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Expense deleted successfully" })))
}

/// Registers every route; the caller provides `web::Data<SplitService>`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .service(health)
        .service(
            web::scope("/api")
                .service(list_groups)
                .service(create_group)
                .service(get_group)
                .service(update_group)
                .service(delete_group)
                .service(add_member)
                .service(remove_member)
                .service(create_expense)
                .service(get_balances)
                .service(list_expenses)
                .service(get_expense)
                .service(update_expense)
                .service(delete_expense),
        )
        .default_service(web::to(route_not_found));
}
