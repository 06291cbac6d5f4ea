use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::{
        orders::OrderList,
        requests::{DecideRequest, RequestList},
        users::SetRoleRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{RequestKind, RoleRequest, User},
    response::ApiResponse,
    routes::params::{OrderListQuery, RequestListQuery},
    services::{admin_service, role_request_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/requests", get(list_requests))
        .route("/manage-seller-request/{id}", post(manage_seller_request))
        .route("/manage-admin-request/{id}", post(manage_admin_request))
        .route("/orders", get(list_all_orders))
        .route("/users/{id}/role", put(set_user_role))
        .route("/reviews/{id}", delete(delete_review))
}

#[utoipa::path(
    get,
    path = "/api/admin/requests",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("kind" = Option<String>, Query, description = "seller or admin"),
        ("status" = Option<String>, Query, description = "pending, approved, denied")
    ),
    responses(
        (status = 200, description = "Role requests, newest first", body = ApiResponse<RequestList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_requests(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<RequestListQuery>,
) -> AppResult<Json<ApiResponse<RequestList>>> {
    let resp = role_request_service::list_requests(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/manage-seller-request/{id}",
    params(("id" = Uuid, Path, description = "Request ID")),
    request_body = DecideRequest,
    responses(
        (status = 200, description = "Approve or deny a seller request", body = ApiResponse<RoleRequest>),
        (status = 400, description = "Already reviewed"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn manage_seller_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<DecideRequest>,
) -> AppResult<Json<ApiResponse<RoleRequest>>> {
    let resp =
        role_request_service::decide(&state, &user, id, RequestKind::Seller, payload.action)
            .await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/manage-admin-request/{id}",
    params(("id" = Uuid, Path, description = "Request ID")),
    request_body = DecideRequest,
    responses(
        (status = 200, description = "Approve or deny an admin request", body = ApiResponse<RoleRequest>),
        (status = 400, description = "Already reviewed"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn manage_admin_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<DecideRequest>,
) -> AppResult<Json<ApiResponse<RoleRequest>>> {
    let resp =
        role_request_service::decide(&state, &user, id, RequestKind::Admin, payload.action)
            .await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("sort_order" = Option<String>, Query, description = "asc, desc")
    ),
    responses(
        (status = 200, description = "All orders (admin only)", body = ApiResponse<OrderList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = admin_service::list_all_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/role",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = SetRoleRequest,
    responses(
        (status = 200, description = "Directly assign a user's role", body = ApiResponse<User>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn set_user_role(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetRoleRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = admin_service::set_user_role(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/admin/reviews/{id}",
    params(("id" = Uuid, Path, description = "Review ID")),
    responses(
        (status = 200, description = "Remove a review"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn delete_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = admin_service::delete_review(&state, &user, id).await?;
    Ok(Json(resp))
}
