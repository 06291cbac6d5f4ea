use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};

use crate::{
    dto::{
        requests::{AdminRequestPayload, SellerRequestPayload, SubmittedRequest},
        users::UpdateAddressRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::User,
    response::ApiResponse,
    services::{role_request_service, user_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/me/address", put(update_address))
        .route("/request-seller-role", post(request_seller_role))
        .route("/request-admin-role", post(request_admin_role))
}

#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Current user profile", body = ApiResponse<User>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = user_service::get_me(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/users/me/address",
    request_body = UpdateAddressRequest,
    responses(
        (status = 200, description = "Update shipping address", body = ApiResponse<User>),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_address(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UpdateAddressRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = user_service::update_address(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/users/request-seller-role",
    request_body = SellerRequestPayload,
    responses(
        (status = 201, description = "Seller promotion request submitted", body = ApiResponse<SubmittedRequest>),
        (status = 400, description = "A request is already pending, or payload invalid"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn request_seller_role(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<SellerRequestPayload>,
) -> AppResult<(StatusCode, Json<ApiResponse<SubmittedRequest>>)> {
    let resp = role_request_service::submit_seller_request(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/users/request-admin-role",
    request_body = AdminRequestPayload,
    responses(
        (status = 201, description = "Admin promotion request submitted", body = ApiResponse<SubmittedRequest>),
        (status = 400, description = "A request is already pending, or payload invalid"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn request_admin_role(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AdminRequestPayload>,
) -> AppResult<(StatusCode, Json<ApiResponse<SubmittedRequest>>)> {
    let resp = role_request_service::submit_admin_request(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}
