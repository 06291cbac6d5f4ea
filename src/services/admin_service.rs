use sea_orm::{ActiveModelTrait, Condition, EntityTrait, Set};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::{orders::OrderList, users::SetRoleRequest},
    entity::{
        product_reviews::Entity as ProductReviews,
        users::{ActiveModel as UserActive, Entity as Users},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::User,
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    services::{order_service, user_service::user_from_entity},
    state::AppState,
};

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    order_service::list_orders_where(state, Condition::all(), query).await
}

/// Direct role assignment, the admin override path next to the request
/// workflow. Users never set their own role.
pub async fn set_user_role(
    state: &AppState,
    admin: &AuthUser,
    user_id: Uuid,
    payload: SetRoleRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(admin)?;

    let target = Users::find_by_id(user_id).one(&state.orm).await?;
    let target = match target {
        Some(u) => u,
        None => return Err(AppError::NotFound),
    };

    let mut active: UserActive = target.into();
    active.role = Set(payload.role.as_str().into());
    let updated = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(admin.user_id),
        "user_role_set",
        Some("users"),
        Some(serde_json::json!({ "user_id": user_id, "role": payload.role.as_str() })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Role updated",
        user_from_entity(updated),
        Some(Meta::empty()),
    ))
}

pub async fn delete_review(
    state: &AppState,
    admin: &AuthUser,
    review_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(admin)?;

    let result = ProductReviews::delete_by_id(review_id)
        .exec(&state.orm)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(admin.user_id),
        "review_delete",
        Some("product_reviews"),
        Some(serde_json::json!({ "review_id": review_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Review deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
