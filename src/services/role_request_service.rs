use chrono::Utc;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sea_orm::ActiveValue::NotSet;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::requests::{
        AdminRequestPayload, RequestList, SellerRequestPayload, SubmittedRequest,
    },
    entity::{
        role_requests::{
            ActiveModel as RequestActive, Column as RequestCol, Entity as RoleRequests,
            Model as RequestModel,
        },
        users::{ActiveModel as UserActive, Entity as Users},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{RequestAction, RequestKind, RequestStatus, RoleRequest},
    response::{ApiResponse, Meta},
    routes::params::RequestListQuery,
    state::AppState,
};

pub async fn submit_seller_request(
    state: &AppState,
    user: &AuthUser,
    payload: SellerRequestPayload,
) -> AppResult<ApiResponse<SubmittedRequest>> {
    validate_seller_payload(&payload)?;
    let active = RequestActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        kind: Set(RequestKind::Seller.as_str().into()),
        status: Set(RequestStatus::Pending.as_str().into()),
        phone: Set(Some(payload.phone)),
        address: Set(Some(payload.address)),
        categories: Set(Some(serde_json::json!(payload.categories))),
        reason: Set(None),
        requested_at: NotSet,
        reviewed_at: Set(None),
    };
    submit(state, user, RequestKind::Seller, active).await
}

pub async fn submit_admin_request(
    state: &AppState,
    user: &AuthUser,
    payload: AdminRequestPayload,
) -> AppResult<ApiResponse<SubmittedRequest>> {
    validate_admin_payload(&payload)?;
    let active = RequestActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        kind: Set(RequestKind::Admin.as_str().into()),
        status: Set(RequestStatus::Pending.as_str().into()),
        phone: Set(None),
        address: Set(None),
        categories: Set(None),
        reason: Set(Some(payload.reason)),
        requested_at: NotSet,
        reviewed_at: Set(None),
    };
    submit(state, user, RequestKind::Admin, active).await
}

/// A second submission while one of the same kind is pending is rejected.
/// Denied or approved history never blocks a new request. The pre-check
/// gives the friendly path; the partial unique index catches the race,
/// which we map back to `AlreadyPending` rather than a 500.
async fn submit(
    state: &AppState,
    user: &AuthUser,
    kind: RequestKind,
    active: RequestActive,
) -> AppResult<ApiResponse<SubmittedRequest>> {
    let pending = RoleRequests::find()
        .filter(RequestCol::UserId.eq(user.user_id))
        .filter(RequestCol::Kind.eq(kind.as_str()))
        .filter(RequestCol::Status.eq(RequestStatus::Pending.as_str()))
        .one(&state.orm)
        .await?;
    if pending.is_some() {
        return Err(AppError::AlreadyPending);
    }

    let request = match active.insert(&state.orm).await {
        Ok(request) => request,
        Err(err) if is_unique_violation(&err) => return Err(AppError::AlreadyPending),
        Err(err) => return Err(err.into()),
    };

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "role_request_submitted",
        Some("role_requests"),
        Some(serde_json::json!({ "request_id": request.id, "kind": kind.as_str() })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Request submitted",
        SubmittedRequest {
            request_id: request.id,
        },
        Some(Meta::empty()),
    ))
}

/// Approve or deny a pending request, promoting the user in the same
/// transaction on approval.
///
/// The request row is locked `FOR UPDATE`, so two concurrent decisions
/// serialize: the first transitions the row, the second re-reads a
/// terminal status and gets `AlreadyReviewed`. The role write shares the
/// transaction, so the promotion happens exactly once or not at all.
pub async fn decide(
    state: &AppState,
    admin: &AuthUser,
    id: Uuid,
    kind: RequestKind,
    action: RequestAction,
) -> AppResult<ApiResponse<RoleRequest>> {
    ensure_admin(admin)?;

    let txn = state.orm.begin().await?;

    let request = RoleRequests::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let request = match request {
        Some(r) if r.kind == kind.as_str() => r,
        _ => return Err(AppError::NotFound),
    };

    if request.status != RequestStatus::Pending.as_str() {
        return Err(AppError::AlreadyReviewed);
    }

    let user_id = request.user_id;
    let next_status = match action {
        RequestAction::Approve => RequestStatus::Approved,
        RequestAction::Deny => RequestStatus::Denied,
    };

    let mut active: RequestActive = request.into();
    active.status = Set(next_status.as_str().into());
    active.reviewed_at = Set(Some(Utc::now().into()));
    let request = active.update(&txn).await?;

    if action == RequestAction::Approve {
        let target = Users::find_by_id(user_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?;
        let target = match target {
            Some(u) => u,
            None => return Err(AppError::NotFound),
        };
        let mut target: UserActive = target.into();
        target.role = Set(kind.granted_role().as_str().into());
        target.update(&txn).await?;
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(admin.user_id),
        "role_request_decided",
        Some("role_requests"),
        Some(serde_json::json!({
            "request_id": request.id,
            "kind": kind.as_str(),
            "status": request.status,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        match action {
            RequestAction::Approve => "Request approved",
            RequestAction::Deny => "Request denied",
        },
        request_from_entity(request),
        Some(Meta::empty()),
    ))
}

pub async fn list_requests(
    state: &AppState,
    admin: &AuthUser,
    query: RequestListQuery,
) -> AppResult<ApiResponse<RequestList>> {
    ensure_admin(admin)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(kind) = query.kind {
        condition = condition.add(RequestCol::Kind.eq(kind.as_str()));
    }
    if let Some(status) = query.status {
        condition = condition.add(RequestCol::Status.eq(status.as_str()));
    }

    let finder = RoleRequests::find()
        .filter(condition)
        .order_by_desc(RequestCol::RequestedAt);

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(request_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Requests",
        RequestList { items },
        Some(meta),
    ))
}

fn validate_seller_payload(payload: &SellerRequestPayload) -> Result<(), AppError> {
    if payload.phone.trim().is_empty() {
        return Err(AppError::BadRequest("phone must not be empty".into()));
    }
    if payload.address.trim().is_empty() {
        return Err(AppError::BadRequest("address must not be empty".into()));
    }
    Ok(())
}

fn validate_admin_payload(payload: &AdminRequestPayload) -> Result<(), AppError> {
    if payload.reason.trim().is_empty() {
        return Err(AppError::BadRequest("reason must not be empty".into()));
    }
    Ok(())
}

fn is_unique_violation(err: &sea_orm::DbErr) -> bool {
    let text = err.to_string();
    text.contains("duplicate key") || text.contains("23505")
}

pub(crate) fn request_from_entity(model: RequestModel) -> RoleRequest {
    let categories = model
        .categories
        .and_then(|v| serde_json::from_value(v).ok());
    RoleRequest {
        id: model.id,
        user_id: model.user_id,
        kind: RequestKind::parse(&model.kind).unwrap_or(RequestKind::Seller),
        status: RequestStatus::parse(&model.status).unwrap_or(RequestStatus::Pending),
        phone: model.phone,
        address: model.address,
        categories,
        reason: model.reason,
        requested_at: model.requested_at.with_timezone(&Utc),
        reviewed_at: model.reviewed_at.map(|dt| dt.with_timezone(&Utc)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seller_payload_requires_contact_fields() {
        let ok = SellerRequestPayload {
            phone: "555-0100".into(),
            address: "1 Market St".into(),
            categories: vec!["books".into()],
        };
        assert!(validate_seller_payload(&ok).is_ok());

        let missing_phone = SellerRequestPayload {
            phone: " ".into(),
            address: "1 Market St".into(),
            categories: vec![],
        };
        assert!(matches!(
            validate_seller_payload(&missing_phone),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn admin_payload_requires_reason() {
        assert!(
            validate_admin_payload(&AdminRequestPayload {
                reason: "moderating reviews".into()
            })
            .is_ok()
        );
        assert!(matches!(
            validate_admin_payload(&AdminRequestPayload { reason: "".into() }),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn unique_violations_are_recognized() {
        let err = sea_orm::DbErr::Custom(
            "duplicate key value violates unique constraint \"role_requests_one_pending\"".into(),
        );
        assert!(is_unique_violation(&err));
        assert!(!is_unique_violation(&sea_orm::DbErr::Custom(
            "connection reset".into()
        )));
    }
}
