use marketplace_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::requests::{AdminRequestPayload, SellerRequestPayload},
    entity::users::{ActiveModel as UserActive, Entity as Users},
    error::AppError,
    middleware::auth::AuthUser,
    models::{RequestAction, RequestKind, RequestStatus, Role},
    services::role_request_service,
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use uuid::Uuid;

async fn setup_state() -> anyhow::Result<Option<AppState>> {
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(None);
            }
        };

    let pool = create_pool(&database_url).await?;
    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;

    let config = AppConfig {
        database_url,
        jwt_secret: "integration-test-secret".into(),
        host: "127.0.0.1".into(),
        port: 0,
    };

    Ok(Some(AppState { pool, orm, config }))
}

async fn create_user(state: &AppState, role: Role) -> anyhow::Result<AuthUser> {
    let id = Uuid::new_v4();
    UserActive {
        id: Set(id),
        email: Set(format!("{}-{}@example.com", role.as_str(), id)),
        display_name: Set("Test User".into()),
        role: Set(role.as_str().into()),
        ship_recipient: Set(None),
        ship_street: Set(None),
        ship_city: Set(None),
        ship_postal_code: Set(None),
        ship_country: Set(None),
        ship_phone: Set(None),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser { user_id: id, role })
}

fn seller_payload() -> SellerRequestPayload {
    SellerRequestPayload {
        phone: "555-0100".into(),
        address: "1 Market St".into(),
        categories: vec!["books".into(), "stationery".into()],
    }
}

async fn role_of(state: &AppState, user_id: Uuid) -> anyhow::Result<Role> {
    let user = Users::find_by_id(user_id).one(&state.orm).await?.unwrap();
    Ok(Role::parse(&user.role).unwrap())
}

#[tokio::test]
async fn approval_promotes_exactly_once() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let admin = create_user(&state, Role::Admin).await?;
    let applicant = create_user(&state, Role::User).await?;

    let submitted =
        role_request_service::submit_seller_request(&state, &applicant, seller_payload()).await?;
    let request_id = submitted.data.unwrap().request_id;

    let decided = role_request_service::decide(
        &state,
        &admin,
        request_id,
        RequestKind::Seller,
        RequestAction::Approve,
    )
    .await?;
    let request = decided.data.unwrap();
    assert_eq!(request.status, RequestStatus::Approved);
    assert!(request.reviewed_at.is_some());
    assert_eq!(role_of(&state, applicant.user_id).await?, Role::Seller);

    // Terminal states are final.
    let err = role_request_service::decide(
        &state,
        &admin,
        request_id,
        RequestKind::Seller,
        RequestAction::Approve,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::AlreadyReviewed));

    Ok(())
}

#[tokio::test]
async fn at_most_one_pending_per_kind() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let admin = create_user(&state, Role::Admin).await?;
    let applicant = create_user(&state, Role::User).await?;

    let first =
        role_request_service::submit_seller_request(&state, &applicant, seller_payload()).await?;
    let first_id = first.data.unwrap().request_id;

    let err = role_request_service::submit_seller_request(&state, &applicant, seller_payload())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyPending));

    // A pending seller request does not block an admin request.
    role_request_service::submit_admin_request(
        &state,
        &applicant,
        AdminRequestPayload {
            reason: "volunteering for moderation".into(),
        },
    )
    .await?;

    // After a denial the user may re-apply.
    role_request_service::decide(
        &state,
        &admin,
        first_id,
        RequestKind::Seller,
        RequestAction::Deny,
    )
    .await?;
    assert_eq!(role_of(&state, applicant.user_id).await?, Role::User);

    role_request_service::submit_seller_request(&state, &applicant, seller_payload()).await?;

    Ok(())
}

#[tokio::test]
async fn denial_never_touches_the_role() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let admin = create_user(&state, Role::Admin).await?;
    let applicant = create_user(&state, Role::User).await?;

    let submitted = role_request_service::submit_admin_request(
        &state,
        &applicant,
        AdminRequestPayload {
            reason: "I would like to help".into(),
        },
    )
    .await?;
    let request_id = submitted.data.unwrap().request_id;

    let decided = role_request_service::decide(
        &state,
        &admin,
        request_id,
        RequestKind::Admin,
        RequestAction::Deny,
    )
    .await?;
    assert_eq!(decided.data.unwrap().status, RequestStatus::Denied);
    assert_eq!(role_of(&state, applicant.user_id).await?, Role::User);

    // Approving a denied request is rejected.
    let err = role_request_service::decide(
        &state,
        &admin,
        request_id,
        RequestKind::Admin,
        RequestAction::Approve,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::AlreadyReviewed));

    Ok(())
}

#[tokio::test]
async fn wrong_kind_is_not_found() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let admin = create_user(&state, Role::Admin).await?;
    let applicant = create_user(&state, Role::User).await?;

    let submitted =
        role_request_service::submit_seller_request(&state, &applicant, seller_payload()).await?;
    let request_id = submitted.data.unwrap().request_id;

    // A seller request cannot be decided through the admin-request path.
    let err = role_request_service::decide(
        &state,
        &admin,
        request_id,
        RequestKind::Admin,
        RequestAction::Approve,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    Ok(())
}

#[tokio::test]
async fn concurrent_decisions_transition_once() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let admin_a = create_user(&state, Role::Admin).await?;
    let admin_b = create_user(&state, Role::Admin).await?;
    let applicant = create_user(&state, Role::User).await?;

    let submitted =
        role_request_service::submit_seller_request(&state, &applicant, seller_payload()).await?;
    let request_id = submitted.data.unwrap().request_id;

    let (res_a, res_b) = tokio::join!(
        role_request_service::decide(
            &state,
            &admin_a,
            request_id,
            RequestKind::Seller,
            RequestAction::Approve,
        ),
        role_request_service::decide(
            &state,
            &admin_b,
            request_id,
            RequestKind::Seller,
            RequestAction::Approve,
        ),
    );

    let successes = [&res_a, &res_b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one concurrent decision must win");
    let failure = if res_a.is_err() {
        res_a.unwrap_err()
    } else {
        res_b.unwrap_err()
    };
    assert!(matches!(failure, AppError::AlreadyReviewed));

    // Promoted exactly once, no flapping.
    assert_eq!(role_of(&state, applicant.user_id).await?, Role::Seller);

    Ok(())
}
