use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};

use crate::{
    dto::users::UpdateAddressRequest,
    entity::users::{ActiveModel as UserActive, Entity as Users, Model as UserModel},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Role, ShippingAddress, User},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn get_me(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let model = Users::find_by_id(user.user_id).one(&state.orm).await?;
    let model = match model {
        Some(u) => u,
        None => return Err(AppError::NotFound),
    };
    Ok(ApiResponse::success("OK", user_from_entity(model), None))
}

pub async fn update_address(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateAddressRequest,
) -> AppResult<ApiResponse<User>> {
    let model = Users::find_by_id(user.user_id).one(&state.orm).await?;
    let model = match model {
        Some(u) => u,
        None => return Err(AppError::NotFound),
    };

    let addr = payload.shipping_address;
    let mut active: UserActive = model.into();
    active.ship_recipient = Set(Some(addr.recipient));
    active.ship_street = Set(Some(addr.street));
    active.ship_city = Set(Some(addr.city));
    active.ship_postal_code = Set(Some(addr.postal_code));
    active.ship_country = Set(Some(addr.country));
    active.ship_phone = Set(Some(addr.phone));
    let model = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Address updated",
        user_from_entity(model),
        Some(Meta::empty()),
    ))
}

pub(crate) fn user_from_entity(model: UserModel) -> User {
    let shipping_address = match (
        model.ship_recipient,
        model.ship_street,
        model.ship_city,
        model.ship_postal_code,
        model.ship_country,
        model.ship_phone,
    ) {
        (Some(recipient), Some(street), Some(city), Some(postal_code), Some(country), Some(phone)) => {
            Some(ShippingAddress {
                recipient,
                street,
                city,
                postal_code,
                country,
                phone,
            })
        }
        _ => None,
    };

    User {
        id: model.id,
        email: model.email,
        display_name: model.display_name,
        role: Role::parse(&model.role).unwrap_or(Role::User),
        shipping_address,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
