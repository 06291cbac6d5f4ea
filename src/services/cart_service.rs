use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::cart::{AddToCartRequest, CartItemDto, CartList, SetQuantityRequest},
    entity::{
        cart_items::{ActiveModel as CartActive, Column as CartCol, Entity as CartItems},
        products::{Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CartItem, Product},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

/// A cart line as the order engine consumes it: product reference and
/// quantity only. Product details are resolved by the caller against the
/// inventory ledger, inside its own transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Read-only view of a user's cart in stored (creation) order. An empty
/// cart is an empty list, not an error. Usable standalone or inside a
/// transaction via the generic connection.
pub async fn snapshot<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<Vec<CartLine>> {
    let lines = CartItems::find()
        .filter(CartCol::UserId.eq(user_id))
        .order_by_asc(CartCol::CreatedAt)
        .all(conn)
        .await?
        .into_iter()
        .map(|row| CartLine {
            product_id: row.product_id,
            quantity: row.quantity,
        })
        .collect();
    Ok(lines)
}

pub async fn list_cart(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<CartList>> {
    let (page, limit, offset) = pagination.normalize();

    let finder = CartItems::find().filter(CartCol::UserId.eq(user.user_id));
    let total = finder.clone().count(&state.orm).await? as i64;

    let rows = finder
        .find_also_related(Products)
        .order_by_desc(CartCol::CreatedAt)
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = rows
        .into_iter()
        .filter_map(|(cart, product)| {
            product.map(|p| CartItemDto {
                id: cart.id,
                product: product_from_entity(p),
                quantity: cart.quantity,
            })
        })
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("OK", CartList { items }, Some(meta)))
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.quantity < 1 {
        return Err(AppError::BadRequest("quantity must be at least 1".into()));
    }

    let product = Products::find_by_id(payload.product_id)
        .one(&state.orm)
        .await?;
    if product.is_none() {
        return Err(AppError::ProductNotFound);
    }

    let existing = CartItems::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .filter(CartCol::ProductId.eq(payload.product_id))
        .one(&state.orm)
        .await?;

    // One line per (user, product): re-adding tops up the quantity.
    let cart_item = if let Some(item) = existing {
        let quantity = item.quantity + payload.quantity;
        let mut active: CartActive = item.into();
        active.quantity = Set(quantity);
        active.update(&state.orm).await?
    } else {
        CartActive {
            id: Set(Uuid::new_v4()),
            user_id: Set(user.user_id),
            product_id: Set(payload.product_id),
            quantity: Set(payload.quantity),
            created_at: NotSet,
        }
        .insert(&state.orm)
        .await?
    };

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_add",
        Some("cart_items"),
        Some(serde_json::json!({
            "product_id": payload.product_id,
            "quantity": payload.quantity,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Added to cart",
        cart_item_from_entity(cart_item),
        None,
    ))
}

pub async fn set_quantity(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: SetQuantityRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    if payload.quantity < 0 {
        return Err(AppError::BadRequest("quantity must not be negative".into()));
    }

    let existing = CartItems::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .filter(CartCol::ProductId.eq(product_id))
        .one(&state.orm)
        .await?;
    let existing = match existing {
        Some(item) => item,
        None => return Err(AppError::NotFound),
    };

    if payload.quantity == 0 {
        CartItems::delete_by_id(existing.id).exec(&state.orm).await?;
    } else {
        let mut active: CartActive = existing.into();
        active.quantity = Set(payload.quantity);
        active.update(&state.orm).await?;
    }

    Ok(ApiResponse::success(
        "Cart updated",
        serde_json::json!({ "product_id": product_id, "quantity": payload.quantity }),
        Some(Meta::empty()),
    ))
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .filter(CartCol::ProductId.eq(product_id))
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

fn cart_item_from_entity(model: crate::entity::cart_items::Model) -> CartItem {
    CartItem {
        id: model.id,
        user_id: model.user_id,
        product_id: model.product_id,
        quantity: model.quantity,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub(crate) fn product_from_entity(model: ProductModel) -> Product {
    let tags = serde_json::from_value(model.tags).unwrap_or_default();
    Product {
        id: model.id,
        seller_id: model.seller_id,
        name: model.name,
        description: model.description,
        category: model.category,
        tags,
        price: model.price,
        stock: model.stock,
        sales: model.sales,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
