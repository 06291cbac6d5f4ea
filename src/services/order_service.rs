use std::collections::HashMap;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, JoinType, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{OrderList, OrderWithItems, PlaceOrderRequest, PlacedOrder, UpdateOrderStatusRequest},
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        order_sellers::{
            ActiveModel as OrderSellerActive, Column as OrderSellerCol, Entity as OrderSellers,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_seller},
    models::{Order, OrderItem, OrderStatus, Role, ShippingAddress},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{cart_service, inventory, inventory::Reservation},
    state::AppState,
};

/// Place an order from the user's current cart.
///
/// Everything between the cart read and the cart clear runs in one
/// transaction: product rows are locked and re-read inside it, stock and
/// sales move in the same commit that creates the order, and any failure
/// rolls the whole thing back. A concurrent checkout against the same
/// products blocks on the row locks and then validates against the
/// already-decremented stock, so the pool can never be oversold.
pub async fn place_order(
    state: &AppState,
    user: &AuthUser,
    payload: PlaceOrderRequest,
) -> AppResult<ApiResponse<PlacedOrder>> {
    // Malformed input never reaches the transaction.
    validate_address(&payload.shipping_address)?;

    let txn = state.orm.begin().await?;

    let lines = cart_service::snapshot(&txn, user.user_id).await?;
    if lines.is_empty() {
        return Err(AppError::EmptyCart);
    }

    // Lines are processed in stored cart order; the first stock violation
    // is the one reported.
    let mut reservations: Vec<Reservation> = Vec::with_capacity(lines.len());
    for line in &lines {
        let reservation = inventory::reserve(&txn, line.product_id, line.quantity).await?;
        reservations.push(reservation);
    }

    let total_amount = order_total(&reservations);
    let seller_ids = distinct_sellers(&reservations);

    let order_id = Uuid::new_v4();
    let addr = &payload.shipping_address;
    let order = OrderActive {
        id: Set(order_id),
        user_id: Set(user.user_id),
        total_amount: Set(total_amount),
        status: Set(OrderStatus::Pending.as_str().into()),
        recipient: Set(addr.recipient.clone()),
        street: Set(addr.street.clone()),
        city: Set(addr.city.clone()),
        postal_code: Set(addr.postal_code.clone()),
        country: Set(addr.country.clone()),
        phone: Set(addr.phone.clone()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    for reservation in &reservations {
        OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(reservation.product_id),
            quantity: Set(reservation.quantity),
            price: Set(reservation.unit_price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
    }

    for seller_id in &seller_ids {
        OrderSellerActive {
            order_id: Set(order.id),
            seller_id: Set(*seller_id),
        }
        .insert(&txn)
        .await?;
    }

    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_placed",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "total": total_amount })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order placed",
        PlacedOrder { order_id: order.id },
        Some(Meta::empty()),
    ))
}

pub async fn list_my_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    list_orders_where(state, condition, query).await
}

/// Orders containing at least one line item owned by this seller,
/// resolved through the denormalized seller set.
pub async fn list_seller_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_seller(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all().add(OrderSellerCol::SellerId.eq(user.user_id));
    if let Some(status) = query.status.as_ref() {
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let mut finder = Orders::find()
        .join(
            JoinType::InnerJoin,
            crate::entity::orders::Relation::OrderSellers.def(),
        )
        .filter(condition);

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = with_seller_sets(state, models).await?;
    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Orders", OrderList { items }, Some(meta)))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let mut condition = Condition::all().add(OrderCol::Id.eq(id));
    if user.role != Role::Admin {
        condition = condition.add(OrderCol::UserId.eq(user.user_id));
    }

    let order = Orders::find().filter(condition).one(&state.orm).await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    let seller_ids = seller_ids_for(state, order.id).await?;
    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order_from_entity(order, seller_ids),
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Status changes are restricted to sellers with a line item in the
/// order, and to admins.
pub async fn update_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    let order = Orders::find_by_id(id).one(&state.orm).await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    if user.role != Role::Admin {
        ensure_seller(user)?;
        let membership = OrderSellers::find()
            .filter(OrderSellerCol::OrderId.eq(order.id))
            .filter(OrderSellerCol::SellerId.eq(user.user_id))
            .one(&state.orm)
            .await?;
        if membership.is_none() {
            return Err(AppError::Forbidden);
        }
    }

    let mut active: OrderActive = order.into();
    active.status = Set(payload.status.as_str().into());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_status_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": order.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let seller_ids = seller_ids_for(state, order.id).await?;
    Ok(ApiResponse::success(
        "Order updated",
        order_from_entity(order, seller_ids),
        Some(Meta::empty()),
    ))
}

pub(crate) async fn list_orders_where(
    state: &AppState,
    mut condition: Condition,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    if let Some(status) = query.status.as_ref() {
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let mut finder = Orders::find().filter(condition);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = with_seller_sets(state, models).await?;
    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Orders", OrderList { items }, Some(meta)))
}

fn order_total(reservations: &[Reservation]) -> i64 {
    reservations
        .iter()
        .map(|r| r.unit_price * r.quantity as i64)
        .sum()
}

fn distinct_sellers(reservations: &[Reservation]) -> Vec<Uuid> {
    let mut sellers: Vec<Uuid> = Vec::new();
    for r in reservations {
        if !sellers.contains(&r.seller_id) {
            sellers.push(r.seller_id);
        }
    }
    sellers
}

fn validate_address(addr: &ShippingAddress) -> Result<(), AppError> {
    let fields = [
        ("recipient", &addr.recipient),
        ("street", &addr.street),
        ("city", &addr.city),
        ("postal_code", &addr.postal_code),
        ("country", &addr.country),
        ("phone", &addr.phone),
    ];
    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(AppError::BadRequest(format!(
                "shipping address field '{name}' must not be empty"
            )));
        }
    }
    Ok(())
}

async fn seller_ids_for(state: &AppState, order_id: Uuid) -> AppResult<Vec<Uuid>> {
    let ids = OrderSellers::find()
        .filter(OrderSellerCol::OrderId.eq(order_id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|row| row.seller_id)
        .collect();
    Ok(ids)
}

/// Resolve seller sets for a page of orders in one query.
async fn with_seller_sets(state: &AppState, models: Vec<OrderModel>) -> AppResult<Vec<Order>> {
    let order_ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
    let mut sellers_by_order: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    if !order_ids.is_empty() {
        for row in OrderSellers::find()
            .filter(OrderSellerCol::OrderId.is_in(order_ids))
            .all(&state.orm)
            .await?
        {
            sellers_by_order
                .entry(row.order_id)
                .or_default()
                .push(row.seller_id);
        }
    }

    Ok(models
        .into_iter()
        .map(|m| {
            let sellers = sellers_by_order.remove(&m.id).unwrap_or_default();
            order_from_entity(m, sellers)
        })
        .collect())
}

pub(crate) fn order_from_entity(model: OrderModel, seller_ids: Vec<Uuid>) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        total_amount: model.total_amount,
        // Rows are only ever written through OrderStatus, so this cannot
        // miss in practice.
        status: OrderStatus::parse(&model.status).unwrap_or(OrderStatus::Pending),
        shipping_address: ShippingAddress {
            recipient: model.recipient,
            street: model.street,
            city: model.city,
            postal_code: model.postal_code,
            country: model.country,
            phone: model.phone,
        },
        seller_ids,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub(crate) fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        quantity: model.quantity,
        price: model.price,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reservation(price: i64, qty: i32, seller: Uuid) -> Reservation {
        Reservation {
            product_id: Uuid::new_v4(),
            name: "test".into(),
            unit_price: price,
            seller_id: seller,
            quantity: qty,
        }
    }

    #[test]
    fn total_is_sum_of_snapshot_prices() {
        let s1 = Uuid::new_v4();
        let s2 = Uuid::new_v4();
        let reservations = vec![
            reservation(1000, 2, s1),
            reservation(250, 4, s2),
            reservation(9999, 1, s1),
        ];
        assert_eq!(order_total(&reservations), 2 * 1000 + 4 * 250 + 9999);
    }

    #[test]
    fn seller_set_is_deduplicated_in_first_seen_order() {
        let s1 = Uuid::new_v4();
        let s2 = Uuid::new_v4();
        let reservations = vec![
            reservation(100, 1, s1),
            reservation(100, 1, s2),
            reservation(100, 1, s1),
        ];
        assert_eq!(distinct_sellers(&reservations), vec![s1, s2]);
    }

    #[test]
    fn blank_address_fields_are_rejected() {
        let mut addr = ShippingAddress {
            recipient: "Jo Doe".into(),
            street: "1 Main St".into(),
            city: "Springfield".into(),
            postal_code: "12345".into(),
            country: "US".into(),
            phone: "555-0100".into(),
        };
        assert!(validate_address(&addr).is_ok());

        addr.city = "   ".into();
        let err = validate_address(&addr).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg.contains("city")));
    }
}
