use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QuerySelect};
use uuid::Uuid;

use crate::{
    entity::products::{Column as ProdCol, Entity as Products},
    error::{AppError, AppResult},
};

/// Outcome of a successful stock reservation, read under the caller's
/// transaction. Price and seller come from the same locked row the
/// stock check ran against.
#[derive(Debug)]
pub struct Reservation {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: i64,
    pub seller_id: Uuid,
    pub quantity: i32,
}

/// Reserve `quantity` units of a product inside an open transaction.
///
/// The product row is locked `FOR UPDATE`, so the stock check cannot race
/// a concurrent checkout: the second transaction blocks on the lock and
/// then re-reads the decremented stock. The decrement and the sales
/// increment are issued through the same transaction and only become
/// visible at commit.
pub async fn reserve(
    txn: &DatabaseTransaction,
    product_id: Uuid,
    quantity: i32,
) -> AppResult<Reservation> {
    if quantity < 1 {
        return Err(AppError::BadRequest("quantity must be at least 1".into()));
    }

    let product = Products::find_by_id(product_id)
        .lock(LockType::Update)
        .one(txn)
        .await?;
    let product = match product {
        Some(p) => p,
        // Deleted while sitting in a cart.
        None => return Err(AppError::ProductNotFound),
    };

    if quantity > product.stock {
        return Err(AppError::InsufficientStock {
            name: product.name,
            available: product.stock,
        });
    }

    Products::update_many()
        .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(quantity))
        .col_expr(ProdCol::Sales, Expr::col(ProdCol::Sales).add(quantity))
        .filter(ProdCol::Id.eq(product_id))
        .exec(txn)
        .await?;

    Ok(Reservation {
        product_id,
        name: product.name,
        unit_price: product.price,
        seller_id: product.seller_id,
        quantity,
    })
}
