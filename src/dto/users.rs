use serde::Deserialize;
use utoipa::ToSchema;

use crate::models::{Role, ShippingAddress};

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAddressRequest {
    pub shipping_address: ShippingAddress,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetRoleRequest {
    pub role: Role,
}
