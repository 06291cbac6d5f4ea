use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{RequestAction, RoleRequest};

#[derive(Debug, Deserialize, ToSchema)]
pub struct SellerRequestPayload {
    pub phone: String,
    pub address: String,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminRequestPayload {
    pub reason: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DecideRequest {
    pub action: RequestAction,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubmittedRequest {
    pub request_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RequestList {
    pub items: Vec<RoleRequest>,
}
