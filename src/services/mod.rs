pub mod admin_service;
pub mod cart_service;
pub mod inventory;
pub mod order_service;
pub mod product_service;
pub mod role_request_service;
pub mod user_service;
