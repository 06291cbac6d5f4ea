pub mod audit_logs;
pub mod cart_items;
pub mod order_items;
pub mod order_sellers;
pub mod orders;
pub mod product_reviews;
pub mod products;
pub mod role_requests;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use cart_items::Entity as CartItems;
pub use order_items::Entity as OrderItems;
pub use order_sellers::Entity as OrderSellers;
pub use orders::Entity as Orders;
pub use product_reviews::Entity as ProductReviews;
pub use products::Entity as Products;
pub use role_requests::Entity as RoleRequests;
pub use users::Entity as Users;
