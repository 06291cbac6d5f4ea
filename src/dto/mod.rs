pub mod cart;
pub mod orders;
pub mod products;
pub mod requests;
pub mod users;
