use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::{AddToCartRequest, CartItemDto, CartList, SetQuantityRequest},
        orders::{
            OrderList, OrderWithItems, PlaceOrderRequest, PlacedOrder, UpdateOrderStatusRequest,
        },
        products::{
            CreateProductRequest, CreateReviewRequest, ProductList, ReviewList,
            UpdateProductRequest,
        },
        requests::{AdminRequestPayload, DecideRequest, RequestList, SellerRequestPayload, SubmittedRequest},
        users::{SetRoleRequest, UpdateAddressRequest},
    },
    models::{
        CartItem, Order, OrderItem, OrderStatus, Product, RequestAction, RequestKind,
        RequestStatus, Review, Role, RoleRequest, ShippingAddress, User,
    },
    response::{ApiResponse, Meta},
    routes::{admin, cart, health, orders, params, products, users},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        cart::cart_list,
        cart::add_to_cart,
        cart::set_quantity,
        cart::remove_from_cart,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        products::list_reviews,
        products::add_review,
        orders::place_order,
        orders::list_my_orders,
        orders::list_seller_orders,
        orders::update_status,
        orders::get_order,
        users::get_me,
        users::update_address,
        users::request_seller_role,
        users::request_admin_role,
        admin::list_requests,
        admin::manage_seller_request,
        admin::manage_admin_request,
        admin::list_all_orders,
        admin::set_user_role,
        admin::delete_review
    ),
    components(
        schemas(
            User,
            Product,
            Review,
            CartItem,
            Order,
            OrderItem,
            RoleRequest,
            Role,
            OrderStatus,
            RequestKind,
            RequestStatus,
            RequestAction,
            ShippingAddress,
            AddToCartRequest,
            SetQuantityRequest,
            CartItemDto,
            CartList,
            PlaceOrderRequest,
            PlacedOrder,
            UpdateOrderStatusRequest,
            OrderList,
            OrderWithItems,
            CreateProductRequest,
            UpdateProductRequest,
            CreateReviewRequest,
            ProductList,
            ReviewList,
            SellerRequestPayload,
            AdminRequestPayload,
            DecideRequest,
            SubmittedRequest,
            RequestList,
            SetRoleRequest,
            UpdateAddressRequest,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::RequestListQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<RequestList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Product and review endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Users", description = "Profile and role request endpoints"),
        (name = "Admin", description = "Admin governance endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
