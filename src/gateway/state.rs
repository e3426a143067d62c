use std::sync::Arc;

use crate::account::{TokenIssuer, UserService};
use crate::cart::CartService;
use crate::catalog::{CatalogService, RatingService};
use crate::notify::ResetNotifier;
use crate::orders::OrderService;
use crate::payments::{PaymentGateway, PaymentService};
use crate::store::Store;

/// Shared gateway state
#[derive(Clone)]
pub struct AppState {
    /// Backing store, used directly only by the health check
    pub store: Arc<dyn Store>,
    pub users: Arc<UserService>,
    pub catalog: Arc<CatalogService>,
    pub ratings: Arc<RatingService>,
    pub carts: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
    /// Set `Secure` on the auth cookie
    pub secure_cookie: bool,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        tokens: Arc<TokenIssuer>,
        notifier: Arc<dyn ResetNotifier>,
        gateway: Arc<dyn PaymentGateway>,
        reset_code_ttl_minutes: i64,
        secure_cookie: bool,
    ) -> Self {
        let orders = Arc::new(OrderService::new(store.clone()));
        Self {
            users: Arc::new(UserService::new(
                store.clone(),
                tokens,
                notifier,
                reset_code_ttl_minutes,
            )),
            catalog: Arc::new(CatalogService::new(store.clone())),
            ratings: Arc::new(RatingService::new(store.clone())),
            carts: Arc::new(CartService::new(store.clone(), orders.clone())),
            payments: Arc::new(PaymentService::new(store.clone(), gateway)),
            orders,
            store,
            secure_cookie,
        }
    }
}
