//! Product and service listing operations

use std::sync::Arc;

use chrono::Utc;
use rand::seq::SliceRandom;
use uuid::Uuid;

use super::models::{
    CreateProductRequest, CreateServiceRequest, ListingFilter, Product, ProductChanges,
    ServiceListing, SortOrder, UpdateProductRequest, UpdateServiceRequest,
};
use crate::account::AuthUser;
use crate::account::validation::required;
use crate::core_types::{ProductId, ServiceId, UserId};
use crate::error::ServiceError;
use crate::money::validate_price;
use crate::store::Store;

pub struct CatalogService {
    store: Arc<dyn Store>,
}

fn ensure_can_sell(caller: &AuthUser) -> Result<(), ServiceError> {
    if caller.role.can_sell() {
        Ok(())
    } else {
        Err(ServiceError::forbidden("only sellers can create listings"))
    }
}

fn ensure_owner(caller: &AuthUser, seller_id: UserId) -> Result<(), ServiceError> {
    if caller.can_act_for(seller_id) {
        Ok(())
    } else {
        Err(ServiceError::forbidden("not the owner of this listing"))
    }
}

fn validate_stock(stock: i32) -> Result<i32, ServiceError> {
    if stock < 0 {
        return Err(ServiceError::validation("stock cannot be negative"));
    }
    Ok(stock)
}

/// Stores always return newest first for `Random`; the shuffle happens here.
fn apply_sort<T>(mut items: Vec<T>, sort: SortOrder) -> Vec<T> {
    if sort == SortOrder::Random {
        items.shuffle(&mut rand::thread_rng());
    }
    items
}

/// Categories are stored lowercased
fn normalize_filter(mut filter: ListingFilter) -> Result<ListingFilter, ServiceError> {
    if let (Some(min), Some(max)) = (filter.min_price, filter.max_price) {
        if min > max {
            return Err(ServiceError::validation(
                "min_price cannot be greater than max_price",
            ));
        }
    }
    filter.categories = filter
        .categories
        .iter()
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .collect();
    Ok(filter)
}

impl CatalogService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    // ------------------------------------------------------------------
    // Products
    // ------------------------------------------------------------------

    pub async fn create_product(
        &self,
        caller: &AuthUser,
        req: CreateProductRequest,
    ) -> Result<Product, ServiceError> {
        ensure_can_sell(caller)?;
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            seller_id: caller.user_id,
            name: required(&req.name, "name")?,
            description: req.description.trim().to_string(),
            price: validate_price(req.price)?,
            category: req.category.trim().to_lowercase(),
            stock: validate_stock(req.stock)?,
            image_url: req.image_url.filter(|u| !u.trim().is_empty()),
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.store.insert_product(&product).await?;
        tracing::info!(
            "Product {} created by seller {} (stock {})",
            product.id,
            product.seller_id,
            product.stock
        );
        Ok(product)
    }

    /// Public view: inactive products are hidden
    pub async fn get_product(&self, id: ProductId) -> Result<Product, ServiceError> {
        let product = self.load_product(id).await?;
        if !product.is_active {
            return Err(ServiceError::not_found("product not found"));
        }
        Ok(product)
    }

    pub async fn update_product(
        &self,
        caller: &AuthUser,
        id: ProductId,
        req: UpdateProductRequest,
    ) -> Result<Product, ServiceError> {
        let product = self.load_product(id).await?;
        ensure_owner(caller, product.seller_id)?;

        let changes = ProductChanges {
            name: req.name.map(|n| required(&n, "name")).transpose()?,
            description: req.description.map(|d| d.trim().to_string()),
            price: req.price.map(validate_price).transpose()?,
            category: req.category.map(|c| c.trim().to_lowercase()),
            stock: req.stock.map(validate_stock).transpose()?,
            image_url: req
                .image_url
                .map(|u| Some(u).filter(|u| !u.trim().is_empty())),
            is_active: req.is_active,
        };
        Ok(self.store.update_product(id, &changes, Utc::now()).await?)
    }

    pub async fn delete_product(&self, caller: &AuthUser, id: ProductId) -> Result<(), ServiceError> {
        let product = self.load_product(id).await?;
        ensure_owner(caller, product.seller_id)?;
        self.store.delete_product(id, Utc::now()).await?;
        tracing::info!("Product {} deleted by {}", id, caller.user_id);
        Ok(())
    }

    pub async fn list_products(&self, filter: ListingFilter) -> Result<Vec<Product>, ServiceError> {
        let filter = normalize_filter(filter)?;
        let products = self.store.list_products(&filter).await?;
        Ok(apply_sort(products, filter.sort))
    }

    /// Active products priced at or below `max_price`, cheapest first
    pub async fn products_below(
        &self,
        max_price: rust_decimal::Decimal,
    ) -> Result<Vec<Product>, ServiceError> {
        if max_price.is_sign_negative() {
            return Err(ServiceError::validation("maxPrice cannot be negative"));
        }
        self.list_products(ListingFilter {
            max_price: Some(max_price),
            sort: SortOrder::PriceAsc,
            ..Default::default()
        })
        .await
    }

    pub async fn products_in_categories(
        &self,
        categories: Vec<String>,
    ) -> Result<Vec<Product>, ServiceError> {
        if categories.is_empty() {
            return Err(ServiceError::validation("at least one category is required"));
        }
        self.list_products(ListingFilter {
            categories,
            ..Default::default()
        })
        .await
    }

    /// Caller's own products, including switched-off ones
    pub async fn my_products(&self, caller: &AuthUser) -> Result<Vec<Product>, ServiceError> {
        self.list_products(ListingFilter {
            seller_id: Some(caller.user_id),
            include_inactive: true,
            ..Default::default()
        })
        .await
    }

    async fn load_product(&self, id: ProductId) -> Result<Product, ServiceError> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("product not found"))
    }

    // ------------------------------------------------------------------
    // Services
    // ------------------------------------------------------------------

    pub async fn create_service(
        &self,
        caller: &AuthUser,
        req: CreateServiceRequest,
    ) -> Result<ServiceListing, ServiceError> {
        ensure_can_sell(caller)?;
        let now = Utc::now();
        let service = ServiceListing {
            id: Uuid::new_v4(),
            seller_id: caller.user_id,
            name: required(&req.name, "name")?,
            description: req.description.trim().to_string(),
            price: validate_price(req.price)?,
            category: req.category.trim().to_lowercase(),
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.store.insert_service(&service).await?;
        tracing::info!("Service {} created by seller {}", service.id, service.seller_id);
        Ok(service)
    }

    pub async fn get_service(&self, id: ServiceId) -> Result<ServiceListing, ServiceError> {
        let service = self.load_service(id).await?;
        if !service.is_active {
            return Err(ServiceError::not_found("service not found"));
        }
        Ok(service)
    }

    pub async fn update_service(
        &self,
        caller: &AuthUser,
        id: ServiceId,
        req: UpdateServiceRequest,
    ) -> Result<ServiceListing, ServiceError> {
        let mut service = self.load_service(id).await?;
        ensure_owner(caller, service.seller_id)?;

        if let Some(name) = req.name {
            service.name = required(&name, "name")?;
        }
        if let Some(description) = req.description {
            service.description = description.trim().to_string();
        }
        if let Some(price) = req.price {
            service.price = validate_price(price)?;
        }
        if let Some(category) = req.category {
            service.category = category.trim().to_lowercase();
        }
        if let Some(is_active) = req.is_active {
            service.is_active = is_active;
        }
        service.updated_at = Utc::now();

        self.store.save_service(&service).await?;
        Ok(service)
    }

    pub async fn delete_service(&self, caller: &AuthUser, id: ServiceId) -> Result<(), ServiceError> {
        let service = self.load_service(id).await?;
        ensure_owner(caller, service.seller_id)?;
        self.store.delete_service(id, Utc::now()).await?;
        tracing::info!("Service {} deleted by {}", id, caller.user_id);
        Ok(())
    }

    pub async fn list_services(
        &self,
        filter: ListingFilter,
    ) -> Result<Vec<ServiceListing>, ServiceError> {
        let filter = normalize_filter(filter)?;
        let services = self.store.list_services(&filter).await?;
        Ok(apply_sort(services, filter.sort))
    }

    pub async fn my_services(&self, caller: &AuthUser) -> Result<Vec<ServiceListing>, ServiceError> {
        self.list_services(ListingFilter {
            seller_id: Some(caller.user_id),
            include_inactive: true,
            ..Default::default()
        })
        .await
    }

    async fn load_service(&self, id: ServiceId) -> Result<ServiceListing, ServiceError> {
        self.store
            .get_service(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("service not found"))
    }
}
