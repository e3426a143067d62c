//! Catalog models: products, service listings and seller ratings

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use crate::core_types::{ParseEnumError, ProductId, RatingId, ServiceId, UserId, text_enum};

/// Seller-owned product with stock
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Product {
    #[schema(value_type = uuid::Uuid)]
    pub id: ProductId,
    #[schema(value_type = uuid::Uuid)]
    pub seller_id: UserId,
    #[schema(example = "Kitenge Dress")]
    pub name: String,
    pub description: String,
    #[schema(value_type = String, example = "2500.00")]
    pub price: Decimal,
    #[schema(example = "dresses")]
    pub category: String,
    #[schema(example = 12)]
    pub stock: i32,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Seller-offered service (no stock)
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct ServiceListing {
    #[schema(value_type = uuid::Uuid)]
    pub id: ServiceId,
    #[schema(value_type = uuid::Uuid)]
    pub seller_id: UserId,
    #[schema(example = "Tailoring")]
    pub name: String,
    pub description: String,
    #[schema(value_type = String, example = "800.00")]
    pub price: Decimal,
    pub category: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Rating {
    #[schema(value_type = uuid::Uuid)]
    pub id: RatingId,
    #[schema(value_type = uuid::Uuid)]
    pub seller_id: UserId,
    /// Author
    #[schema(value_type = uuid::Uuid)]
    pub user_id: UserId,
    #[schema(minimum = 1, maximum = 5, example = 4)]
    pub stars: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Listing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Random,
}

text_enum!(SortOrder, "sort", {
    Newest => "newest",
    PriceAsc => "price_asc",
    PriceDesc => "price_desc",
    Random => "random",
});

/// Filter shared by product and service listings.
///
/// Deleted listings are always excluded. `categories` matches any of the
/// given values; an empty list matches every category.
#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    pub categories: Vec<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub seller_id: Option<UserId>,
    /// Case-insensitive substring of name or description
    pub search: Option<String>,
    pub sort: SortOrder,
    /// Include listings the seller switched off (owner views)
    pub include_inactive: bool,
}

/// Query string for `GET /products` and `GET /services`
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListingQuery {
    /// Exact category
    pub category: Option<String>,
    #[param(value_type = Option<String>)]
    pub min_price: Option<Decimal>,
    #[param(value_type = Option<String>)]
    pub max_price: Option<Decimal>,
    pub search: Option<String>,
    /// newest | price_asc | price_desc | random
    pub sort: Option<String>,
}

impl ListingQuery {
    pub fn into_filter(self) -> Result<ListingFilter, ParseEnumError> {
        let sort = match self.sort.as_deref() {
            Some(s) => s.parse()?,
            None => SortOrder::default(),
        };
        Ok(ListingFilter {
            categories: self.category.into_iter().collect(),
            min_price: self.min_price,
            max_price: self.max_price,
            search: self.search.filter(|s| !s.trim().is_empty()),
            sort,
            ..Default::default()
        })
    }
}

/// `GET /products/price?maxPrice=`
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MaxPriceQuery {
    #[serde(rename = "maxPrice")]
    #[param(value_type = String)]
    pub max_price: Decimal,
}

/// `GET /products/category?categories=a,b`
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CategoriesQuery {
    /// Comma separated
    pub categories: String,
}

impl CategoriesQuery {
    pub fn split(&self) -> Vec<String> {
        self.categories
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from)
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    #[schema(example = "Kitenge Dress")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[schema(value_type = String, example = "2500.00")]
    pub price: Decimal,
    #[serde(default)]
    pub category: String,
    #[schema(example = 12)]
    pub stock: i32,
    pub image_url: Option<String>,
}

/// Partial update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    pub category: Option<String>,
    pub stock: Option<i32>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

/// Validated column changes for `CatalogStore::update_product`.
///
/// Only the columns that are set get written, so a stock decrement committed
/// by an order in the meantime survives a price or name edit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub category: Option<String>,
    /// Absolute stock level
    pub stock: Option<i32>,
    /// `Some(None)` clears the image
    pub image_url: Option<Option<String>>,
    pub is_active: Option<bool>,
}

impl ProductChanges {
    pub fn apply(&self, product: &mut Product, at: DateTime<Utc>) {
        if let Some(name) = &self.name {
            product.name = name.clone();
        }
        if let Some(description) = &self.description {
            product.description = description.clone();
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(category) = &self.category {
            product.category = category.clone();
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(image_url) = &self.image_url {
            product.image_url = image_url.clone();
        }
        if let Some(is_active) = self.is_active {
            product.is_active = is_active;
        }
        product.updated_at = at;
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateServiceRequest {
    #[schema(example = "Tailoring")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[schema(value_type = String, example = "800.00")]
    pub price: Decimal,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateServiceRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    pub category: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateRatingRequest {
    #[schema(example = 4)]
    pub stars: i16,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RatingQuery {
    #[param(value_type = Option<uuid::Uuid>)]
    pub seller_id: Option<UserId>,
    /// Page size, default 10, max 100
    pub limit: Option<i64>,
    /// 1-based, default 1
    pub page: Option<i64>,
}

/// Pagination metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PageMeta {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RatingPage {
    pub ratings: Vec<Rating>,
    pub meta: PageMeta,
}
