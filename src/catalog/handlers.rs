use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
};
use std::sync::Arc;

use super::models::{
    CategoriesQuery, CreateProductRequest, CreateRatingRequest, CreateServiceRequest,
    ListingQuery, MaxPriceQuery, Product, Rating, RatingPage, RatingQuery, ServiceListing,
    UpdateProductRequest, UpdateServiceRequest,
};
use crate::account::AuthUser;
use crate::catalog::models::ListingFilter;
use crate::core_types::{ProductId, ServiceId, UserId};
use crate::error::ServiceError;
use crate::gateway::extract::{JsonBody, PathParam, QueryParams};
use crate::gateway::{state::AppState, types::ApiResponse};

fn listing_filter(query: ListingQuery) -> Result<ListingFilter, ServiceError> {
    query
        .into_filter()
        .map_err(|e| ServiceError::validation(e.to_string()))
}

// ============================================================================
// Products
// ============================================================================

/// Public product listing
///
/// GET /api/v1/products (also served under /api/v1/clothes)
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(ListingQuery),
    responses(
        (status = 200, description = "Products", body = ApiResponse<Vec<Product>>),
        (status = 400, description = "Invalid filter")
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<ListingQuery>,
) -> Result<Json<ApiResponse<Vec<Product>>>, ServiceError> {
    let products = state.catalog.list_products(listing_filter(query)?).await?;
    Ok(Json(ApiResponse::success("products", products)))
}

/// GET /api/v1/products/price?maxPrice=
#[utoipa::path(
    get,
    path = "/api/v1/products/price",
    params(MaxPriceQuery),
    responses((status = 200, description = "Products at or below the price", body = ApiResponse<Vec<Product>>)),
    tag = "Products"
)]
pub async fn products_by_price(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<MaxPriceQuery>,
) -> Result<Json<ApiResponse<Vec<Product>>>, ServiceError> {
    let products = state.catalog.products_below(query.max_price).await?;
    Ok(Json(ApiResponse::success("products", products)))
}

/// GET /api/v1/products/category?categories=a,b
#[utoipa::path(
    get,
    path = "/api/v1/products/category",
    params(CategoriesQuery),
    responses((status = 200, description = "Products in any of the categories", body = ApiResponse<Vec<Product>>)),
    tag = "Products"
)]
pub async fn products_by_category(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<CategoriesQuery>,
) -> Result<Json<ApiResponse<Vec<Product>>>, ServiceError> {
    let products = state.catalog.products_in_categories(query.split()).await?;
    Ok(Json(ApiResponse::success("products", products)))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(("id" = String, Path, description = "Product id (UUID)")),
    responses(
        (status = 200, description = "Product", body = ApiResponse<Product>),
        (status = 404, description = "Product not found")
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    PathParam(id): PathParam<ProductId>,
) -> Result<Json<ApiResponse<Product>>, ServiceError> {
    let product = state.catalog.get_product(id).await?;
    Ok(Json(ApiResponse::success("product", product)))
}

/// Caller's own products, including inactive ones
#[utoipa::path(
    get,
    path = "/api/v1/products/mine",
    responses((status = 200, description = "Own products", body = ApiResponse<Vec<Product>>)),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn my_products(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<ApiResponse<Vec<Product>>>, ServiceError> {
    let products = state.catalog.my_products(&caller).await?;
    Ok(Json(ApiResponse::success("products", products)))
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<Product>),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Sellers and admins only")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    JsonBody(req): JsonBody<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Product>>), ServiceError> {
    let product = state.catalog.create_product(&caller, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("product created", product)),
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    params(("id" = String, Path, description = "Product id (UUID)")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<Product>),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    PathParam(id): PathParam<ProductId>,
    JsonBody(req): JsonBody<UpdateProductRequest>,
) -> Result<Json<ApiResponse<Product>>, ServiceError> {
    let product = state.catalog.update_product(&caller, id, req).await?;
    Ok(Json(ApiResponse::success("product updated", product)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    params(("id" = String, Path, description = "Product id (UUID)")),
    responses(
        (status = 200, description = "Product deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    PathParam(id): PathParam<ProductId>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.catalog.delete_product(&caller, id).await?;
    Ok(Json(ApiResponse::message("product deleted")))
}

// ============================================================================
// Ratings
// ============================================================================

#[utoipa::path(
    post,
    path = "/api/v1/products/ratings/{seller_id}",
    params(("seller_id" = String, Path, description = "Seller user id (UUID)")),
    request_body = CreateRatingRequest,
    responses(
        (status = 201, description = "Rating recorded", body = ApiResponse<Rating>),
        (status = 400, description = "Stars out of range or self-rating"),
        (status = 404, description = "Seller not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Ratings"
)]
pub async fn rate_seller(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    PathParam(seller_id): PathParam<UserId>,
    JsonBody(req): JsonBody<CreateRatingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Rating>>), ServiceError> {
    let rating = state.ratings.rate_seller(&caller, seller_id, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("rating recorded", rating)),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/ratings",
    params(RatingQuery),
    responses(
        (status = 200, description = "Ratings page", body = ApiResponse<RatingPage>),
        (status = 400, description = "Invalid pagination")
    ),
    tag = "Ratings"
)]
pub async fn list_ratings(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<RatingQuery>,
) -> Result<Json<ApiResponse<RatingPage>>, ServiceError> {
    let page = state.ratings.list_ratings(query).await?;
    Ok(Json(ApiResponse::success("ratings", page)))
}

// ============================================================================
// Services
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/v1/services",
    params(ListingQuery),
    responses((status = 200, description = "Service listings", body = ApiResponse<Vec<ServiceListing>>)),
    tag = "Services"
)]
pub async fn list_services(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<ListingQuery>,
) -> Result<Json<ApiResponse<Vec<ServiceListing>>>, ServiceError> {
    let services = state.catalog.list_services(listing_filter(query)?).await?;
    Ok(Json(ApiResponse::success("services", services)))
}

#[utoipa::path(
    get,
    path = "/api/v1/services/{id}",
    params(("id" = String, Path, description = "Service id (UUID)")),
    responses(
        (status = 200, description = "Service listing", body = ApiResponse<ServiceListing>),
        (status = 404, description = "Service not found")
    ),
    tag = "Services"
)]
pub async fn get_service(
    State(state): State<Arc<AppState>>,
    PathParam(id): PathParam<ServiceId>,
) -> Result<Json<ApiResponse<ServiceListing>>, ServiceError> {
    let service = state.catalog.get_service(id).await?;
    Ok(Json(ApiResponse::success("service", service)))
}

#[utoipa::path(
    get,
    path = "/api/v1/services/mine",
    responses((status = 200, description = "Own service listings", body = ApiResponse<Vec<ServiceListing>>)),
    security(("bearer_auth" = [])),
    tag = "Services"
)]
pub async fn my_services(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<ApiResponse<Vec<ServiceListing>>>, ServiceError> {
    let services = state.catalog.my_services(&caller).await?;
    Ok(Json(ApiResponse::success("services", services)))
}

#[utoipa::path(
    post,
    path = "/api/v1/services",
    request_body = CreateServiceRequest,
    responses(
        (status = 201, description = "Service created", body = ApiResponse<ServiceListing>),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Sellers and admins only")
    ),
    security(("bearer_auth" = [])),
    tag = "Services"
)]
pub async fn create_service(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    JsonBody(req): JsonBody<CreateServiceRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ServiceListing>>), ServiceError> {
    let service = state.catalog.create_service(&caller, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("service created", service)),
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/services/{id}",
    params(("id" = String, Path, description = "Service id (UUID)")),
    request_body = UpdateServiceRequest,
    responses(
        (status = 200, description = "Service updated", body = ApiResponse<ServiceListing>),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Service not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Services"
)]
pub async fn update_service(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    PathParam(id): PathParam<ServiceId>,
    JsonBody(req): JsonBody<UpdateServiceRequest>,
) -> Result<Json<ApiResponse<ServiceListing>>, ServiceError> {
    let service = state.catalog.update_service(&caller, id, req).await?;
    Ok(Json(ApiResponse::success("service updated", service)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/services/{id}",
    params(("id" = String, Path, description = "Service id (UUID)")),
    responses(
        (status = 200, description = "Service deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Service not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Services"
)]
pub async fn delete_service(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    PathParam(id): PathParam<ServiceId>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.catalog.delete_service(&caller, id).await?;
    Ok(Json(ApiResponse::message("service deleted")))
}
