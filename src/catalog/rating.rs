//! Seller ratings

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::models::{CreateRatingRequest, PageMeta, Rating, RatingPage, RatingQuery};
use crate::account::AuthUser;
use crate::core_types::UserId;
use crate::error::ServiceError;
use crate::store::Store;

pub const MIN_STARS: i16 = 1;
pub const MAX_STARS: i16 = 5;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

pub fn validate_stars(stars: i16) -> Result<i16, ServiceError> {
    if !(MIN_STARS..=MAX_STARS).contains(&stars) {
        return Err(ServiceError::validation(format!(
            "stars must be between {} and {}",
            MIN_STARS, MAX_STARS
        )));
    }
    Ok(stars)
}

/// Resolved page window: (page, limit, offset)
pub fn page_window(page: Option<i64>, limit: Option<i64>) -> Result<(i64, i64, i64), ServiceError> {
    let page = page.unwrap_or(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if page < 1 {
        return Err(ServiceError::validation("page must be at least 1"));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(ServiceError::validation(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }
    let offset = (page - 1)
        .checked_mul(limit)
        .ok_or_else(|| ServiceError::validation("page is out of range"))?;
    Ok((page, limit, offset))
}

pub fn page_meta(total: i64, page: i64, limit: i64) -> PageMeta {
    PageMeta {
        total,
        page,
        limit,
        total_pages: (total + limit - 1) / limit,
    }
}

pub struct RatingService {
    store: Arc<dyn Store>,
}

impl RatingService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn rate_seller(
        &self,
        caller: &AuthUser,
        seller_id: UserId,
        req: CreateRatingRequest,
    ) -> Result<Rating, ServiceError> {
        let stars = validate_stars(req.stars)?;
        if caller.user_id == seller_id {
            return Err(ServiceError::validation("you cannot rate yourself"));
        }
        self.store
            .get_user(seller_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("seller not found"))?;

        let rating = Rating {
            id: Uuid::new_v4(),
            seller_id,
            user_id: caller.user_id,
            stars,
            comment: req
                .comment
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            created_at: Utc::now(),
        };
        self.store.insert_rating(&rating).await?;
        tracing::info!(
            "Seller {} rated {} stars by {}",
            seller_id,
            stars,
            caller.user_id
        );
        Ok(rating)
    }

    pub async fn list_ratings(&self, query: RatingQuery) -> Result<RatingPage, ServiceError> {
        let (page, limit, offset) = page_window(query.page, query.limit)?;
        let (ratings, total) = self
            .store
            .list_ratings(query.seller_id, limit, offset)
            .await?;
        Ok(RatingPage {
            ratings,
            meta: page_meta(total, page, limit),
        })
    }
}
