//! User reviews.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use super::{Store, StoreError};

/// A review as submitted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewReview {
    pub user_id: i64,
    pub rating: f64,
    pub comment: String,
}

/// A stored review.
#[derive(Debug, Clone, PartialEq)]
pub struct Review {
    pub id: i64,
    pub user_id: i64,
    pub rating: f64,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: i64,
    user_id: i64,
    rating: f64,
    comment: String,
    created_at: String,
}

impl TryFrom<ReviewRow> for Review {
    type Error = StoreError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|e| StoreError::InvalidRow {
                table: "reviews",
                id: row.id,
                reason: format!("created_at {:?}: {e}", row.created_at),
            })?
            .with_timezone(&Utc);

        Ok(Review {
            id: row.id,
            user_id: row.user_id,
            rating: row.rating,
            comment: row.comment,
            created_at,
        })
    }
}

impl Store {
    pub async fn user_exists(&self, user_id: i64) -> Result<bool, StoreError> {
        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM users WHERE id = ?)")
            .bind(user_id)
            .fetch_one(self.pool())
            .await?;
        Ok(exists)
    }

    /// Insert a user with an already-hashed password. Returns the new id.
    pub async fn insert_user(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<i64, StoreError> {
        let result = sqlx::query("INSERT INTO users (username, password, role) VALUES (?, ?, ?)")
            .bind(username)
            .bind(password_hash)
            .bind(role)
            .execute(self.pool())
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Store a review after checking its author exists.
    pub async fn create_review(
        &self,
        review: &NewReview,
        created_at: DateTime<Utc>,
    ) -> Result<Review, StoreError> {
        if !self.user_exists(review.user_id).await? {
            return Err(StoreError::UserNotFound(review.user_id));
        }

        let result = sqlx::query(
            "INSERT INTO reviews (user_id, rating, comment, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(review.user_id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(created_at.to_rfc3339())
        .execute(self.pool())
        .await?;

        let id = result.last_insert_rowid();
        info!(id, user_id = review.user_id, "Review created");

        Ok(Review {
            id,
            user_id: review.user_id,
            rating: review.rating,
            comment: review.comment.clone(),
            created_at,
        })
    }

    /// Every review, newest first.
    pub async fn all_reviews(&self) -> Result<Vec<Review>, StoreError> {
        let rows: Vec<ReviewRow> = sqlx::query_as(
            "SELECT id, user_id, rating, comment, created_at FROM reviews ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(Review::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn store() -> Store {
        let store = Store::in_memory().await.unwrap();
        store.init_schema().await.unwrap();
        store
    }

    fn review(user_id: i64, comment: &str) -> NewReview {
        NewReview {
            user_id,
            rating: 4.5,
            comment: comment.into(),
        }
    }

    #[tokio::test]
    async fn review_for_unknown_user_is_rejected() {
        let store = store().await;
        let err = store
            .create_review(&review(99, "nice"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UserNotFound(99)));
        assert!(store.all_reviews().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reviews_listed_newest_first() {
        let store = store().await;
        let user = store.insert_user("rani", "$2a$10$hash", "user").await.unwrap();
        assert!(store.user_exists(user).await.unwrap());

        let earlier = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2025, 3, 2, 8, 0, 0).unwrap();

        store.create_review(&review(user, "first"), earlier).await.unwrap();
        let created = store.create_review(&review(user, "second"), later).await.unwrap();
        assert_eq!(created.created_at, later);

        let reviews = store.all_reviews().await.unwrap();
        let comments: Vec<&str> = reviews.iter().map(|r| r.comment.as_str()).collect();
        assert_eq!(comments, vec!["second", "first"]);
        assert_eq!(reviews[1].created_at, earlier);
    }
}
