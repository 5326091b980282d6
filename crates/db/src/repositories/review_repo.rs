//! Repository for the `reviews` table.

use explorer_core::import::ImportedReviewRow;
use sqlx::PgPool;

use crate::models::review::ReviewRow;

const COLUMNS: &str =
    "id, entity_id, author_name, author_photo, rating, text, published_at, created_at";

/// Reviews imported together with a place.
pub struct ReviewRepo;

impl ReviewRepo {
    /// Reviews for an entity, newest first. Undated reviews sort last.
    pub async fn list_for_entity(
        pool: &PgPool,
        entity_id: &str,
    ) -> Result<Vec<ReviewRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM reviews
             WHERE entity_id = $1
             ORDER BY published_at DESC NULLS LAST, id ASC"
        );
        sqlx::query_as::<_, ReviewRow>(&query)
            .bind(entity_id)
            .fetch_all(pool)
            .await
    }

    /// Replace an entity's reviews within an existing transaction.
    pub async fn replace_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        entity_id: &str,
        reviews: &[ImportedReviewRow],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM reviews WHERE entity_id = $1")
            .bind(entity_id)
            .execute(&mut **tx)
            .await?;

        for review in reviews {
            sqlx::query(
                "INSERT INTO reviews (entity_id, author_name, author_photo, rating, text, published_at)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(entity_id)
            .bind(&review.author_name)
            .bind(&review.author_photo)
            .bind(review.rating)
            .bind(&review.text)
            .bind(review.published_at)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }
}
