//! Repository for the `images` table.

use sqlx::PgPool;

/// Ordered gallery images owned by an entity.
pub struct ImageRepo;

impl ImageRepo {
    /// Gallery URLs for an entity in position order.
    pub async fn list_urls(pool: &PgPool, entity_id: &str) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT url FROM images WHERE entity_id = $1 ORDER BY position ASC",
        )
        .bind(entity_id)
        .fetch_all(pool)
        .await
    }

    /// Replace an entity's images within an existing transaction.
    ///
    /// Positions follow the order of `urls`, starting at 0.
    pub async fn replace_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        entity_id: &str,
        urls: &[String],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM images WHERE entity_id = $1")
            .bind(entity_id)
            .execute(&mut **tx)
            .await?;

        for (position, url) in urls.iter().enumerate() {
            sqlx::query("INSERT INTO images (entity_id, url, position) VALUES ($1, $2, $3)")
                .bind(entity_id)
                .bind(url)
                .bind(position as i32)
                .execute(&mut **tx)
                .await?;
        }

        Ok(())
    }
}
