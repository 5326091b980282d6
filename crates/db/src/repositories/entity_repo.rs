//! Repository for the `entities` table.

use explorer_core::entity::Entity;
use explorer_core::import::ImportedPlace;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::entity::{EntityRow, UpdateEntity};
use crate::repositories::{ImageRepo, ReviewRepo};

/// Column list shared across queries. `gallery` is aggregated from `images`.
const COLUMNS: &str = "e.id, e.place_id, e.entity_type, e.status, e.title, e.short_description, \
     e.area, e.address, e.category_name, e.location_lat, e.location_lng, \
     e.phone, e.whatsapp, e.telegram, e.instagram, e.website, \
     e.price_level, e.average_check, e.total_score, e.reviews_count, e.tags, e.image_url, \
     COALESCE((SELECT array_agg(i.url ORDER BY i.position) FROM images i \
               WHERE i.entity_id = e.id), '{}') AS gallery, \
     e.opening_hours, e.additional_info, e.popular_times_histogram, e.popular_times_live_text, \
     e.last_confirmed_at, e.created_at, e.updated_at";

/// Filters pushed down to SQL. `None` and empty values match everything.
#[derive(Debug, Clone, Default)]
pub struct EntityListQuery {
    pub entity_type: Option<String>,
    pub area: Option<String>,
    pub status: Option<String>,
    /// Lowercased; any-of.
    pub tags: Vec<String>,
    /// Matched as a substring of title, description, address or a tag.
    pub text: Option<String>,
    pub limit: i64,
}

/// Provides CRUD operations for entities plus the bulk-import upsert.
pub struct EntityRepo;

impl EntityRepo {
    /// List entities, best rated first.
    pub async fn list(pool: &PgPool, q: &EntityListQuery) -> Result<Vec<EntityRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM entities e
             WHERE ($1::TEXT IS NULL OR e.entity_type = $1)
               AND ($2::TEXT IS NULL OR e.area = $2)
               AND ($3::TEXT IS NULL OR e.status = $3)
               AND (cardinality($4::TEXT[]) = 0
                    OR EXISTS (SELECT 1 FROM unnest(e.tags) AS t(tag) WHERE lower(t.tag) = ANY($4)))
               AND ($5::TEXT IS NULL
                    OR e.title ILIKE $5
                    OR e.short_description ILIKE $5
                    OR e.address ILIKE $5
                    OR EXISTS (SELECT 1 FROM unnest(e.tags) AS t(tag) WHERE t.tag ILIKE $5))
             ORDER BY e.total_score DESC NULLS LAST, e.created_at DESC
             LIMIT $6"
        );
        sqlx::query_as::<_, EntityRow>(&query)
            .bind(&q.entity_type)
            .bind(&q.area)
            .bind(&q.status)
            .bind(&q.tags)
            .bind(q.text.as_deref().map(like_pattern))
            .bind(q.limit)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<EntityRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM entities e WHERE e.id = $1");
        sqlx::query_as::<_, EntityRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    async fn find_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: &str,
    ) -> Result<Option<EntityRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM entities e WHERE e.id = $1");
        sqlx::query_as::<_, EntityRow>(&query)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Insert an entity and its gallery, returning the stored row.
    pub async fn create(pool: &PgPool, entity: &Entity) -> Result<EntityRow, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "INSERT INTO entities (
                id, place_id, entity_type, status, title, short_description, area, address,
                category_name, location_lat, location_lng, phone, whatsapp, telegram, instagram,
                website, price_level, average_check, total_score, reviews_count, tags, image_url,
                opening_hours, additional_info, popular_times_histogram, popular_times_live_text,
                last_confirmed_at, created_at, updated_at
             ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18,
                $19, $20, $21, $22, $23, $24, $25, $26, $27,
                COALESCE($28, NOW()), COALESCE($29, NOW())
             )",
        )
        .bind(&entity.id)
        .bind(&entity.place_id)
        .bind(entity.entity_type.as_str())
        .bind(entity.status.as_str())
        .bind(&entity.title)
        .bind(non_empty(&entity.short_description))
        .bind(non_empty(&entity.area))
        .bind(non_empty(&entity.address_text))
        .bind(non_empty(&entity.category_name))
        .bind(entity.geo_lat)
        .bind(entity.geo_lng)
        .bind(&entity.contacts.phone)
        .bind(&entity.contacts.whatsapp)
        .bind(&entity.contacts.telegram)
        .bind(&entity.contacts.instagram)
        .bind(&entity.contacts.website)
        .bind(i16::from(entity.price_level))
        .bind(&entity.average_check)
        .bind(entity.rating)
        .bind(i32::try_from(entity.rating_count).unwrap_or(i32::MAX))
        .bind(&entity.tags)
        .bind(&entity.image_url)
        .bind(entity.work_hours.as_ref().map(Json))
        .bind(&entity.additional_info)
        .bind(&entity.popular_times_histogram)
        .bind(&entity.popular_times_live_text)
        .bind(entity.last_confirmed_at)
        .bind(entity.created_at)
        .bind(entity.updated_at)
        .execute(&mut *tx)
        .await?;

        ImageRepo::replace_in_tx(&mut tx, &entity.id, &entity.gallery).await?;

        let row = Self::find_in_tx(&mut tx, &entity.id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        tx.commit().await?;
        Ok(row)
    }

    /// Update an entity. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: &str,
        input: &UpdateEntity,
    ) -> Result<Option<EntityRow>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let updated = sqlx::query_scalar::<_, String>(
            "UPDATE entities SET
                title = COALESCE($2, title),
                entity_type = COALESCE($3, entity_type),
                status = COALESCE($4, status),
                short_description = COALESCE($5, short_description),
                area = COALESCE($6, area),
                address = COALESCE($7, address),
                category_name = COALESCE($8, category_name),
                location_lat = COALESCE($9, location_lat),
                location_lng = COALESCE($10, location_lng),
                phone = COALESCE($11, phone),
                whatsapp = COALESCE($12, whatsapp),
                telegram = COALESCE($13, telegram),
                instagram = COALESCE($14, instagram),
                website = COALESCE($15, website),
                price_level = COALESCE($16, price_level),
                average_check = COALESCE($17, average_check),
                tags = COALESCE($18, tags),
                image_url = COALESCE($19, image_url),
                opening_hours = COALESCE($20, opening_hours),
                additional_info = COALESCE($21, additional_info),
                last_confirmed_at = COALESCE($22, last_confirmed_at),
                updated_at = NOW()
             WHERE id = $1
             RETURNING id",
        )
        .bind(id)
        .bind(&input.title)
        .bind(&input.entity_type)
        .bind(&input.status)
        .bind(&input.short_description)
        .bind(&input.area)
        .bind(&input.address)
        .bind(&input.category_name)
        .bind(input.location_lat)
        .bind(input.location_lng)
        .bind(&input.phone)
        .bind(&input.whatsapp)
        .bind(&input.telegram)
        .bind(&input.instagram)
        .bind(&input.website)
        .bind(input.price_level)
        .bind(&input.average_check)
        .bind(&input.tags)
        .bind(&input.image_url)
        .bind(&input.opening_hours)
        .bind(&input.additional_info)
        .bind(input.last_confirmed_at)
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_none() {
            return Ok(None);
        }

        if let Some(gallery) = &input.gallery {
            ImageRepo::replace_in_tx(&mut tx, id, gallery).await?;
        }

        let row = Self::find_in_tx(&mut tx, id).await?;
        tx.commit().await?;
        Ok(row)
    }

    /// Permanently delete an entity. Images and reviews cascade.
    /// Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM entities WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Insert or refresh an imported place keyed by `place_id`, replacing its
    /// images and reviews wholesale. Returns the stored entity id, which is
    /// the existing one when the place was imported before.
    ///
    /// New rows start `unverified`; a re-import leaves the status alone.
    pub async fn upsert_place(pool: &PgPool, place: &ImportedPlace) -> Result<String, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let id = sqlx::query_scalar::<_, String>(
            "INSERT INTO entities (
                id, place_id, status, title, category_name, total_score, reviews_count, address,
                phone, website, location_lat, location_lng, average_check, image_url,
                opening_hours, additional_info, popular_times_histogram, popular_times_live_text
             ) VALUES (
                $1, $2, 'unverified', $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                $16, $17
             )
             ON CONFLICT (place_id) DO UPDATE SET
                title = EXCLUDED.title,
                category_name = EXCLUDED.category_name,
                total_score = EXCLUDED.total_score,
                reviews_count = EXCLUDED.reviews_count,
                address = EXCLUDED.address,
                phone = EXCLUDED.phone,
                website = EXCLUDED.website,
                location_lat = EXCLUDED.location_lat,
                location_lng = EXCLUDED.location_lng,
                average_check = EXCLUDED.average_check,
                image_url = EXCLUDED.image_url,
                opening_hours = EXCLUDED.opening_hours,
                additional_info = EXCLUDED.additional_info,
                popular_times_histogram = EXCLUDED.popular_times_histogram,
                popular_times_live_text = EXCLUDED.popular_times_live_text,
                updated_at = NOW()
             RETURNING id",
        )
        .bind(&place.id)
        .bind(&place.place_id)
        .bind(&place.title)
        .bind(&place.category_name)
        .bind(place.total_score)
        .bind(place.reviews_count)
        .bind(&place.address)
        .bind(&place.phone)
        .bind(&place.website)
        .bind(place.location_lat)
        .bind(place.location_lng)
        .bind(&place.average_check)
        .bind(&place.image_url)
        .bind(place.opening_hours.as_ref().map(Json))
        .bind(&place.additional_info)
        .bind(&place.popular_times_histogram)
        .bind(&place.popular_times_live_text)
        .fetch_one(&mut *tx)
        .await?;

        ImageRepo::replace_in_tx(&mut tx, &id, &place.images).await?;
        ReviewRepo::replace_in_tx(&mut tx, &id, &place.reviews).await?;

        tx.commit().await?;
        Ok(id)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// `%text%` with LIKE metacharacters escaped.
fn like_pattern(text: &str) -> String {
    let escaped = text
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}
