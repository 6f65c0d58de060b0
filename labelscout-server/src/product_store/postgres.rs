//! PostgreSQL implementation of the product store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use labelscout_core::store::StoreResult;
use labelscout_core::{ProductStore, ScoredProduct, SourceTag, StoreError};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed product store.
#[derive(Clone)]
pub struct PostgresProductStore {
    pool: PgPool,
}

/// Row type for database queries.
#[derive(FromRow)]
struct ProductRow {
    upc: String,
    name: Option<String>,
    brand: Option<String>,
    product_url: String,
    source: String,
    score: i16,
    summary: String,
    highlights: Json<Vec<String>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for ScoredProduct {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let source: SourceTag = row.source.parse().map_err(StoreError::Serialization)?;
        let score = u8::try_from(row.score.clamp(0, 100))
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        Ok(Self {
            upc: row.upc,
            name: row.name,
            brand: row.brand,
            product_url: row.product_url,
            source,
            score,
            summary: row.summary,
            highlights: row.highlights.0,
            updated_at: row.updated_at,
        })
    }
}

fn query_error(e: sqlx::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

impl PostgresProductStore {
    /// Connect to the database and apply pending migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;

        tracing::info!(max_connections, "Product store connected and migrations applied");

        Ok(Self { pool })
    }

    /// Create a product store from an existing pool (for testing).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductStore for PostgresProductStore {
    async fn upsert(&self, product: &ScoredProduct) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO scored_products
                (upc, name, brand, product_url, source, score, summary, highlights, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (upc) DO UPDATE SET
                name = EXCLUDED.name,
                brand = EXCLUDED.brand,
                product_url = EXCLUDED.product_url,
                source = EXCLUDED.source,
                score = EXCLUDED.score,
                summary = EXCLUDED.summary,
                highlights = EXCLUDED.highlights,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&product.upc)
        .bind(&product.name)
        .bind(&product.brand)
        .bind(&product.product_url)
        .bind(product.source.as_str())
        .bind(i16::from(product.score))
        .bind(&product.summary)
        .bind(Json(&product.highlights))
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        tracing::debug!(upc = %product.upc, "Stored scored product");
        Ok(())
    }

    async fn find(&self, upc: &str) -> StoreResult<Option<ScoredProduct>> {
        let row: Option<ProductRow> = sqlx::query_as(
            r#"
            SELECT upc, name, brand, product_url, source, score, summary, highlights, updated_at
            FROM scored_products
            WHERE upc = $1
            "#,
        )
        .bind(upc)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;

        row.map(ScoredProduct::try_from).transpose()
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
