use async_trait::async_trait;
use sqlx::{Any, Row, Transaction};
use tracing::{debug, info, instrument};

use crate::store::{Artist, ArtistStore};
use crate::TARGET_DB;

/// `ArtistStore` over an open sqlx transaction.
///
/// Once `commit` or `rollback` has run the transaction is gone and every
/// further call fails.
pub struct SqlArtistStore {
    transaction: Option<Transaction<'static, Any>>,
}

impl SqlArtistStore {
    pub fn new(transaction: Transaction<'static, Any>) -> Self {
        Self {
            transaction: Some(transaction),
        }
    }

    fn transaction(&mut self) -> Result<&mut Transaction<'static, Any>, sqlx::Error> {
        self.transaction
            .as_mut()
            .ok_or_else(|| sqlx::Error::Protocol("transaction already finished".into()))
    }

    fn take_transaction(&mut self) -> Result<Transaction<'static, Any>, sqlx::Error> {
        self.transaction
            .take()
            .ok_or_else(|| sqlx::Error::Protocol("transaction already finished".into()))
    }
}

#[async_trait]
impl ArtistStore for SqlArtistStore {
    #[instrument(target = "db", level = "info", skip(self))]
    async fn fetch_artists(&mut self) -> Result<Vec<Artist>, sqlx::Error> {
        let transaction = self.transaction()?;
        // One row per name; the lowest id wins when a name is duplicated.
        let rows = sqlx::query(
            r#"
            SELECT name, CAST(MIN(artist_id) AS BIGINT) AS artist_id
            FROM artists
            GROUP BY name
            ORDER BY name
            "#,
        )
        .fetch_all(&mut **transaction)
        .await?;

        let mut artists = Vec::with_capacity(rows.len());
        for row in rows {
            artists.push(Artist {
                name: row.try_get("name")?,
                id: row.try_get("artist_id")?,
            });
        }

        info!(target: TARGET_DB, "Fetched {} distinct artists", artists.len());
        Ok(artists)
    }

    async fn reassign_tracks(&mut self, from_id: i64, to_id: i64) -> Result<u64, sqlx::Error> {
        let transaction = self.transaction()?;
        let result = sqlx::query("UPDATE tracks SET artist_id = $1 WHERE artist_id = $2")
            .bind(to_id)
            .bind(from_id)
            .execute(&mut **transaction)
            .await?;

        debug!(
            target: TARGET_DB,
            "Reassigned {} track(s) from artist {} to {}",
            result.rows_affected(),
            from_id,
            to_id
        );
        Ok(result.rows_affected())
    }

    async fn delete_artist(&mut self, artist_id: i64) -> Result<u64, sqlx::Error> {
        let transaction = self.transaction()?;
        let result = sqlx::query("DELETE FROM artists WHERE artist_id = $1")
            .bind(artist_id)
            .execute(&mut **transaction)
            .await?;

        debug!(target: TARGET_DB, "Deleted artist {}", artist_id);
        Ok(result.rows_affected())
    }

    async fn commit(&mut self) -> Result<(), sqlx::Error> {
        self.take_transaction()?.commit().await?;
        info!(target: TARGET_DB, "Transaction committed");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), sqlx::Error> {
        self.take_transaction()?.rollback().await?;
        info!(target: TARGET_DB, "Transaction rolled back");
        Ok(())
    }
}
