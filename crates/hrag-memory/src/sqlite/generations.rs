use super::SqliteStore;
use crate::error::MemoryError;
use crate::types::Generation;

impl SqliteStore {
    /// Generation currently served to queries, if any ingestion has completed.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn active_generation(&self) -> Result<Option<Generation>, MemoryError> {
        let row: Option<(Generation,)> = sqlx::query_as(
            "SELECT generation FROM index_generations WHERE status = 'active' \
             ORDER BY generation DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.0))
    }

    /// Register a new generation in `building` state and return it.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn begin_generation(&self) -> Result<Generation, MemoryError> {
        let row: (Generation,) = sqlx::query_as(
            "INSERT INTO index_generations (generation, status) \
             SELECT COALESCE(MAX(generation), 0) + 1, 'building' FROM index_generations \
             RETURNING generation",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    /// Make `generation` the active one and retire the previous active
    /// generation, in one transaction. Returns the retired generation.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub async fn activate_generation(
        &self,
        generation: Generation,
    ) -> Result<Option<Generation>, MemoryError> {
        let mut tx = self.pool.begin().await?;

        let previous: Option<(Generation,)> = sqlx::query_as(
            "UPDATE index_generations SET status = 'retired' \
             WHERE status = 'active' AND generation != ? RETURNING generation",
        )
        .bind(generation)
        .fetch_optional(&mut *tx)
        .await?;

        let updated = sqlx::query(
            "UPDATE index_generations SET status = 'active', activated_at = datetime('now') \
             WHERE generation = ?",
        )
        .bind(generation)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(MemoryError::Other(format!(
                "generation {generation} does not exist"
            )));
        }

        tx.commit().await?;
        Ok(previous.map(|r| r.0))
    }

    /// Delete a generation and, by cascade, its chunks.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_generation(&self, generation: Generation) -> Result<(), MemoryError> {
        sqlx::query("DELETE FROM index_generations WHERE generation = ?")
            .bind(generation)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteStore {
        SqliteStore::new(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn fresh_store_has_no_active_generation() {
        assert!(test_store().await.active_generation().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn generations_increase() {
        let store = test_store().await;
        let g1 = store.begin_generation().await.unwrap();
        let g2 = store.begin_generation().await.unwrap();
        assert_eq!(g1, Generation(1));
        assert_eq!(g2, Generation(2));
    }

    #[tokio::test]
    async fn building_generation_is_not_active() {
        let store = test_store().await;
        store.begin_generation().await.unwrap();
        assert!(store.active_generation().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn activation_retires_previous() {
        let store = test_store().await;
        let g1 = store.begin_generation().await.unwrap();
        assert_eq!(store.activate_generation(g1).await.unwrap(), None);

        let g2 = store.begin_generation().await.unwrap();
        assert_eq!(store.activate_generation(g2).await.unwrap(), Some(g1));
        assert_eq!(store.active_generation().await.unwrap(), Some(g2));
    }

    #[tokio::test]
    async fn reactivating_same_generation_retires_nothing() {
        let store = test_store().await;
        let g1 = store.begin_generation().await.unwrap();
        store.activate_generation(g1).await.unwrap();
        assert_eq!(store.activate_generation(g1).await.unwrap(), None);
        assert_eq!(store.active_generation().await.unwrap(), Some(g1));
    }

    #[tokio::test]
    async fn activating_unknown_generation_fails() {
        let store = test_store().await;
        assert!(store.activate_generation(Generation(9)).await.is_err());
    }

    #[tokio::test]
    async fn deleted_generation_numbers_are_not_reused_while_newer_exist() {
        let store = test_store().await;
        let g1 = store.begin_generation().await.unwrap();
        let g2 = store.begin_generation().await.unwrap();
        store.delete_generation(g1).await.unwrap();
        assert_eq!(store.begin_generation().await.unwrap(), g2.next());
    }
}
