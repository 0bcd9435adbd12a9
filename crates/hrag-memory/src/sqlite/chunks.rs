use super::SqliteStore;
use crate::error::MemoryError;
use crate::types::{ChunkRecord, Generation};

impl SqliteStore {
    /// Insert chunks into `generation`, overwriting rows with the same id.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails; no rows are written in that case.
    pub async fn upsert_chunks(
        &self,
        generation: Generation,
        chunks: &[ChunkRecord],
    ) -> Result<(), MemoryError> {
        let mut tx = self.pool.begin().await?;
        for chunk in chunks {
            sqlx::query(
                "INSERT INTO chunks (id, generation, source, position, content) \
                 VALUES (?, ?, ?, ?, ?) \
                 ON CONFLICT(id) DO UPDATE SET \
                 generation = excluded.generation, source = excluded.source, \
                 position = excluded.position, content = excluded.content",
            )
            .bind(&chunk.id)
            .bind(generation)
            .bind(&chunk.source)
            .bind(chunk.position)
            .bind(&chunk.content)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// All chunks of `generation`, ordered by source then position.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn load_chunks(
        &self,
        generation: Generation,
    ) -> Result<Vec<ChunkRecord>, MemoryError> {
        let rows: Vec<ChunkRecord> = sqlx::query_as(
            "SELECT id, source, position, content FROM chunks \
             WHERE generation = ? ORDER BY source ASC, position ASC",
        )
        .bind(generation)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Ids of every chunk in `generation`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn chunk_ids(&self, generation: Generation) -> Result<Vec<String>, MemoryError> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM chunks WHERE generation = ?")
            .bind(generation)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    /// Remove the chunks with the given ids, whatever their generation.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails; no rows are removed in that case.
    pub async fn delete_chunks(&self, ids: &[String]) -> Result<u64, MemoryError> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0;
        for id in ids {
            removed += sqlx::query("DELETE FROM chunks WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with_generation() -> (SqliteStore, Generation) {
        let store = SqliteStore::new(":memory:").await.unwrap();
        let generation = store.begin_generation().await.unwrap();
        (store, generation)
    }

    fn record(id: &str, source: &str, position: i64, content: &str) -> ChunkRecord {
        ChunkRecord {
            id: id.into(),
            source: source.into(),
            position,
            content: content.into(),
        }
    }

    #[tokio::test]
    async fn upsert_and_load_in_order() {
        let (store, g) = store_with_generation().await;
        store
            .upsert_chunks(
                g,
                &[
                    record("c", "b.txt", 0, "third"),
                    record("b", "a.txt", 1, "second"),
                    record("a", "a.txt", 0, "first"),
                ],
            )
            .await
            .unwrap();

        let loaded = store.load_chunks(g).await.unwrap();
        let contents: Vec<&str> = loaded.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, ["first", "second", "third"]);
    }

    #[tokio::test]
    async fn same_id_overwrites() {
        let (store, g) = store_with_generation().await;
        store
            .upsert_chunks(g, &[record("a", "a.txt", 0, "old")])
            .await
            .unwrap();
        store
            .upsert_chunks(g, &[record("a", "a.txt", 0, "new")])
            .await
            .unwrap();

        let loaded = store.load_chunks(g).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].content, "new");
    }

    #[tokio::test]
    async fn delete_chunks_by_id() {
        let (store, g) = store_with_generation().await;
        store
            .upsert_chunks(
                g,
                &[
                    record("a", "a.txt", 0, "x"),
                    record("b", "a.txt", 1, "y"),
                    record("c", "b.txt", 0, "z"),
                ],
            )
            .await
            .unwrap();

        let removed = store
            .delete_chunks(&["a".to_owned(), "c".to_owned(), "missing".to_owned()])
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.chunk_ids(g).await.unwrap(), ["b"]);
    }

    #[tokio::test]
    async fn deleting_generation_cascades_to_chunks() {
        let (store, g) = store_with_generation().await;
        store
            .upsert_chunks(g, &[record("a", "a.txt", 0, "x")])
            .await
            .unwrap();
        store.delete_generation(g).await.unwrap();
        assert!(store.chunk_ids(g).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn chunks_require_existing_generation() {
        let store = SqliteStore::new(":memory:").await.unwrap();
        let err = store
            .upsert_chunks(Generation(42), &[record("a", "a.txt", 0, "x")])
            .await;
        assert!(err.is_err());
    }
}
