//! Keyed document access over one collection.
//!
//! Records are addressed by their [`NativeKey`] inside a collection and are
//! overwritten wholesale on every write. Secondary lookups are exact-match
//! filter queries that must hit at most one row. Every call is bounded by the
//! store's deadline.

use std::future::IntoFuture;
use std::marker::PhantomData;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::db::Db;
use crate::error::{AuthError, AuthResult};
use crate::types::NativeKey;

/// Default upper bound for a single storage call.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5);

/// Typed view of one document collection.
pub struct DocumentStore<T> {
    db: Db,
    collection: &'static str,
    deadline: Duration,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for DocumentStore<T> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            collection: self.collection,
            deadline: self.deadline,
            _record: PhantomData,
        }
    }
}

impl<T> DocumentStore<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(db: Db, collection: &'static str) -> Self {
        Self {
            db,
            collection,
            deadline: DEFAULT_DEADLINE,
            _record: PhantomData,
        }
    }

    /// Replace the per-call deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn collection(&self) -> &'static str {
        self.collection
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Read one record. `Ok(None)` if the key is not present.
    pub async fn get(&self, key: &NativeKey) -> AuthResult<Option<T>> {
        debug!("GET {}:{}", self.collection, key);
        let id = (self.collection, key.as_str().to_string());
        let record: Option<T> = self.bounded(self.db.select(id)).await??;
        Ok(record)
    }

    /// Create or overwrite the record at `key`.
    pub async fn put(&self, key: &NativeKey, value: &T) -> AuthResult<()> {
        debug!("PUT {}:{}", self.collection, key);
        let id = (self.collection, key.as_str().to_string());
        let _: Option<T> = self
            .bounded(self.db.upsert(id).content(value.clone()))
            .await??;
        Ok(())
    }

    /// Remove the record at `key`, returning what was stored there.
    pub async fn delete(&self, key: &NativeKey) -> AuthResult<Option<T>> {
        debug!("DELETE {}:{}", self.collection, key);
        let id = (self.collection, key.as_str().to_string());
        let removed: Option<T> = self.bounded(self.db.delete(id)).await??;
        Ok(removed)
    }

    /// Exact-match query on one or more fields.
    ///
    /// Returns the single matching record, `Ok(None)` if nothing matches, and
    /// [`AuthError::Inconsistent`] if more than one row matches.
    pub async fn find_one(&self, filters: &[(&'static str, &str)]) -> AuthResult<Option<T>> {
        let clause = filters
            .iter()
            .enumerate()
            .map(|(i, (field, _))| format!("{} = $p{}", field, i))
            .collect::<Vec<_>>()
            .join(" AND ");
        let query = format!("SELECT * FROM type::table($table) WHERE {}", clause);
        debug!("QUERY {} WHERE {}", self.collection, clause);

        let mut builder = self.db.query(query).bind(("table", self.collection));
        for (i, (_, value)) in filters.iter().enumerate() {
            builder = builder.bind((format!("p{}", i), value.to_string()));
        }

        let mut res = self.bounded(builder).await??;
        let mut rows: Vec<T> = res.take(0)?;

        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            count => {
                let filter = filters
                    .iter()
                    .map(|(field, _)| *field)
                    .collect::<Vec<_>>()
                    .join("+");
                warn!(
                    "{} rows in {} match an exact lookup on {}",
                    count, self.collection, filter
                );
                Err(AuthError::Inconsistent {
                    collection: self.collection,
                    filter,
                    count,
                })
            }
        }
    }

    async fn bounded<F, R>(&self, fut: F) -> AuthResult<R>
    where
        F: IntoFuture<Output = R>,
    {
        tokio::time::timeout(self.deadline, fut)
            .await
            .map_err(|_| AuthError::DeadlineExceeded(self.deadline))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DatabaseConfig, create_connection, ensure_schema};
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        realm: String,
        owner: String,
        body: String,
    }

    fn note(realm: &str, owner: &str, body: &str) -> Note {
        Note {
            realm: realm.to_string(),
            owner: owner.to_string(),
            body: body.to_string(),
        }
    }

    async fn setup_store() -> DocumentStore<Note> {
        let db = create_connection(DatabaseConfig::memory()).await.unwrap();
        ensure_schema(&db).await.unwrap();
        DocumentStore::new(db, "NOTES")
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = setup_store().await;
        let got = store.get(&NativeKey::compose("r", "nope")).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn test_put_get_overwrite_delete() {
        let store = setup_store().await;
        let key = NativeKey::compose("r", "n1");

        store.put(&key, &note("r", "alice", "first")).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(note("r", "alice", "first")));

        store.put(&key, &note("r", "alice", "second")).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap().unwrap().body, "second");

        let removed = store.delete(&key).await.unwrap();
        assert_eq!(removed.unwrap().body, "second");
        assert!(store.get(&key).await.unwrap().is_none());
        assert!(store.delete(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_one() {
        let store = setup_store().await;
        store
            .put(&NativeKey::compose("r", "n1"), &note("r", "alice", "a"))
            .await
            .unwrap();
        store
            .put(&NativeKey::compose("r", "n2"), &note("r", "bob", "b"))
            .await
            .unwrap();

        let found = store
            .find_one(&[("realm", "r"), ("owner", "bob")])
            .await
            .unwrap();
        assert_eq!(found.unwrap().body, "b");

        let missing = store
            .find_one(&[("realm", "other"), ("owner", "bob")])
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_find_one_rejects_duplicates() {
        let store = setup_store().await;
        store
            .put(&NativeKey::compose("r", "n1"), &note("r", "alice", "a"))
            .await
            .unwrap();
        store
            .put(&NativeKey::compose("r", "n2"), &note("r", "alice", "b"))
            .await
            .unwrap();

        let err = store.find_one(&[("owner", "alice")]).await.unwrap_err();
        assert!(matches!(err, AuthError::Inconsistent { count: 2, .. }));
    }
}
