//! Ownership / sharing checks applied identically across lists and items.
//!
//! Denials deliberately cover nonexistent resources too: a caller probing a
//! foreign or absent list id gets the same 403 either way, so list ids leak
//! nothing about what exists.

use sqlx::SqlitePool;

use crate::db::{ItemRepository, ListRepository, ShareRepository};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

pub struct AccessControl;

impl AccessControl {
    /// Writes require ownership; reads accept the owner or a share grantee.
    pub async fn authorize_list(
        pool: &SqlitePool,
        user_id: &str,
        list_id: &str,
        mode: AccessMode,
    ) -> AppResult<()> {
        let owner = match ListRepository::find_owner(pool, list_id).await? {
            Some(owner) => owner,
            None => return Err(AppError::Forbidden),
        };

        if owner == user_id {
            return Ok(());
        }

        if mode == AccessMode::Read && ShareRepository::exists(pool, list_id, user_id).await? {
            return Ok(());
        }

        Err(AppError::Forbidden)
    }

    /// Items are authorized through their parent list, never independently.
    /// Returns the parent list id for callers that need it.
    pub async fn authorize_item(
        pool: &SqlitePool,
        user_id: &str,
        item_id: &str,
        mode: AccessMode,
    ) -> AppResult<String> {
        let list_id = ItemRepository::find_list_id(pool, item_id)
            .await?
            .ok_or(AppError::Forbidden)?;

        Self::authorize_list(pool, user_id, &list_id, mode).await?;
        Ok(list_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_pool, UserRepository};

    async fn seed(pool: &SqlitePool) -> (String, String, String, String) {
        let alice = UserRepository::create(pool, "alice", "$2b$04$x").await.unwrap();
        let bob = UserRepository::create(pool, "bob", "$2b$04$y").await.unwrap();
        let list = ListRepository::create(pool, &alice.id, "Movies").await.unwrap();
        let item = ItemRepository::create(pool, &list.id, "Alien", "movie", "", None)
            .await
            .unwrap();
        (alice.id, bob.id, list.id, item.id)
    }

    #[tokio::test]
    async fn owner_has_full_access() {
        let pool = test_pool().await;
        let (alice, _, list, item) = seed(&pool).await;

        AccessControl::authorize_list(&pool, &alice, &list, AccessMode::Write)
            .await
            .unwrap();
        AccessControl::authorize_list(&pool, &alice, &list, AccessMode::Read)
            .await
            .unwrap();
        let parent = AccessControl::authorize_item(&pool, &alice, &item, AccessMode::Write)
            .await
            .unwrap();
        assert_eq!(parent, list);
    }

    #[tokio::test]
    async fn stranger_denied() {
        let pool = test_pool().await;
        let (_, bob, list, item) = seed(&pool).await;

        let err = AccessControl::authorize_list(&pool, &bob, &list, AccessMode::Write)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
        let err = AccessControl::authorize_list(&pool, &bob, &list, AccessMode::Read)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
        let err = AccessControl::authorize_item(&pool, &bob, &item, AccessMode::Read)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[tokio::test]
    async fn grantee_reads_but_never_writes() {
        let pool = test_pool().await;
        let (alice, bob, list, item) = seed(&pool).await;

        ShareRepository::create(&pool, &list, &alice, &bob).await.unwrap();

        AccessControl::authorize_list(&pool, &bob, &list, AccessMode::Read)
            .await
            .unwrap();
        AccessControl::authorize_item(&pool, &bob, &item, AccessMode::Read)
            .await
            .unwrap();

        let err = AccessControl::authorize_list(&pool, &bob, &list, AccessMode::Write)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
        let err = AccessControl::authorize_item(&pool, &bob, &item, AccessMode::Write)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[tokio::test]
    async fn absent_resources_deny_like_foreign_ones() {
        let pool = test_pool().await;
        let (alice, ..) = seed(&pool).await;

        let err = AccessControl::authorize_list(&pool, &alice, "no-such-list", AccessMode::Read)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
        let err = AccessControl::authorize_item(&pool, &alice, "no-such-item", AccessMode::Read)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[tokio::test]
    async fn revoked_grant_denies_reads_again() {
        let pool = test_pool().await;
        let (alice, bob, list, _) = seed(&pool).await;

        ShareRepository::create(&pool, &list, &alice, &bob).await.unwrap();
        ShareRepository::delete(&pool, &list, &bob).await.unwrap();

        let err = AccessControl::authorize_list(&pool, &bob, &list, AccessMode::Read)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }
}
