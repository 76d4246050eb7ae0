//! Optimistic concurrency tests for version-stamped updates.

mod common;

use bindery_metadata::MetadataError;
use bindery_metadata::repos::{BookRepo, UserRepo};
use common::{book_row, test_store, user_row};
use uuid::Uuid;

#[tokio::test]
async fn test_stale_version_update_conflicts() {
    let (_temp, store) = test_store().await;
    let user = user_row("alice@example.com", true);
    store.create_user(&user).await.unwrap();

    let book = book_row(user.user_id);
    store.create_book(&book).await.unwrap();

    // First writer read version 0 and wins; stored version becomes 1.
    let mut first = store.get_book(book.book_id).await.unwrap().unwrap();
    assert_eq!(first.version, 0);
    first.title = "Updated title".to_string();
    let new_version = store.update_book(&first).await.unwrap();
    assert_eq!(new_version, 1);

    // Second writer still holds version 0 and must lose the race.
    let mut stale = book.clone();
    stale.title = "Competing title".to_string();
    let err = store.update_book(&stale).await.unwrap_err();
    assert!(matches!(err, MetadataError::EditConflict(_)), "got {err}");

    // The conflicting write changed nothing.
    let current = store.get_book(book.book_id).await.unwrap().unwrap();
    assert_eq!(current.title, "Updated title");
    assert_eq!(current.version, 1);
}

#[tokio::test]
async fn test_refetch_then_retry_succeeds() {
    let (_temp, store) = test_store().await;
    let user = user_row("bob@example.com", true);
    store.create_user(&user).await.unwrap();

    let book = book_row(user.user_id);
    store.create_book(&book).await.unwrap();

    let mut winner = book.clone();
    winner.pages = 400;
    assert_eq!(store.update_book(&winner).await.unwrap(), 1);

    let mut loser = book.clone();
    loser.pages = 500;
    assert!(store.update_book(&loser).await.is_err());

    // Correct retry: re-fetch, reapply, update with the fresh version.
    let mut refetched = store.get_book(book.book_id).await.unwrap().unwrap();
    refetched.pages = 500;
    assert_eq!(store.update_book(&refetched).await.unwrap(), 2);
}

#[tokio::test]
async fn test_concurrent_updates_exactly_one_wins() {
    let (_temp, store) = test_store().await;
    let user = user_row("carol@example.com", true);
    store.create_user(&user).await.unwrap();

    let book = book_row(user.user_id);
    store.create_book(&book).await.unwrap();

    let mut left = book.clone();
    left.title = "Left".to_string();
    let mut right = book.clone();
    right.title = "Right".to_string();

    let (left_result, right_result) =
        tokio::join!(store.update_book(&left), store.update_book(&right));

    let successes = [&left_result, &right_result]
        .iter()
        .filter(|r| r.is_ok())
        .count();
    assert_eq!(successes, 1, "exactly one concurrent writer may win");

    let loser = if left_result.is_ok() {
        right_result
    } else {
        left_result
    };
    assert!(matches!(loser, Err(MetadataError::EditConflict(_))));

    let current = store.get_book(book.book_id).await.unwrap().unwrap();
    assert_eq!(current.version, 1);
}

#[tokio::test]
async fn test_update_of_missing_row_is_a_conflict() {
    let (_temp, store) = test_store().await;
    let user = user_row("dave@example.com", true);
    store.create_user(&user).await.unwrap();

    let mut phantom = book_row(user.user_id);
    phantom.book_id = Uuid::new_v4();
    let err = store.update_book(&phantom).await.unwrap_err();
    assert!(matches!(err, MetadataError::EditConflict(_)));
}

#[tokio::test]
async fn test_delete_of_missing_row_is_not_found() {
    let (_temp, store) = test_store().await;
    let err = store.delete_book(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, MetadataError::NotFound(_)));
}

#[tokio::test]
async fn test_user_activation_via_cas() {
    let (_temp, store) = test_store().await;
    let user = user_row("erin@example.com", false);
    store.create_user(&user).await.unwrap();

    let mut activated = user.clone();
    activated.activated = true;
    assert_eq!(store.update_user(&activated).await.unwrap(), 1);

    let stored = store.get_user(user.user_id).await.unwrap().unwrap();
    assert!(stored.activated);
    assert_eq!(stored.version, 1);

    // A second activation attempt holding the original version conflicts.
    let err = store.update_user(&activated).await.unwrap_err();
    assert!(matches!(err, MetadataError::EditConflict(_)));
}
