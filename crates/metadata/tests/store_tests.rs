//! Entity CRUD and owner-resolution tests.

mod common;

use bindery_core::ResourceKind;
use bindery_metadata::MetadataError;
use bindery_metadata::repos::{
    BookRepo, BooklistRepo, CommentRepo, OwnershipRepo, RequestRepo, ReviewRepo, UserRepo,
};
use common::{
    booklist_row, book_row, comment_row, request_row, review_row, test_store, user_row,
};
use uuid::Uuid;

#[tokio::test]
async fn test_user_round_trip_and_duplicate_email() {
    let (_temp, store) = test_store().await;
    let user = user_row("alice@example.com", false);
    store.create_user(&user).await.unwrap();

    let by_id = store.get_user(user.user_id).await.unwrap().unwrap();
    assert_eq!(by_id.email, "alice@example.com");
    assert!(!by_id.activated);
    assert_eq!(by_id.version, 0);

    let by_email = store
        .get_user_by_email("alice@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_email.user_id, user.user_id);

    let mut duplicate = user_row("alice@example.com", false);
    duplicate.user_id = Uuid::new_v4();
    let err = store.create_user(&duplicate).await.unwrap_err();
    assert!(matches!(err, MetadataError::AlreadyExists(_)), "got {err}");
}

#[tokio::test]
async fn test_owner_of_every_ownable_kind() {
    let (_temp, store) = test_store().await;
    let owner = user_row("owner@example.com", true);
    store.create_user(&owner).await.unwrap();

    let book = book_row(owner.user_id);
    store.create_book(&book).await.unwrap();
    let review = review_row(book.book_id, owner.user_id);
    store.create_review(&review).await.unwrap();
    let comment = comment_row(review.review_id, owner.user_id);
    store.create_comment(&comment).await.unwrap();
    let booklist = booklist_row(owner.user_id);
    store.create_booklist(&booklist).await.unwrap();

    let cases = [
        (ResourceKind::Book, book.book_id),
        (ResourceKind::Review, review.review_id),
        (ResourceKind::Comment, comment.comment_id),
        (ResourceKind::Booklist, booklist.booklist_id),
    ];
    for (kind, id) in cases {
        let resolved = store.owner_of(kind, id).await.unwrap();
        assert_eq!(resolved, Some(owner.user_id), "kind {kind}");
        // A random ID of the same kind resolves to nothing.
        assert_eq!(store.owner_of(kind, Uuid::new_v4()).await.unwrap(), None);
    }
}

#[tokio::test]
async fn test_book_list_and_delete() {
    let (_temp, store) = test_store().await;
    let owner = user_row("owner@example.com", true);
    store.create_user(&owner).await.unwrap();

    let first = book_row(owner.user_id);
    let second = book_row(owner.user_id);
    store.create_book(&first).await.unwrap();
    store.create_book(&second).await.unwrap();

    assert_eq!(store.list_books().await.unwrap().len(), 2);

    store.delete_book(first.book_id).await.unwrap();
    assert_eq!(store.list_books().await.unwrap().len(), 1);
    assert!(store.get_book(first.book_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_review_and_comment_round_trip() {
    let (_temp, store) = test_store().await;
    let owner = user_row("reader@example.com", true);
    store.create_user(&owner).await.unwrap();
    let book = book_row(owner.user_id);
    store.create_book(&book).await.unwrap();

    let mut review = review_row(book.book_id, owner.user_id);
    store.create_review(&review).await.unwrap();
    review.rating = 3;
    assert_eq!(store.update_review(&review).await.unwrap(), 1);
    let stored = store.get_review(review.review_id).await.unwrap().unwrap();
    assert_eq!(stored.rating, 3);
    assert_eq!(stored.version, 1);

    let mut comment = comment_row(review.review_id, owner.user_id);
    store.create_comment(&comment).await.unwrap();
    comment.body = "Edited.".to_string();
    assert_eq!(store.update_comment(&comment).await.unwrap(), 1);

    store.delete_comment(comment.comment_id).await.unwrap();
    assert!(
        store
            .get_comment(comment.comment_id)
            .await
            .unwrap()
            .is_none()
    );

    store.delete_review(review.review_id).await.unwrap();
    assert!(matches!(
        store.delete_review(review.review_id).await.unwrap_err(),
        MetadataError::NotFound(_)
    ));
}

#[tokio::test]
async fn test_booklist_and_request_round_trip() {
    let (_temp, store) = test_store().await;
    let owner = user_row("collector@example.com", true);
    store.create_user(&owner).await.unwrap();

    let mut booklist = booklist_row(owner.user_id);
    store.create_booklist(&booklist).await.unwrap();
    booklist.is_public = true;
    assert_eq!(store.update_booklist(&booklist).await.unwrap(), 1);
    let stored = store
        .get_booklist(booklist.booklist_id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_public);

    let mut request = request_row(owner.user_id);
    store.create_request(&request).await.unwrap();
    request.status = "approved".to_string();
    assert_eq!(store.update_request(&request).await.unwrap(), 1);
    let stored = store.get_request(request.request_id).await.unwrap().unwrap();
    assert_eq!(stored.status, "approved");
    assert_eq!(stored.version, 1);
}
