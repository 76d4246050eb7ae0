//! Token persistence and validation tests.

mod common;

use bindery_core::token::hash_plaintext;
use bindery_core::{Token, TokenScope};
use bindery_metadata::models::TokenRow;
use bindery_metadata::repos::{TokenRepo, UserRepo};
use common::{test_store, user_row};
use time::{Duration, OffsetDateTime};

#[tokio::test]
async fn test_token_valid_within_expiry_window() {
    let (_temp, store) = test_store().await;
    let user = user_row("alice@example.com", true);
    store.create_user(&user).await.unwrap();

    let token = Token::generate(user.user_id, Duration::hours(1), TokenScope::Activation);
    store.insert_token(&TokenRow::from_token(&token)).await.unwrap();

    let now = OffsetDateTime::now_utc();
    let resolved = store
        .user_for_token(TokenScope::Activation, &token.hash, now)
        .await
        .unwrap();
    assert_eq!(resolved.map(|u| u.user_id), Some(user.user_id));

    // Past the expiry instant the same token reads as absent.
    let later = now + Duration::hours(2);
    let resolved = store
        .user_for_token(TokenScope::Activation, &token.hash, later)
        .await
        .unwrap();
    assert!(resolved.is_none());
}

#[tokio::test]
async fn test_token_scope_mismatch_reads_as_absent() {
    let (_temp, store) = test_store().await;
    let user = user_row("bob@example.com", true);
    store.create_user(&user).await.unwrap();

    let token = Token::generate(user.user_id, Duration::hours(1), TokenScope::PasswordReset);
    store.insert_token(&TokenRow::from_token(&token)).await.unwrap();

    let now = OffsetDateTime::now_utc();
    // Wrong scope is indistinguishable from wrong or expired token.
    for scope in [TokenScope::Activation, TokenScope::Authentication] {
        let resolved = store.user_for_token(scope, &token.hash, now).await.unwrap();
        assert!(resolved.is_none(), "scope {scope} must not validate");
    }
}

#[tokio::test]
async fn test_plaintext_is_never_stored() {
    let (_temp, store) = test_store().await;
    let user = user_row("carol@example.com", true);
    store.create_user(&user).await.unwrap();

    let token = Token::generate(user.user_id, Duration::hours(1), TokenScope::Authentication);
    store.insert_token(&TokenRow::from_token(&token)).await.unwrap();

    let now = OffsetDateTime::now_utc();

    // Looking up by the plaintext itself must fail; only the recomputed
    // digest matches.
    let by_plaintext = store
        .user_for_token(TokenScope::Authentication, &token.plaintext, now)
        .await
        .unwrap();
    assert!(by_plaintext.is_none());

    let by_hash = store
        .user_for_token(
            TokenScope::Authentication,
            &hash_plaintext(&token.plaintext),
            now,
        )
        .await
        .unwrap();
    assert!(by_hash.is_some());
}

#[tokio::test]
async fn test_revoke_all_is_scope_and_user_bounded() {
    let (_temp, store) = test_store().await;
    let alice = user_row("alice@example.com", true);
    let bob = user_row("bob@example.com", true);
    store.create_user(&alice).await.unwrap();
    store.create_user(&bob).await.unwrap();

    let alice_activation =
        Token::generate(alice.user_id, Duration::hours(1), TokenScope::Activation);
    let alice_reset =
        Token::generate(alice.user_id, Duration::hours(1), TokenScope::PasswordReset);
    let bob_activation = Token::generate(bob.user_id, Duration::hours(1), TokenScope::Activation);
    for token in [&alice_activation, &alice_reset, &bob_activation] {
        store.insert_token(&TokenRow::from_token(token)).await.unwrap();
    }

    store
        .delete_tokens_for_user(TokenScope::Activation, alice.user_id)
        .await
        .unwrap();

    let now = OffsetDateTime::now_utc();
    assert!(
        store
            .user_for_token(TokenScope::Activation, &alice_activation.hash, now)
            .await
            .unwrap()
            .is_none(),
        "revoked token must no longer validate"
    );
    // Other scopes and other users are unaffected.
    assert!(
        store
            .user_for_token(TokenScope::PasswordReset, &alice_reset.hash, now)
            .await
            .unwrap()
            .is_some()
    );
    assert!(
        store
            .user_for_token(TokenScope::Activation, &bob_activation.hash, now)
            .await
            .unwrap()
            .is_some()
    );

    assert_eq!(
        store
            .count_tokens_for_user(TokenScope::Activation, alice.user_id)
            .await
            .unwrap(),
        0
    );

    // Idempotent: revoking an empty scope is not an error.
    store
        .delete_tokens_for_user(TokenScope::Activation, alice.user_id)
        .await
        .unwrap();
}
