//! End-to-end runs of the token exchange protocol against an in-memory
//! document store.

use std::sync::Arc;

use realm_auth::{
    Access, AccountStatus, AuthError, AuthOptions, AuthorizationRequest, ConfirmOutcome,
    DatabaseConfig, ExchangeOutcome, LoginOutcome, LogoutOutcome, ManualClock,
    RecordingNotifier, StatusCode, TokenExchange, create_connection, ensure_schema,
};
use tokio::task::JoinSet;

const NOW: i64 = 1_700_000_000;

struct Fixture {
    exchange: Arc<TokenExchange>,
    notifier: Arc<RecordingNotifier>,
    clock: Arc<ManualClock>,
}

async fn fixture(options: AuthOptions) -> Fixture {
    let db = create_connection(DatabaseConfig::memory()).await.unwrap();
    ensure_schema(&db).await.unwrap();

    let notifier = Arc::new(RecordingNotifier::new());
    let clock = Arc::new(ManualClock::new(NOW));
    let exchange = TokenExchange::from_db(db, options, notifier.clone(), clock.clone()).unwrap();

    Fixture {
        exchange: Arc::new(exchange),
        notifier,
        clock,
    }
}

#[tokio::test]
async fn confirm_then_exchange_activates_account() {
    let f = fixture(AuthOptions::default()).await;

    let LoginOutcome::ChallengeSent(created) = f.exchange.login_request("t", "u").await.unwrap()
    else {
        panic!("expected a new account");
    };
    assert_eq!(created.status, AccountStatus::Unconfirmed);

    let confirmed = f.exchange.confirm_challenge(&created.token).await.unwrap();
    assert_eq!(confirmed.status(), StatusCode::NoContent);

    // Confirmed and logged out: the next login request hands out a temporary token.
    let outcome = f.exchange.login_request("t", "u").await.unwrap();
    assert_eq!(outcome.status(), StatusCode::NoContent);
    let temp = f.notifier.last_token("u").await.unwrap();

    let req = AuthorizationRequest::new("t", "u")
        .with_token(temp)
        .with_scope("api:read");
    let outcome = f.exchange.exchange_token(&req, "192.0.2.1").await.unwrap();
    assert_eq!(outcome.status(), StatusCode::Ok);
    let ExchangeOutcome::Issued(auth) = outcome else {
        panic!("expected an authorization");
    };
    assert_eq!(auth.scope, "api:read");
    assert!(!auth.revoked);
    assert_eq!(auth.client_id, created.client_id);

    let account = f
        .exchange
        .accounts()
        .lookup_account("t", created.client_id.as_str())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.status, AccountStatus::Active);
    assert!(account.token.is_empty());
    assert_eq!(account.login_from, "192.0.2.1");

    assert!(
        f.exchange
            .check_authorization(&auth.token, "api:read")
            .await
            .unwrap()
            .is_granted()
    );
    assert_eq!(
        f.exchange
            .check_authorization(&auth.token, "api:write")
            .await
            .unwrap(),
        Access::Denied
    );
}

#[tokio::test]
async fn full_session_lifecycle() {
    let f = fixture(AuthOptions::default()).await;

    f.exchange.login_request("acme", "bot-7").await.unwrap();
    let challenge = f.notifier.last_challenge("bot-7").await.unwrap();

    let ConfirmOutcome::TokenSent { account, location } =
        f.exchange.confirm_login(&challenge).await.unwrap()
    else {
        panic!("expected a redirect");
    };
    assert_eq!(location, "http://localhost:8080/confirmed");

    let temp = f.notifier.last_token("bot-7").await.unwrap();
    let req = AuthorizationRequest::new("acme", "bot-7")
        .with_token(temp)
        .with_scope(f.exchange.options().scope.clone());
    let ExchangeOutcome::Issued(first) = f.exchange.exchange_token(&req, "").await.unwrap() else {
        panic!("expected an authorization");
    };

    let header = format!("Bearer {}", first.token);
    assert!(f.exchange.check_bearer(&header, "api:write").await.unwrap().is_granted());

    let client_id = account.client_id.as_str();
    assert_eq!(
        f.exchange.logout("acme", client_id).await.unwrap(),
        LogoutOutcome::LoggedOut
    );
    assert_eq!(
        f.exchange.check_bearer(&header, "api:write").await.unwrap(),
        Access::Denied
    );

    // Log in again: new temporary token, rotated bearer token.
    f.exchange.login_request("acme", "bot-7").await.unwrap();
    let temp = f.notifier.last_token("bot-7").await.unwrap();
    let req = AuthorizationRequest::new("acme", "bot-7").with_token(temp);
    let ExchangeOutcome::Issued(second) = f.exchange.exchange_token(&req, "").await.unwrap() else {
        panic!("expected an authorization");
    };
    assert_ne!(second.token, first.token);
    assert_eq!(second.created, first.created);
    assert!(f.exchange.check_authorization(&second.token, "api:read").await.unwrap().is_granted());

    // Admin removal of the authorization.
    let removed = f
        .exchange
        .authorizations()
        .delete_authorization("acme", client_id)
        .await
        .unwrap();
    assert_eq!(removed.token, second.token);
    assert_eq!(
        f.exchange.check_authorization(&second.token, "api:read").await.unwrap(),
        Access::Denied
    );

    let err = f
        .exchange
        .authorizations()
        .delete_authorization("acme", client_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NoSuchEntity));
    assert_eq!(err.status(), StatusCode::NotFound);
}

#[tokio::test]
async fn realms_are_isolated() {
    let f = fixture(AuthOptions::default()).await;

    f.exchange.login_request("a", "same-user").await.unwrap();
    let a_challenge = f.notifier.last_challenge("same-user").await.unwrap();
    f.exchange.login_request("b", "same-user").await.unwrap();
    let b_challenge = f.notifier.last_challenge("same-user").await.unwrap();
    assert_ne!(a_challenge, b_challenge);

    f.exchange.confirm_challenge(&a_challenge).await.unwrap();

    let a = f
        .exchange
        .accounts()
        .find_account_by_user_id("a", "same-user")
        .await
        .unwrap()
        .unwrap();
    let b = f
        .exchange
        .accounts()
        .find_account_by_user_id("b", "same-user")
        .await
        .unwrap()
        .unwrap();
    assert!(a.is_confirmed());
    assert!(!b.is_confirmed());
    assert_ne!(a.key(), b.key());
}

#[tokio::test]
async fn short_challenge_lifetime_from_options() {
    let options = AuthOptions {
        authentication_expiration: 1,
        ..Default::default()
    };
    let f = fixture(options).await;

    f.exchange.login_request("t", "u").await.unwrap();
    let challenge = f.notifier.last_challenge("u").await.unwrap();

    f.clock.advance(61);
    assert_eq!(
        f.exchange.confirm_login(&challenge).await.unwrap(),
        ConfirmOutcome::Expired
    );

    // A new login request renews the challenge.
    f.exchange.login_request("t", "u").await.unwrap();
    let renewed = f.notifier.last_challenge("u").await.unwrap();
    assert_eq!(
        f.exchange.confirm_challenge(&renewed).await.unwrap().status(),
        StatusCode::NoContent
    );
}

#[tokio::test]
async fn concurrent_logins_create_one_account() {
    let f = fixture(AuthOptions::default()).await;

    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let exchange = f.exchange.clone();
        tasks.spawn(async move { exchange.login_request("t", "racer").await });
    }

    let mut succeeded = 0;
    while let Some(res) = tasks.join_next().await {
        if res.unwrap().is_ok() {
            succeeded += 1;
        }
    }
    assert!(succeeded >= 1);

    let account = f
        .exchange
        .accounts()
        .find_account_by_user_id("t", "racer")
        .await
        .unwrap();
    assert!(account.is_some());
}
