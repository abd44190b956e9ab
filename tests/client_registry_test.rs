// Client registry against the in-memory Authorization Server
use std::sync::Arc;

use consentrs::testing::{FakeAuthorizationServer, TestFixtures};
use consentrs::{ClientRegistration, ProtocolErrorKind};

#[tokio::test]
async fn test_create_then_read_round_trip() {
    let server = Arc::new(FakeAuthorizationServer::new());
    let mediator = server.mediator();

    let mut registration = TestFixtures::client_registration();
    registration.client_id = None;
    registration.client_secret = None;

    let created = mediator.create_client(&registration).await.unwrap();
    let client_id = created.client_id.clone().unwrap();
    assert!(created.client_secret.is_some());
    assert!(created.same_settings(&registration));

    let fetched = mediator.get_client(&client_id).await.unwrap();
    assert_eq!(fetched.client_id.as_deref(), Some(client_id.as_str()));
    assert!(fetched.client_secret.is_none());
    assert!(fetched.same_settings(&registration));
    assert_eq!(
        fetched.scopes().collect::<Vec<_>>(),
        vec!["openid", "offline", "profile"]
    );
}

#[tokio::test]
async fn test_create_with_chosen_id() {
    let server = Arc::new(FakeAuthorizationServer::new());
    let mediator = server.mediator();

    let created = mediator
        .create_client(&TestFixtures::client_registration())
        .await
        .unwrap();
    assert_eq!(created.client_id.as_deref(), Some("test-app"));
    assert_eq!(created.client_secret.as_deref(), Some("test-app-secret"));

    // Same id again is a conflict, which the decoder does not map
    let err = mediator
        .create_client(&TestFixtures::client_registration())
        .await
        .unwrap_err();
    assert_eq!(err.protocol_kind(), Some(ProtocolErrorKind::Unhandled));
}

#[tokio::test]
async fn test_invalid_registration_is_bad_request() {
    let server = Arc::new(FakeAuthorizationServer::new());
    let mut registration = ClientRegistration::new("Broken");
    registration.redirect_uris = vec!["not a url".to_string()];

    let err = server
        .mediator()
        .create_client(&registration)
        .await
        .unwrap_err();
    assert_eq!(err.protocol_kind(), Some(ProtocolErrorKind::BadRequest));
    assert!(err.to_string().contains("invalid_redirect_uri"));
}

#[tokio::test]
async fn test_update_is_full_replace() {
    let server = Arc::new(FakeAuthorizationServer::new());
    let mediator = server.mediator();
    let created = mediator
        .create_client(&TestFixtures::client_registration())
        .await
        .unwrap();
    let client_id = created.client_id.clone().unwrap();

    // Only the name is set, so every other field is cleared
    let renamed = ClientRegistration::new("Renamed Application");
    let updated = mediator.update_client(&client_id, &renamed).await.unwrap();
    assert_eq!(updated.client_name, "Renamed Application");
    assert!(updated.redirect_uris.is_empty());
    assert!(updated.grant_types.is_empty());

    let fetched = mediator.get_client(&client_id).await.unwrap();
    assert!(fetched.redirect_uris.is_empty());
    assert_eq!(fetched.scope, "");
}

#[tokio::test]
async fn test_update_keeping_fields_resends_them() {
    let server = Arc::new(FakeAuthorizationServer::new());
    let mediator = server.mediator();
    let created = mediator
        .create_client(&TestFixtures::client_registration())
        .await
        .unwrap();
    let client_id = created.client_id.clone().unwrap();

    let mut current = mediator.get_client(&client_id).await.unwrap();
    current
        .post_logout_redirect_uris
        .push("https://app.example.com/bye".to_string());
    mediator.update_client(&client_id, &current).await.unwrap();

    let fetched = mediator.get_client(&client_id).await.unwrap();
    assert_eq!(fetched.redirect_uris, created.redirect_uris);
    assert_eq!(fetched.post_logout_redirect_uris, vec!["https://app.example.com/bye"]);
}

#[tokio::test]
async fn test_delete_then_not_found() {
    let server = Arc::new(FakeAuthorizationServer::new());
    let mediator = server.mediator();
    let created = mediator
        .create_client(&TestFixtures::client_registration())
        .await
        .unwrap();
    let client_id = created.client_id.unwrap();

    mediator.delete_client(&client_id).await.unwrap();

    assert!(mediator.get_client(&client_id).await.unwrap_err().is_not_found());
    assert!(mediator.delete_client(&client_id).await.unwrap_err().is_not_found());
    let update = mediator
        .update_client(&client_id, &ClientRegistration::new("Ghost"))
        .await;
    assert!(update.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_client_id_with_reserved_characters() {
    let server = Arc::new(FakeAuthorizationServer::new());
    let mediator = server.mediator();
    let mut registration = ClientRegistration::new("Odd");
    registration.client_id = Some("team a/app?1".to_string());

    mediator.create_client(&registration).await.unwrap();
    let fetched = mediator.get_client("team a/app?1").await.unwrap();
    assert_eq!(fetched.client_name, "Odd");

    let sent = server.requests();
    assert!(sent.last().unwrap().url.ends_with("/clients/team%20a%2Fapp%3F1"));
}
