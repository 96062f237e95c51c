mod common;

use claroz::transport::Method;
use claroz::{ClientError, FederatedIdentity};
use common::{app, at, federated_post, local_post, profile, ScriptedTransport};
use serde_json::json;

#[tokio::test]
async fn handle_is_normalized_before_it_is_sent() {
    let transport = ScriptedTransport::new();
    transport.reply(
        Method::Post,
        "/federation/resolve",
        200,
        profile("did:plc:dee", "dee.bsky.social"),
    );
    let (app, _store) = app(&transport, Some("token"));

    let identity = app.resolver.resolve("  @Dee.Bsky.Social ").await.unwrap();
    assert_eq!(identity.did, "did:plc:dee");
    assert_eq!(identity.handle, "dee.bsky.social");
    assert_eq!(identity.display_name.as_deref(), Some("Remote Person"));

    let sent = &transport.calls(Method::Post, "/federation/resolve")[0];
    assert_eq!(sent.body.as_ref().unwrap()["handle"], "dee.bsky.social");
}

#[tokio::test]
async fn malformed_handles_fail_without_a_request() {
    let transport = ScriptedTransport::new();
    let (app, _store) = app(&transport, Some("token"));

    for handle in ["", "@x", "has space.social"] {
        let err = app.resolver.resolve(handle).await.unwrap_err();
        assert!(matches!(err, ClientError::Resolution { .. }), "{handle:?}: {err:?}");
    }
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn server_failures_and_partial_profiles_become_resolution_errors() {
    let transport = ScriptedTransport::new();
    transport
        .reply(Method::Post, "/federation/resolve", 404, json!({ "error": "not found" }))
        .reply(
            Method::Post,
            "/federation/resolve",
            200,
            json!({ "handle": "dee.bsky.social" }),
        );
    let (app, _store) = app(&transport, Some("token"));

    for _ in 0..2 {
        match app.resolver.resolve("dee.bsky.social").await.unwrap_err() {
            ClientError::Resolution { handle, .. } => assert_eq!(handle, "dee.bsky.social"),
            other => panic!("expected resolution error, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn expired_session_is_not_reported_as_a_bad_handle() {
    let transport = ScriptedTransport::new();
    transport
        .reply(Method::Post, "/federation/resolve", 401, json!({}))
        .reply(Method::Post, "/auth/refresh", 401, json!({}));
    let (app, _store) = app(&transport, Some("stale"));

    let err = app.resolver.resolve("dee.bsky.social").await.unwrap_err();
    assert_eq!(err, ClientError::AuthExpired);
}

#[tokio::test]
async fn following_a_handle_merges_its_posts_after_resolution() {
    let transport = ScriptedTransport::new();
    transport
        .reply(Method::Get, "/posts", 200, json!([local_post("A", &at(10, 0))]))
        .reply(Method::Get, "/federation/posts", 200, json!([]))
        .reply(
            Method::Post,
            "/federation/resolve",
            200,
            profile("did:plc:dee", "dee.bsky.social"),
        )
        .reply(
            Method::Get,
            "/federation/posts/did%3Aplc%3Adee",
            200,
            json!([federated_post("D1", "did:plc:dee", &at(12, 0))]),
        );
    let (app, _store) = app(&transport, Some("token"));
    app.feed.load_initial().await.unwrap();

    let (identity, snapshot) = app.resolver.follow_handle("dee.bsky.social").await.unwrap();
    assert_eq!(identity.did, "did:plc:dee");
    assert_eq!(snapshot.ids(), vec!["D1", "A"]);

    let order: Vec<_> = transport
        .requests()
        .iter()
        .map(|r| r.path.clone())
        .skip(2)
        .collect();
    assert_eq!(
        order,
        vec!["/federation/resolve", "/federation/posts/did%3Aplc%3Adee"]
    );
}

#[tokio::test]
async fn failed_resolution_leaves_the_feed_alone() {
    let transport = ScriptedTransport::new();
    transport
        .reply(Method::Get, "/posts", 200, json!([local_post("A", &at(10, 0))]))
        .reply(Method::Get, "/federation/posts", 200, json!([]))
        .reply(Method::Post, "/federation/resolve", 502, json!({ "error": "relay down" }));
    let (app, _store) = app(&transport, Some("token"));
    let before = app.feed.load_initial().await.unwrap();

    assert!(app.resolver.follow_handle("dee.bsky.social").await.is_err());
    assert_eq!(app.feed.snapshot(), before);
    assert!(app.feed.tracked_identities().is_empty());
}

#[tokio::test]
async fn sync_patches_known_posts_and_adds_new_ones() {
    let did = "did:plc:dee";
    let path = "/federation/posts/did%3Aplc%3Adee";
    let transport = ScriptedTransport::new();
    transport
        .reply(Method::Get, "/posts", 200, json!([]))
        .reply(
            Method::Get,
            "/federation/posts",
            200,
            json!([federated_post("D1", did, &at(12, 0))]),
        );
    let (app, _store) = app(&transport, Some("token"));
    app.feed.load_initial().await.unwrap();

    let mut d1 = federated_post("D1", did, &at(12, 0));
    d1["content"] = json!("edited remotely");
    transport
        .reply(Method::Post, "/federation/sync", 200, profile(did, "dee.bsky.social"))
        .reply(
            Method::Get,
            "/federation/profile/did%3Aplc%3Adee",
            200,
            profile(did, "dee.bsky.social"),
        )
        .reply(
            Method::Get,
            path,
            200,
            json!([d1, federated_post("D2", did, &at(13, 0))]),
        );

    let known = FederatedIdentity {
        did: did.into(),
        handle: "dee.bsky.social".into(),
        display_name: None,
        avatar: None,
    };
    let (refreshed, snapshot) = app.resolver.sync_identity(&known).await.unwrap();
    assert_eq!(refreshed.display_name.as_deref(), Some("Remote Person"));
    assert_eq!(snapshot.ids(), vec!["D2", "D1"]);
    assert_eq!(snapshot.get("D1").unwrap().content, "edited remotely");

    let synced = &transport.calls(Method::Post, "/federation/sync")[0];
    assert_eq!(synced.body.as_ref().unwrap()["did"], did);
}
