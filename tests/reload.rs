//! Configuration reload while serving traffic.

use std::sync::Arc;
use std::time::Duration;

use auth_gateway::pipeline::SnapshotStore;
use axum::http::Method;
use reqwest::StatusCode;
use serde_json::json;

mod common;
use common::{client, gateway_config, mint_token, route, spawn_gateway, start_backend};

#[tokio::test]
async fn test_reload_via_channel_replaces_routes() {
    let backend = start_backend(200, Duration::ZERO).await;
    let port = backend.addr.port();
    let gateway = spawn_gateway(gateway_config(vec![route("v1", "/v1/**", port)])).await;
    let token = mint_token(json!({}));

    let before = client().get(gateway.url("/v1/courses")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(before.status(), StatusCode::OK);

    gateway
        .updates
        .send(gateway_config(vec![route("v2", "/v2/**", port)]))
        .unwrap();
    for _ in 0..50 {
        if gateway.store.generation() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(gateway.store.generation(), 2);

    let old = client().get(gateway.url("/v1/courses")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(old.status(), StatusCode::NOT_FOUND);
    let new = client().get(gateway.url("/v2/courses")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(new.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_update_keeps_serving() {
    let backend = start_backend(200, Duration::ZERO).await;
    let port = backend.addr.port();
    let gateway = spawn_gateway(gateway_config(vec![route("v1", "/v1/**", port)])).await;

    let mut broken = gateway_config(vec![route("v1", "/v1/**", port)]);
    broken.routes[0].policy = Some("NoSuchPolicy".into());
    gateway.updates.send(broken).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(gateway.store.generation(), 1);
    let response = client()
        .get(gateway.url("/v1/courses"))
        .bearer_auth(mint_token(json!({})))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_readers_never_see_mixed_snapshots() {
    let store = Arc::new(SnapshotStore::from_config(&gateway_config(vec![route("a", "/a/**", 8001)])).unwrap());

    let writer = {
        let store = store.clone();
        tokio::spawn(async move {
            for i in 0..200 {
                let config = if i % 2 == 0 {
                    gateway_config(vec![route("b", "/b/**", 8002)])
                } else {
                    gateway_config(vec![route("a", "/a/**", 8001)])
                };
                store.reload(&config).unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..4 {
        let store = store.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..500 {
                let snapshot = store.load();
                let a = snapshot.routes.resolve(&Method::GET, "/a/x", None);
                let b = snapshot.routes.resolve(&Method::GET, "/b/x", None);
                // Exactly one table is live in any snapshot.
                assert!(a.is_some() != b.is_some());
                let matched = a.or(b).unwrap();
                assert_eq!(matched.route.targets.targets()[0].port, if matched.route.name == "a" { 8001 } else { 8002 });
                tokio::task::yield_now().await;
            }
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
    assert_eq!(store.generation(), 201);
}
