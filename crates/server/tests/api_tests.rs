//! Integration tests for HTTP API endpoints.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{TestServer, can_bind_localhost, capi, seeded_bytes};
use depot_core::PackageId;
use depot_metadata::{MembershipRepo, PackageRepo};
use httpmock::prelude::*;
use std::time::Duration;
use tower::ServiceExt;

fn pkg(id: &str) -> PackageId {
    PackageId::new(id).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::new().await;

    let (status, body) = server.json_request("GET", "/health", Body::empty()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("status").and_then(|v| v.as_str()), Some("ok"));
    assert!(body.get("version").is_some());
}

#[tokio::test]
async fn test_wrong_api_key_is_unauthorized() {
    let server = TestServer::new().await;
    server.seed_local(&pkg("abc"), b"blob").await;

    for uri in [
        "/capi/wrong/get_pkg/abc",
        "/capi/wrong/tran_pkg/abc",
        "/capi/wrong/pkg/abc",
    ] {
        let (status, body) = server.json_request("GET", uri, Body::empty()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["code"], "unauthorized");
    }
}

#[tokio::test]
async fn test_invalid_package_id_is_bad_request() {
    let server = TestServer::new().await;

    let (status, body) = server
        .json_request("GET", &capi("/pkg/bad.id"), Body::empty())
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_package_id");
}

#[tokio::test]
async fn test_package_info_not_found() {
    let server = TestServer::new().await;

    let (status, body) = server
        .json_request("GET", &capi("/pkg/missing"), Body::empty())
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_package_info_returns_metadata() {
    let server = TestServer::new().await;
    server.seed_local(&pkg("abc"), b"blob").await;

    let (status, body) = server
        .json_request("GET", &capi("/pkg/abc"), Body::empty())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["package_id"], "abc");
    assert_eq!(body["owner_id"], "seed");
    assert_eq!(body["created_at"], 1_700_000_000);
    assert_eq!(body["export_path"], "/package/abc.tar.xz");
}

#[tokio::test]
async fn test_expired_package_is_not_found() {
    let server = TestServer::new().await;
    let id = pkg("abc");
    server.seed_local(&id, b"blob").await;
    server.metadata().expire_package_at(&id, 1).await.unwrap();

    let (status, _) = server
        .json_request("GET", &capi("/pkg/abc"), Body::empty())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_corrupt_metadata_is_server_error() {
    let server = TestServer::new().await;
    let id = pkg("abc");
    server
        .metadata()
        .put_package_meta(&id, "{broken")
        .await
        .unwrap();

    let (status, body) = server
        .json_request("GET", &capi("/get_pkg/abc"), Body::empty())
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "metadata_corrupt");
}

#[tokio::test]
async fn test_get_pkg_serves_local_blob() {
    let server = TestServer::new().await;
    let data = seeded_bytes(1, 200_000);
    server.seed_local(&pkg("abc"), &data).await;

    let request = Request::builder()
        .uri(capi("/get_pkg/abc"))
        .body(Body::empty())
        .unwrap();
    let response = server.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-length"].to_str().unwrap(),
        "200000"
    );
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(body.as_ref(), data.as_slice());
}

#[tokio::test]
async fn test_get_pkg_without_holder_is_unavailable() {
    let server = TestServer::new().await;
    let id = pkg("abc");

    let (status, body) = server
        .json_request("GET", &capi("/get_pkg/abc"), Body::empty())
        .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "no_holder");
    assert!(!server.blobs().blob_exists(&id).await.unwrap());
    assert_eq!(server.state.packages.transport.active_transfers().await, 0);
}

#[tokio::test]
async fn test_tran_pkg_serves_only_local_blobs() {
    let server = TestServer::new().await;
    let id = pkg("abc");

    let (status, _) = server
        .request("GET", &capi("/tran_pkg/abc"), Body::empty())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    server.seed_local(&id, b"peer bytes").await;
    let (status, body) = server
        .request("GET", &capi("/tran_pkg/abc"), Body::empty())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"peer bytes");
}

#[tokio::test]
async fn test_delete_package_cleans_local_entries() {
    let server = TestServer::new().await;
    let id = pkg("abc");
    server.seed_local(&id, b"blob").await;
    let node = server.state.packages.node_addr.clone();
    server.membership().add_package_node(&id, &node).await.unwrap();
    server
        .membership()
        .add_package_node(&id, "10.0.0.2:8080")
        .await
        .unwrap();

    let (status, _) = server
        .request("DELETE", &capi("/pkg/abc"), Body::empty())
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = server
        .request("GET", &capi("/pkg/abc"), Body::empty())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        server.membership().list_package_nodes(&id).await.unwrap(),
        vec!["10.0.0.2:8080".to_string()]
    );

    // Deleting again is still fine.
    let (status, _) = server
        .request("DELETE", &capi("/pkg/abc"), Body::empty())
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_get_pkg_streams_from_peer() {
    if !can_bind_localhost() {
        eprintln!("Skipping test_get_pkg_streams_from_peer: cannot bind to localhost");
        return;
    }

    let peer = MockServer::start_async().await;
    let data = seeded_bytes(7, 100);
    let mock = peer
        .mock_async(|when, then| {
            when.method(GET).path("/capi/test-key/tran_pkg/abc");
            then.status(200).body(data.clone());
        })
        .await;

    let server = TestServer::with_config(|config| {
        config.transport.register_completed = false;
    })
    .await;
    let id = pkg("abc");
    server
        .membership()
        .add_package_node(&id, &peer.address().to_string())
        .await
        .unwrap();

    let (status, body) = server
        .request("GET", &capi("/get_pkg/abc"), Body::empty())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, data);

    server.state.packages.transport.wait_idle().await;
    assert_eq!(mock.hits_async().await, 1);
    assert_eq!(server.blobs().blob_size(&id).await.unwrap(), 100);
    assert!(!server.metadata().package_exists(&id).await.unwrap());
}

#[tokio::test]
async fn test_concurrent_get_pkg_fetches_once() {
    if !can_bind_localhost() {
        eprintln!("Skipping test_concurrent_get_pkg_fetches_once: cannot bind to localhost");
        return;
    }

    let peer = MockServer::start_async().await;
    let data = seeded_bytes(9, 300_000);
    let mock = peer
        .mock_async(|when, then| {
            when.method(GET).path("/capi/test-key/tran_pkg/abc");
            then.status(200)
                .delay(Duration::from_millis(200))
                .body(data.clone());
        })
        .await;

    let server = TestServer::with_config(|config| {
        config.transport.register_completed = false;
    })
    .await;
    server
        .membership()
        .add_package_node(&pkg("abc"), &peer.address().to_string())
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let router = server.router.clone();
        handles.push(tokio::spawn(async move {
            let request = Request::builder()
                .uri(capi("/get_pkg/abc"))
                .body(Body::empty())
                .unwrap();
            let response = router.oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap()
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().as_ref(), data.as_slice());
    }
    server.state.packages.transport.wait_idle().await;
    assert_eq!(mock.hits_async().await, 1);
}

#[tokio::test]
async fn test_get_pkg_peer_failure_surfaces_in_body() {
    if !can_bind_localhost() {
        eprintln!("Skipping test_get_pkg_peer_failure_surfaces_in_body: cannot bind to localhost");
        return;
    }

    let peer = MockServer::start_async().await;
    let mock = peer
        .mock_async(|when, then| {
            when.method(GET).path("/capi/test-key/tran_pkg/abc");
            then.status(500);
        })
        .await;

    let server = TestServer::new().await;
    let id = pkg("abc");
    server
        .membership()
        .add_package_node(&id, &peer.address().to_string())
        .await
        .unwrap();

    for attempt in 1..=2 {
        let request = Request::builder()
            .uri(capi("/get_pkg/abc"))
            .body(Body::empty())
            .unwrap();
        let response = server.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .is_err(),
            "attempt {attempt} should end with a body error"
        );

        server.state.packages.transport.wait_idle().await;
        assert!(!server.blobs().blob_exists(&id).await.unwrap());
    }

    // The failure is not cached: each request fetched again.
    assert_eq!(mock.hits_async().await, 2);
}

#[tokio::test]
async fn test_add_pkg_empty_body_is_bad_request() {
    let server = TestServer::new().await;

    let (status, body) = server
        .json_request("POST", &capi("/add_pkg"), Body::empty())
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let server = TestServer::new().await;

    let (status, body) = server.request("GET", "/metrics", Body::empty()).await;

    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("depot_active_transfers"));
}

#[tokio::test]
async fn test_metrics_disabled() {
    let server = TestServer::with_config(|config| {
        config.server.metrics_enabled = false;
    })
    .await;

    let (status, _) = server.request("GET", "/metrics", Body::empty()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
