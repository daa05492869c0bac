//! End-to-end client tests against a wiremock server

use graphkit::http::Method;
use graphkit::{CancellationToken, Error, GraphClient};
use rstest::rstest;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{graph_error, mock_server, test_client};

#[rstest]
#[tokio::test]
async fn test_send_json(#[future] mock_server: MockServer) {
    let server = mock_server.await;
    let client = test_client(&server);

    Mock::given(method("GET"))
        .and(path("/v1.0/me"))
        .and(query_param("$select", "displayName"))
        .and(header("authorization", "Bearer test-token"))
        .and(header_exists("client-request-id"))
        .and(header_exists("sdkversion"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"displayName": "Adele Vance"})))
        .expect(1)
        .mount(&server)
        .await;

    let info = client
        .request_information(Method::GET, "/me")
        .query_parameter("$select", "displayName");
    let me: serde_json::Value = client.send_json(info).await.unwrap();

    assert_eq!(me["displayName"], "Adele Vance");
}

#[rstest]
#[tokio::test]
async fn test_error_response(#[future] mock_server: MockServer) {
    let server = mock_server.await;
    let client = test_client(&server);

    Mock::given(method("GET"))
        .and(path("/v1.0/users/missing"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(graph_error("Request_ResourceNotFound", "Resource 'missing' does not exist."))
                .insert_header("request-id", "from-header"),
        )
        .mount(&server)
        .await;

    let info = client.request_information(Method::GET, "/users/missing");
    let response = client.send(info.clone()).await.unwrap();
    assert_eq!(response.status().as_u16(), 404);

    match client.send_json::<serde_json::Value>(info).await {
        Err(Error::Service(err)) => {
            assert_eq!(err.status, 404);
            assert_eq!(err.code.as_deref(), Some("Request_ResourceNotFound"));
            assert_eq!(err.request_id.as_deref(), Some("0f1c6c5e-3c8d-4b8e-9d3b-8b2d2c7f9a10"));
        }
        other => panic!("Expected Service error, got {:?}", other),
    }
}

#[rstest]
#[tokio::test]
async fn test_throttled_request_is_retried(#[future] mock_server: MockServer) {
    let server = mock_server.await;
    let client = test_client(&server);

    Mock::given(method("GET"))
        .and(path("/v1.0/me/messages"))
        .respond_with(ResponseTemplate::new(503).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me/messages"))
        .and(header("retry-attempt", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .expect(1)
        .mount(&server)
        .await;

    let messages: serde_json::Value = client
        .send_json(client.request_information(Method::GET, "/me/messages"))
        .await
        .unwrap();

    assert_eq!(messages["value"], json!([]));
}

#[rstest]
#[tokio::test]
async fn test_relative_redirect_is_followed(#[future] mock_server: MockServer) {
    let server = mock_server.await;
    let client = test_client(&server);

    Mock::given(method("GET"))
        .and(path("/v1.0/me/drive/root"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/v1.0/drives/d1/root"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/drives/d1/root"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "root"})))
        .expect(1)
        .mount(&server)
        .await;

    let root: serde_json::Value = client
        .send_json(client.request_information(Method::GET, "/me/drive/root"))
        .await
        .unwrap();

    assert_eq!(root["name"], "root");
}

#[rstest]
#[tokio::test]
async fn test_cancelled_before_send(#[future] mock_server: MockServer) {
    let server = mock_server.await;
    let client = test_client(&server);

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    token.cancel();
    let err = client
        .send_with_cancellation(client.request_information(Method::GET, "/me"), &token)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
}

#[rstest]
#[tokio::test]
async fn test_timeout(#[future] mock_server: MockServer) {
    let server = mock_server.await;
    let client = GraphClient::builder()
        .access_token(common::TEST_TOKEN)
        .base_url(server.uri())
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/v1.0/me"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let err = client
        .send(client.request_information(Method::GET, "/me"))
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "expected timeout, got {err:?}");
}

#[rstest]
#[tokio::test]
async fn test_token_not_sent_to_other_hosts(#[future] mock_server: MockServer) {
    let server = mock_server.await;
    let client = GraphClient::builder()
        .access_token(common::TEST_TOKEN)
        .build()
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/external"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/external", server.uri()).parse().unwrap();
    let info = graphkit::RequestInformation::with_url(Method::GET, url);
    client.send(info).await.unwrap();

    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests[0].headers.get("authorization").is_none());
}
