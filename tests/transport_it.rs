// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use jamf_protect_client::{_preludet::*, error::ErrorKind, reqwest::Method};

fn token_body(value: &str, expires_in: i64) -> String {
	format!("{{\"access_token\":\"{value}\",\"token_type\":\"Bearer\",\"expires_in\":{expires_in}}}")
}

async fn mount_token_endpoint<'s>(server: &'s MockServer, value: &str) -> httpmock::Mock<'s> {
	let body = token_body(value, 3_600);

	server
		.mock_async(move |when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await
}

#[tokio::test]
async fn one_token_backs_many_calls() {
	let server = MockServer::start_async().await;
	let token_mock = mount_token_endpoint(&server, "tok-a").await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/plans").header("authorization", "Bearer tok-a");
			then.status(200).header("content-type", "application/json").body("{\"plans\":[]}");
		})
		.await;
	let transport = build_test_transport(&server.base_url());
	let first = transport.get("/v1/plans").await.expect("First API call should succeed.");
	let second = transport.get("/v1/plans").await.expect("Second API call should succeed.");

	assert_eq!(first.metadata.status, Some(200));
	assert_eq!(second.metadata.status, Some(200));
	assert!(first.text().contains("plans"));

	token_mock.assert_calls_async(1).await;
	api_mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn transient_failures_exhaust_the_retry_budget() {
	let server = MockServer::start_async().await;
	let _token_mock = mount_token_endpoint(&server, "tok-retry").await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/status");
			then.status(503).body("{}");
		})
		.await;
	let transport = build_test_transport(&server.base_url());
	let err = transport.get("/v1/status").await.expect_err("A persistent 503 should fail.");
	let api = err.as_api().expect("Classified errors should be exposed.");

	assert_eq!(api.kind, ErrorKind::Transient);
	assert_eq!(api.metadata.status, Some(503));

	// Initial call plus the two retries configured by the test policy.
	api_mock.assert_calls_async(3).await;
}

#[tokio::test]
async fn rate_limited_failures_expose_headers_after_retries() {
	let server = MockServer::start_async().await;
	let _token_mock = mount_token_endpoint(&server, "tok-429").await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/v1/plans");
			then.status(429)
				.header("retry-after", "0")
				.header("content-type", "application/json")
				.body("{\"error\":{\"code\":\"rate_limit\",\"message\":\"Too many requests\"}}");
		})
		.await;
	let transport = build_test_transport(&server.base_url());
	let err = transport
		.post("/v1/plans", &json!({ "name": "plan" }))
		.await
		.expect_err("A persistent 429 should fail after retries.");
	let api = err.as_api().expect("Classified errors should be exposed.");

	assert_eq!(api.kind, ErrorKind::RateLimited);
	assert_eq!(api.code.as_deref(), Some("rate_limit"));
	assert_eq!(api.metadata.status, Some(429));
	assert!(api.metadata.headers.contains_key("retry-after"));
	assert_eq!(api.metadata.retry_after, Some(Duration::ZERO));
	assert!(api.message.contains("Too many requests"));

	api_mock.assert_calls_async(3).await;
}

#[tokio::test]
async fn validation_failures_are_never_retried() {
	let server = MockServer::start_async().await;
	let _token_mock = mount_token_endpoint(&server, "tok-422").await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/v1/plans");
			then.status(422)
				.header("content-type", "application/json")
				.body("{\"error\":{\"code\":\"PLAN_INVALID\",\"message\":\"Name is required\"}}");
		})
		.await;
	let transport = build_test_transport(&server.base_url());
	let err = transport
		.post("/v1/plans", &json!({}))
		.await
		.expect_err("Validation failures should surface immediately.");
	let api = err.as_api().expect("Classified errors should be exposed.");

	assert_eq!(api.kind, ErrorKind::Validation);
	assert!(api.message.contains("Name is required"));

	api_mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn an_observed_401_invalidates_the_cached_token() {
	let server = MockServer::start_async().await;
	let _token_mock = mount_token_endpoint(&server, "tok-revoked").await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/plans");
			then.status(401).body("{}");
		})
		.await;
	let transport = build_test_transport(&server.base_url());
	let err = transport.get("/v1/plans").await.expect_err("The 401 should surface.");

	assert_eq!(err.kind(), Some(ErrorKind::Auth));
	// The next call must start from a forced refresh.
	assert!(transport.token_manager().cached().is_none());

	api_mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn token_failures_short_circuit_before_the_target_call() {
	let server = MockServer::start_async().await;
	let _token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_client\"}");
		})
		.await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/plans");
			then.status(200).body("{}");
		})
		.await;
	let transport = build_test_transport(&server.base_url());
	let err = transport.get("/v1/plans").await.expect_err("The failed exchange should surface.");

	assert_eq!(err.kind(), Some(ErrorKind::Auth));
	assert!(err.to_string().contains("401"));

	api_mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn custom_headers_are_forwarded() {
	let server = MockServer::start_async().await;
	let _token_mock = mount_token_endpoint(&server, "tok-hdr").await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/alerts").header("x-request-id", "it-123");
			then.status(200).header("content-type", "application/json").body("{\"alerts\":[]}");
		})
		.await;
	let transport = build_test_transport(&server.base_url());
	let mut headers = jamf_protect_client::reqwest::header::HeaderMap::new();

	headers.insert(
		"x-request-id",
		"it-123".parse().expect("Header fixture should be a valid value."),
	);

	let response = transport
		.execute(Method::GET, "/v1/alerts", None, Some(headers))
		.await
		.expect("Calls with extra headers should succeed.");

	assert_eq!(response.metadata.status, Some(200));

	api_mock.assert_async().await;
}

#[tokio::test]
async fn graphql_data_is_returned_when_no_errors_are_reported() {
	let server = MockServer::start_async().await;
	let _token_mock = mount_token_endpoint(&server, "tok-gql").await;
	let graphql_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/graphql").header("authorization", "Bearer tok-gql");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"data\":{\"listPlans\":{\"items\":[]}}}");
		})
		.await;
	let transport = build_test_transport(&server.base_url());
	let data = transport
		.graphql("query listPlans { listPlans { items { id } } }", json!({}))
		.await
		.expect("A clean GraphQL response should succeed.");

	assert_eq!(data["listPlans"]["items"], json!([]));

	graphql_mock.assert_async().await;
}

#[tokio::test]
async fn graphql_domain_errors_are_classified_inside_the_200_envelope() {
	let server = MockServer::start_async().await;
	let _token_mock = mount_token_endpoint(&server, "tok-gql-err").await;
	let _graphql_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/graphql");
			then.status(200).header("content-type", "application/json").body(
				"{\"data\":null,\"errors\":[{\"message\":\"Plan not found\",\
				 \"path\":[\"getPlan\"],\"locations\":[{\"line\":2,\"column\":3}]}]}",
			);
		})
		.await;
	let transport = build_test_transport(&server.base_url());
	let err = transport
		.graphql("query getPlan { getPlan(id: \"42\") { id } }", json!({ "id": "42" }))
		.await
		.expect_err("A GraphQL errors[] payload should classify as a failure.");
	let api = err.as_api().expect("Classified errors should be exposed.");

	assert_eq!(api.kind, ErrorKind::NotFound);
	assert!(api.graphql);
	assert_eq!(api.metadata.status, Some(200));
	assert!(api.message.contains("path: getPlan"));
	assert!(api.message.contains("locations: 2:3"));
}
