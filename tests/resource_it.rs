#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use metry_sdk::{
	client::{ReqwestMetry, RequestOptions},
	config::{AuthConfig, ClientConfig},
	reqwest::Method,
	store::TokenStore,
	url::Url,
};

fn build_client(server: &MockServer) -> ReqwestMetry {
	let base_url = Url::parse(&server.base_url()).expect("Mock server URL should parse.");

	ReqwestMetry::new(ClientConfig::new(base_url), AuthConfig::disabled(), TokenStore::in_memory())
		.expect("Client configuration should be valid.")
}

#[tokio::test]
async fn get_and_delete_address_one_item() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let get = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v2/tests/67890");
			then.status(200).body(r#"{"data":{"_id":"67890"}}"#);
		})
		.await;
	let delete = server
		.mock_async(|when, then| {
			when.method(DELETE).path("/api/v2/tests/67890");
			then.status(200).body(r#"{"data":{"_id":"67890"}}"#);
		})
		.await;
	let tests = client.resource("tests");
	let item = tests.get("67890").await.expect("GET should succeed.");

	assert_eq!(item.into_data(), json!({ "_id": "67890" }));
	assert!(tests.delete("67890").await.is_ok());

	get.assert_calls_async(1).await;
	delete.assert_calls_async(1).await;
}

#[tokio::test]
async fn query_sends_params_in_the_query_string() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/v2/tests")
				.query_param("holder", "me")
				.query_param("running", "true");
			then.status(200)
				.body(r#"{"data":[{"_id":"abc123"}],"count":1,"skip":0,"limit":50}"#);
		})
		.await;
	let page = client
		.resource("tests")
		.query(Some(&json!({ "holder": "me", "running": "true" })))
		.await
		.expect("Query should succeed.");
	let pagination = page.pagination().expect("Paged body should carry pagination.");

	assert_eq!((pagination.page, pagination.from, pagination.to), (1, 1, 1));

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn save_posts_new_objects_and_puts_existing_ones() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let create = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/v2/tests")
				.header("content-type", "application/json;charset=UTF-8")
				.json_body(json!({ "name": "Passing test" }));
			then.status(200).body(r#"{"data":{"_id":"abc123","name":"Passing test"}}"#);
		})
		.await;
	let update = server
		.mock_async(|when, then| {
			when.method(PUT)
				.path("/api/v2/tests/abc123")
				.json_body(json!({ "name": "Always passing" }));
			then.status(200).body(r#"{"data":{"_id":"abc123","name":"Always passing"}}"#);
		})
		.await;
	let tests = client.resource("tests");

	tests.save(&json!({ "name": "Passing test" })).await.expect("POST should succeed.");

	let existing = json!({ "_id": "abc123", "name": "Always passing" });

	tests.save(&existing).await.expect("PUT should succeed.");

	assert_eq!(existing, json!({ "_id": "abc123", "name": "Always passing" }));

	create.assert_calls_async(1).await;
	update.assert_calls_async(1).await;
}

#[tokio::test]
async fn actions_and_batches_use_put() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let action = server
		.mock_async(|when, then| {
			when.method(PUT).path("/api/v2/tests/67890/postpone");
			then.status(200).body(r#"{"data":{}}"#);
		})
		.await;
	let batch = server
		.mock_async(|when, then| {
			when.method(PUT).path("/api/v2/tests/groupupdate").json_body(json!([
				{ "_id": "1", "postponed": true },
				{ "_id": "2", "postponed": true },
			]));
			then.status(200).body(r#"{"data":[]}"#);
		})
		.await;
	let tests = client.resource("tests");

	tests.action("postpone", Some("67890"), None).await.expect("Action should succeed.");
	tests
		.batch("groupupdate", &["1", "2"], &json!({ "postponed": true }))
		.await
		.expect("Batch should succeed.");

	action.assert_calls_async(1).await;
	batch.assert_calls_async(1).await;
}

#[tokio::test]
async fn nested_resources_and_method_overrides() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let nested = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v2/testers/tests/67890");
			then.status(200).body(r#"{"data":{}}"#);
		})
		.await;
	let overridden = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v2/tests/67890");
			then.status(200).body(r#"{"data":{}}"#);
		})
		.await;
	let tests = client.resource("tests");

	tests.of("testers", None).get("67890").await.expect("Nested GET should succeed.");
	tests
		.with_options(RequestOptions::default().with_method(Method::POST))
		.get("67890")
		.await
		.expect("Overridden GET should succeed.");

	nested.assert_calls_async(1).await;
	overridden.assert_calls_async(1).await;
}

#[tokio::test]
async fn time_series_paths_join_ranges_and_metrics() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let default_metric = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/v2/consumptions/67890/day/20150101+20150201")
				.query_param("metrics", "energy");
			then.status(200).body(r#"{"data":[]}"#);
		})
		.await;
	let sum = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/v2/consumptions/sum/month/2015")
				.query_param("metrics", "energy,flow")
				.query_param("meters", "m1,m2");
			then.status(200).body(r#"{"data":[]}"#);
		})
		.await;
	let readings = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v2/readings/m1/201501").query_param("metrics", "energy");
			then.status(200).body(r#"{"data":[]}"#);
		})
		.await;

	client
		.resource("consumptions")
		.get_data("67890", Some("day"), &["20150101", "20150201"], &[], &[])
		.await
		.expect("Default metric request should succeed.");
	client
		.resource("consumptions")
		.get_data("sum", Some("month"), &["2015"], &["energy", "flow"], &[("meters", "m1,m2")])
		.await
		.expect("Sum request should succeed.");
	client
		.resource("readings")
		.get_data("m1", None, &["201501"], &["energy"], &[])
		.await
		.expect("Readings request should succeed.");

	default_metric.assert_calls_async(1).await;
	sum.assert_calls_async(1).await;
	readings.assert_calls_async(1).await;
}
