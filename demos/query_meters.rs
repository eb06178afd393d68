//! Signs in with an authorization code, then lists meters and fetches a month of daily
//! consumption against a mock Metry API.
//!
//! The token endpoint is hit once; the access token it returns is cached in the store and
//! reused for every resource call that follows.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use time::macros::datetime;
// self
use metry_sdk::{
	client::ReqwestMetry,
	config::{AuthConfig, ClientConfig},
	period::{self, Granularity},
	store::TokenStore,
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).header("content-type", "application/json").body(
				r#"{"access_token":"demo-access","expires_in":3600,"refresh_token":"demo-refresh","scope":"basic","token_type":"Bearer"}"#,
			);
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v2/meters").header("authorization", "Bearer demo-access");
			then.status(200).header("content-type", "application/json").body(
				r#"{"data":[{"_id":"m1","name":"Main"}],"count":1,"skip":0,"limit":50}"#,
			);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/v2/consumptions/m1/day/201503")
				.query_param("metrics", "energy");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"data":[{"periods":[{"energy":[1.5,2.25]}]}]}"#);
		})
		.await;

	let auth = AuthConfig::new("demo-client")
		.with_client_secret("demo-secret")
		.with_redirect_uri("http://localhost:8080/callback");
	let client = ReqwestMetry::new(
		ClientConfig::new(Url::parse(&server.base_url())?),
		auth,
		TokenStore::in_memory(),
	)?;

	println!("Authorize at: {}", client.auth().authorize_url()?);

	client.auth().handle_auth_code("demo-code").await?;

	let meters = client.resource("meters").query(None).await?;

	println!("Meters: {}", meters.data());

	if let Some(pagination) = meters.pagination() {
		println!("Showing {}-{} of {}", pagination.from, pagination.to, pagination.count);
	}

	let range = period::get_period(&[datetime!(2015-03-16 14:33)], Granularity::Day, false)
		.unwrap_or_default();
	let consumption = client
		.resource("consumptions")
		.get_data("m1", Some(Granularity::Day.as_str()), &[range.as_str()], &[], &[])
		.await?;

	println!("Consumption for {range}: {}", consumption.data());

	token_mock.assert_calls_async(1).await;

	Ok(())
}
