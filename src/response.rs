//! API response normalization and error mapping.
//!
//! Success bodies come in two shapes. A paged list carries `data`, `count`, `skip`, and
//! `limit` side by side and normalizes to [`Normalized::Page`]; anything else normalizes
//! to [`Normalized::Item`] holding the `data` field (or the raw body when there is none).
//! Any numeric `count`/`skip`/`limit` marks a page: fractions truncate and negatives read
//! as zero.

// self
use crate::{_prelude::*, error::TransportError, http, store::TokenStore};

/// Position of a page within a paged listing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pagination {
	/// Items skipped before this page.
	pub skip: u64,
	/// Page size requested.
	pub limit: u64,
	/// Total number of matching items.
	pub count: u64,
	/// 1-based page number.
	pub page: u64,
	/// 1-based index of the first item on this page; `0` when the listing is empty.
	pub from: u64,
	/// 1-based index of the last item on this page.
	pub to: u64,
}
impl Pagination {
	/// Derives page bounds from the raw `skip`/`limit`/`count` triple.
	///
	/// A `limit` of zero reports page 1. Bounds saturate instead of overflowing.
	pub fn new(skip: u64, limit: u64, count: u64) -> Self {
		let page = skip.checked_div(limit).unwrap_or(0).saturating_add(1);
		let from = if count == 0 { 0 } else { skip.saturating_add(1) };
		let to = skip.saturating_add(limit).min(count);

		Self { skip, limit, count, page, from, to }
	}
}

/// Success body in its normalized form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Normalized {
	/// Paged listing.
	Page {
		/// Items on this page.
		data: JsonValue,
		/// Where the page sits in the listing.
		pagination: Pagination,
	},
	/// Single object, or any body that is not a paged listing.
	Item(JsonValue),
}
impl Normalized {
	/// Normalizes a success body.
	pub fn from_body(body: JsonValue) -> Self {
		let paged = ["skip", "limit", "count"].map(|field| body.get(field).and_then(page_field));

		match (body, paged) {
			(JsonValue::Object(mut object), [Some(skip), Some(limit), Some(count)])
				if object.get("data").is_some_and(|data| !data.is_null()) =>
				Self::Page {
					data: object.remove("data").unwrap_or_default(),
					pagination: Pagination::new(skip, limit, count),
				},
			(JsonValue::Object(mut object), _) if object.contains_key("data") =>
				Self::Item(object.remove("data").unwrap_or_default()),
			(body, _) => Self::Item(body),
		}
	}

	/// Payload: the page items or the item itself.
	pub fn data(&self) -> &JsonValue {
		match self {
			Self::Page { data, .. } | Self::Item(data) => data,
		}
	}

	/// Consumes the value and returns its payload.
	pub fn into_data(self) -> JsonValue {
		match self {
			Self::Page { data, .. } | Self::Item(data) => data,
		}
	}

	/// Page bounds for paged listings.
	pub fn pagination(&self) -> Option<&Pagination> {
		match self {
			Self::Page { pagination, .. } => Some(pagination),
			Self::Item(_) => None,
		}
	}

	/// Decodes the payload into `T`.
	pub fn deserialize_data<T>(self) -> Result<T, serde_json::Error>
	where
		T: DeserializeOwned,
	{
		serde_json::from_value(self.into_data())
	}
}

fn page_field(value: &JsonValue) -> Option<u64> {
	// Float-to-int casts saturate; JSON numbers are never NaN.
	value.as_u64().or_else(|| value.as_f64().map(|value| value.max(0.0) as u64))
}

/// Turns raw API responses into [`Normalized`] bodies or typed errors.
///
/// Holds the session's [`TokenStore`] because a 401 revokes the private token.
#[derive(Clone, Debug)]
pub struct ResponseInterpreter {
	store: TokenStore,
}
impl ResponseInterpreter {
	/// Creates an interpreter that revokes credentials in `store`.
	pub fn new(store: TokenStore) -> Self {
		Self { store }
	}

	/// Normalizes a success body; see [`Normalized::from_body`].
	pub fn normalize(&self, body: JsonValue) -> Normalized {
		Normalized::from_body(body)
	}

	/// Maps a failed response to an [`Error`].
	///
	/// A 401 carrying a body clears the private token before returning
	/// [`Error::AuthenticationRejected`]. Other statuses return [`Error::Upstream`] with the
	/// body's `data.errors` field when present, the raw body otherwise.
	pub async fn normalize_error(&self, body: Option<JsonValue>, status: u16) -> Error {
		if status == 401 && body.is_some() {
			if let Err(e) = self.store.set_private_token(None).await {
				return e.into();
			}
		}
		if status == 401 {
			return Error::AuthenticationRejected { body };
		}

		let body = body.map(|body| match body.pointer("/data/errors") {
			Some(errors) if !errors.is_null() => errors.clone(),
			_ => body,
		});

		Error::Upstream { status, body }
	}

	/// Classifies a complete response by status and normalizes or maps its body.
	pub async fn interpret(&self, response: &HttpResponse) -> Result<Normalized> {
		let status = response.status();

		if status.is_success() {
			let body = http::json_body(response)?.unwrap_or_default();

			return Ok(self.normalize(body));
		}

		let body = match http::json_body(response) {
			Ok(body) => body,
			Err(Error::Transport(TransportError::InvalidBody { .. })) =>
				Some(JsonValue::String(String::from_utf8_lossy(response.body()).into_owned())),
			Err(e) => return Err(e),
		};

		Err(self.normalize_error(body, status.as_u16()).await)
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	fn response(status: u16, body: &str) -> HttpResponse {
		let mut response = HttpResponse::new(body.as_bytes().to_vec());

		*response.status_mut() =
			StatusCode::from_u16(status).expect("Fixture status should be valid.");

		response
	}

	#[test]
	fn paged_body_gains_pagination() {
		let normalized =
			Normalized::from_body(json!({ "data": ["a", "b"], "count": 200, "skip": 0, "limit": 50 }));

		assert_eq!(normalized.data(), &json!(["a", "b"]));
		assert_eq!(
			normalized.pagination(),
			Some(&Pagination { skip: 0, limit: 50, count: 200, page: 1, from: 1, to: 50 })
		);
	}

	#[test]
	fn last_and_empty_pages_clamp_bounds() {
		assert_eq!(Pagination::new(150, 50, 180), Pagination {
			skip: 150,
			limit: 50,
			count: 180,
			page: 4,
			from: 151,
			to: 180,
		});
		assert_eq!(Pagination::new(0, 50, 0).from, 0);
		assert_eq!(Pagination::new(0, 50, 0).to, 0);
		assert_eq!(Pagination::new(10, 0, 20).page, 1);
	}

	#[test]
	fn extreme_bounds_saturate() {
		let pagination = Pagination::new(u64::MAX, 1, 10);

		assert_eq!(pagination.page, u64::MAX);
		assert_eq!(pagination.from, u64::MAX);
		assert_eq!(pagination.to, 10);
		assert_eq!(Pagination::new(u64::MAX, u64::MAX, u64::MAX).page, 2);
	}

	#[test]
	fn non_integer_page_fields_still_page() {
		let normalized = Normalized::from_body(
			json!({ "data": [], "count": -3, "skip": 50.0, "limit": 25.9 }),
		);

		assert_eq!(
			normalized.pagination(),
			Some(&Pagination { skip: 50, limit: 25, count: 0, page: 3, from: 0, to: 0 })
		);

		let text_fields =
			Normalized::from_body(json!({ "data": [], "count": "3", "skip": 0, "limit": 25 }));

		assert!(text_fields.pagination().is_none());
	}

	#[test]
	fn single_item_body_unwraps_data() {
		let normalized = Normalized::from_body(json!({ "data": { "_id": "x" } }));

		assert_eq!(normalized, Normalized::Item(json!({ "_id": "x" })));
		assert!(normalized.pagination().is_none());
	}

	#[test]
	fn body_without_data_is_kept_whole() {
		let normalized = Normalized::from_body(json!({ "status": "ok" }));

		assert_eq!(normalized.into_data(), json!({ "status": "ok" }));
	}

	#[tokio::test]
	async fn unauthorized_with_body_revokes_private_token() {
		let store = TokenStore::in_memory();
		let interpreter = ResponseInterpreter::new(store.clone());

		store.set_private_token(Some("pt")).await.expect("Private token should store.");

		let err = interpreter.normalize_error(Some(json!({ "message": "nope" })), 401).await;

		assert!(matches!(err, Error::AuthenticationRejected { .. }));
		assert_eq!(err.body(), Some(&json!({ "message": "nope" })));
		assert!(store.private_token().await.expect("Store read should succeed.").is_none());
	}

	#[tokio::test]
	async fn unauthorized_without_body_keeps_private_token() {
		let store = TokenStore::in_memory();
		let interpreter = ResponseInterpreter::new(store.clone());

		store.set_private_token(Some("pt")).await.expect("Private token should store.");

		let err = interpreter.normalize_error(None, 401).await;

		assert_eq!(err.status(), Some(401));
		assert!(store.private_token().await.expect("Store read should succeed.").is_some());
	}

	#[tokio::test]
	async fn upstream_errors_prefer_structured_errors() {
		let interpreter = ResponseInterpreter::new(TokenStore::in_memory());
		let structured = interpreter
			.normalize_error(Some(json!({ "data": { "errors": [{ "field": "name" }] } })), 422)
			.await;

		assert_eq!(structured.status(), Some(422));
		assert_eq!(structured.body(), Some(&json!([{ "field": "name" }])));

		let raw = interpreter.normalize_error(Some(json!({ "message": "boom" })), 500).await;

		assert_eq!(raw.body(), Some(&json!({ "message": "boom" })));
	}

	#[tokio::test]
	async fn interpret_classifies_by_status() {
		let interpreter = ResponseInterpreter::new(TokenStore::in_memory());
		let ok = interpreter
			.interpret(&response(200, r#"{"data":{"_id":"m1"}}"#))
			.await
			.expect("2xx should normalize.");

		assert_eq!(ok.into_data(), json!({ "_id": "m1" }));

		let err = interpreter
			.interpret(&response(502, "Bad Gateway"))
			.await
			.expect_err("5xx should fail.");

		assert_eq!(err.body(), Some(&JsonValue::String("Bad Gateway".into())));
	}
}
