//! REST resource helpers layered over [`Metry::request`].
//!
//! A [`Resource`] maps the API's collection conventions onto calls:
//!
//! | Call | Request |
//! |---|---|
//! | `get(id)` | `GET {name}/{id}` |
//! | `query(params)` | `GET {name}?params` |
//! | `save(object)` | `PUT {name}/{_id}` without `_id`, or `POST {name}` |
//! | `delete(id)` | `DELETE {name}/{id}` |
//! | `batch(path, ids, data)` | `PUT {name}/{path}` with `[{_id, ...data}]` |
//! | `action(action, id, data)` | `PUT {name}/{id}/{action}` |
//! | `get_data(id, granularity, ranges, ..)` | `GET {name}/{id}/{granularity}/{r1+r2}?metrics=..` |
//!
//! `PUT`/`POST` send their data as a JSON body; other methods send it as query parameters.

// self
use crate::{
	_prelude::*,
	client::{ApiRequest, Metry, RequestOptions},
	http::HttpTransport,
	response::Normalized,
};

/// Metric requested by [`Resource::get_data`] when none is given.
pub const METRIC_DEFAULT: &str = "energy";

const FIELD_ID: &str = "_id";

/// Collection endpoint, optionally nested under a parent (`{parent}/{parent_id}/{name}`).
pub struct Resource<'a, T>
where
	T: ?Sized + HttpTransport,
{
	client: &'a Metry<T>,
	name: String,
	parent: Option<String>,
	parent_id: Option<String>,
	options: RequestOptions,
}
impl<'a, T> Resource<'a, T>
where
	T: ?Sized + HttpTransport,
{
	pub(crate) fn new(client: &'a Metry<T>, name: impl Into<String>) -> Self {
		Self {
			client,
			name: name.into(),
			parent: None,
			parent_id: None,
			options: RequestOptions::default(),
		}
	}

	/// Collection name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Applies `options` to every call made through this handle.
	pub fn with_options(mut self, options: RequestOptions) -> Self {
		self.options = options;

		self
	}

	/// Nests this collection under `parent` (and `parent_id`, when given).
	pub fn of(&self, parent: impl Into<String>, parent_id: Option<&str>) -> Self {
		Self {
			client: self.client,
			name: self.name.clone(),
			parent: Some(parent.into()),
			parent_id: parent_id.map(str::to_owned),
			options: self.options.clone(),
		}
	}

	/// Fetches one item.
	pub async fn get(&self, id: &str) -> Result<Normalized> {
		self.send(Method::GET, Some(id), None, None).await
	}

	/// Lists the collection filtered by the fields of `params`.
	pub async fn query(&self, params: Option<&JsonValue>) -> Result<Normalized> {
		self.send(Method::GET, None, None, params).await
	}

	/// Creates `object`, or updates it when it carries an `_id`.
	///
	/// `object` itself is left untouched; the update body is a copy without `_id`.
	pub async fn save(&self, object: &JsonValue) -> Result<Normalized> {
		match object.get(FIELD_ID) {
			Some(id) => {
				let id = param_value(id).unwrap_or_default();
				let mut body = object.clone();

				if let Some(fields) = body.as_object_mut() {
					fields.remove(FIELD_ID);
				}

				self.send(Method::PUT, Some(&id), None, Some(&body)).await
			},
			None => self.send(Method::POST, None, None, Some(object)).await,
		}
	}

	/// Deletes one item.
	pub async fn delete(&self, id: &str) -> Result<Normalized> {
		self.send(Method::DELETE, Some(id), None, None).await
	}

	/// Applies `data` to every id in `ids` through `PUT {name}/{path}`.
	pub async fn batch(&self, path: &str, ids: &[&str], data: &JsonValue) -> Result<Normalized> {
		let body = batch_body(ids, data);

		self.send(Method::PUT, None, Some(path), Some(&body)).await
	}

	/// Triggers a named action on the collection or on one item.
	pub async fn action(
		&self,
		action: &str,
		id: Option<&str>,
		data: Option<&JsonValue>,
	) -> Result<Normalized> {
		self.send(Method::PUT, id, Some(action), data).await
	}

	/// Fetches time-series values for `ranges` at `granularity`.
	///
	/// Ranges are joined with `+`; an empty `metrics` requests [`METRIC_DEFAULT`]. `extra`
	/// parameters follow `metrics` in the query string. Endpoints with a fixed resolution
	/// (such as readings) take no `granularity` segment.
	pub async fn get_data(
		&self,
		id: &str,
		granularity: Option<&str>,
		ranges: &[&str],
		metrics: &[&str],
		extra: &[(&str, &str)],
	) -> Result<Normalized> {
		let ranges = ranges.join("+");
		let path = self.path([Some(id), granularity, Some(ranges.as_str())]);
		let mut request = ApiRequest::get(path).with_query("metrics", metrics_param(metrics));

		for (key, value) in extra {
			request = request.with_query(*key, *value);
		}

		self.client.request(request.with_options(&self.options)).await
	}

	async fn send(
		&self,
		method: Method,
		id: Option<&str>,
		action: Option<&str>,
		data: Option<&JsonValue>,
	) -> Result<Normalized> {
		let method = self.options.method.clone().unwrap_or(method);
		let mut request = ApiRequest::new(method.clone(), self.path([id, action]));

		if carries_body(&method) {
			request.body = data.cloned();
		} else {
			request.query = query_pairs(data);
		}

		self.client.request(request.with_options(&self.options)).await
	}

	fn path<'s, const N: usize>(&'s self, tail: [Option<&'s str>; N]) -> String {
		[self.parent.as_deref(), self.parent_id.as_deref(), Some(self.name.as_str())]
			.into_iter()
			.chain(tail)
			.flatten()
			.map(|component| component.trim_matches('/'))
			.filter(|component| !component.is_empty())
			.collect::<Vec<_>>()
			.join("/")
	}
}
impl<T> Debug for Resource<'_, T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Resource")
			.field("name", &self.name)
			.field("parent", &self.parent)
			.field("parent_id", &self.parent_id)
			.finish()
	}
}

fn carries_body(method: &Method) -> bool {
	matches!(*method, Method::PUT | Method::POST)
}

fn metrics_param(metrics: &[&str]) -> String {
	if metrics.is_empty() { METRIC_DEFAULT.to_owned() } else { metrics.join(",") }
}

fn batch_body(ids: &[&str], data: &JsonValue) -> JsonValue {
	ids.iter()
		.map(|id| {
			let mut item = JsonMap::new();

			item.insert(FIELD_ID.into(), (*id).into());

			if let Some(fields) = data.as_object() {
				item.extend(fields.iter().map(|(key, value)| (key.clone(), value.clone())));
			}

			JsonValue::Object(item)
		})
		.collect()
}

fn query_pairs(data: Option<&JsonValue>) -> Vec<(String, String)> {
	let Some(fields) = data.and_then(JsonValue::as_object) else {
		return Vec::new();
	};

	fields
		.iter()
		.filter_map(|(key, value)| param_value(value).map(|value| (key.clone(), value)))
		.collect()
}

// Strings go verbatim and arrays comma-join their elements; `null` has no query form.
fn param_value(value: &JsonValue) -> Option<String> {
	match value {
		JsonValue::Null => None,
		JsonValue::String(text) => Some(text.clone()),
		JsonValue::Array(items) =>
			Some(items.iter().filter_map(param_value).collect::<Vec<_>>().join(",")),
		other => Some(other.to_string()),
	}
}
