//! Cursor-paginated listing accumulation.
//!
//! Listing endpoints accept a page size and an opaque continuation cursor. The fetcher requests
//! pages until it holds at least the desired number of items or the platform stops returning a
//! cursor. It never truncates, so the result may overshoot the target by up to one page.

// crates.io
use oauth2::http::Method;
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	client::ApiClient,
	http::HttpClient,
	logger::LogLevel,
	obs::{self, OpKind, OpOutcome, OpSpan},
};

/// Listing query configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
	/// Query parameter carrying the page size.
	pub size_param: String,
	/// Query parameter carrying the continuation cursor.
	pub cursor_param: String,
	/// Largest page size the platform accepts.
	pub max_page_size: usize,
}
impl PaginationConfig {
	/// Platform ceiling for a single page.
	pub const DEFAULT_MAX_PAGE_SIZE: usize = 50;

	/// Overrides the page-size parameter name (YouTube uses `maxResults`).
	pub fn with_size_param(mut self, name: impl Into<String>) -> Self {
		self.size_param = name.into();

		self
	}

	/// Overrides the cursor parameter name.
	pub fn with_cursor_param(mut self, name: impl Into<String>) -> Self {
		self.cursor_param = name.into();

		self
	}

	/// Overrides the page ceiling.
	pub fn with_max_page_size(mut self, size: usize) -> Self {
		self.max_page_size = size;

		self
	}

	/// Page size requested for `desired_count` items.
	pub fn page_size(&self, desired_count: usize) -> usize {
		desired_count.min(self.max_page_size)
	}
}
impl Default for PaginationConfig {
	fn default() -> Self {
		Self {
			size_param: "pageSize".into(),
			cursor_param: "pageToken".into(),
			max_page_size: Self::DEFAULT_MAX_PAGE_SIZE,
		}
	}
}

/// A decoded listing page.
pub trait PagedResponse
where
	Self: DeserializeOwned + Default + Send,
{
	/// Element type of the listing.
	type Item: Send;

	/// Splits the page into its items and the continuation cursor.
	fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

/// Default page shape: `items` (or `data`) plus `nextPageToken` (or `cursor`).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
	/// Items of this page, in platform order.
	#[serde(default, alias = "data")]
	pub items: Vec<T>,
	/// Continuation cursor; absent or empty on the last page.
	#[serde(default, rename = "nextPageToken", alias = "cursor")]
	pub next_page_token: Option<String>,
}
impl<T> Default for Page<T> {
	fn default() -> Self {
		Self { items: Vec::new(), next_page_token: None }
	}
}
impl<T> PagedResponse for Page<T>
where
	T: DeserializeOwned + Send,
{
	type Item = T;

	fn into_parts(self) -> (Vec<T>, Option<String>) {
		(self.items, self.next_page_token)
	}
}

impl<C> ApiClient<C>
where
	C: HttpClient,
{
	/// Accumulates at least `desired_count` items from a listing shaped like [`Page`].
	///
	/// Existing query parameters on `request_uri_base` are kept. `desired_count == 0` still
	/// performs one request.
	pub async fn fetch_page<T>(&self, request_uri_base: &str, desired_count: usize) -> Result<Vec<T>>
	where
		T: DeserializeOwned + Send,
	{
		self.fetch_paged::<Page<T>>(request_uri_base, desired_count).await
	}

	/// Accumulates at least `desired_count` items from a listing with a platform-specific shape.
	pub async fn fetch_paged<P>(
		&self,
		request_uri_base: &str,
		desired_count: usize,
	) -> Result<Vec<P::Item>>
	where
		P: PagedResponse,
	{
		const KIND: OpKind = OpKind::Paginate;

		let span = OpSpan::new(KIND, "fetch_paged");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async move {
				let base = self.resolve(request_uri_base)?;
				let config = self.pagination();
				let size = config.page_size(desired_count).to_string();
				let mut items = Vec::new();
				let mut cursor = None::<String>;

				loop {
					let mut url = base.clone();

					{
						let mut query = url.query_pairs_mut();

						query.append_pair(&config.size_param, &size);

						if let Some(cursor) = &cursor {
							query.append_pair(&config.cursor_param, cursor);
						}
					}

					let page = self.send::<P>(Method::GET, url, None, true).await?;
					let (batch, next) = page.into_parts();

					items.extend(batch);
					cursor = next.filter(|next| !next.is_empty());

					if items.len() >= desired_count || cursor.is_none() {
						break;
					}
				}

				self.logger().log(
					LogLevel::Debug,
					format!("Fetched {} items from {base}", items.len()),
				);

				Ok(items)
			})
			.await;

		obs::record_op_outcome(KIND, OpOutcome::of(&result));

		result
	}
}
