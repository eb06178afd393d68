//! Single-flight access-token refresh with an ordered waiter queue.
//!
//! [`RefreshCoordinator::ensure_access_token`] either returns the cached access token or
//! joins the waiter queue. The first caller to find the coordinator idle becomes the
//! leader: it flips the coordinator to refreshing in the same critical section as its
//! enqueue, performs the one exchange, stores the result, and drains the queue. Everyone
//! else waits on a oneshot channel for that exchange's outcome.
//!
//! The drain captures and clears the queue in the same critical section that returns the
//! coordinator to idle. A caller that enqueued before that point receives this exchange's
//! outcome; a caller that arrives after it finds the coordinator idle and leads the next
//! exchange. No waiter can be stranded between the two.

mod metrics;

pub use metrics::RefreshMetrics;

// std
use std::mem;
// crates.io
use futures::channel::oneshot;
// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	obs::{self, FlowKind, FlowSpan},
	oauth::TokenExchange,
	store::{RefreshStoreOutcome, TokenStore},
};

type RefreshOutcome = Result<AccessToken, String>;
type Waiter = oneshot::Sender<RefreshOutcome>;

#[derive(Default)]
struct RefreshState {
	refreshing: bool,
	generation: u64,
	waiters: VecDeque<Waiter>,
}

/// Owns the refreshing flag and the waiter queue for one credential store.
pub struct RefreshCoordinator {
	store: TokenStore,
	exchange: Arc<dyn TokenExchange>,
	state: Mutex<RefreshState>,
	metrics: Arc<RefreshMetrics>,
}
impl RefreshCoordinator {
	/// Creates an idle coordinator that refreshes through `exchange` and persists into `store`.
	pub fn new(store: TokenStore, exchange: Arc<dyn TokenExchange>) -> Self {
		Self { store, exchange, state: Default::default(), metrics: Default::default() }
	}

	/// Counters for exchanges started, succeeded, failed, and joined.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Returns `true` while an exchange is in flight.
	pub fn is_refreshing(&self) -> bool {
		self.state.lock().refreshing
	}

	/// Number of callers currently waiting on the in-flight exchange.
	pub fn pending_waiters(&self) -> usize {
		self.state.lock().waiters.len()
	}

	/// Resolves with a valid access token, refreshing with `refresh_token` when needed.
	///
	/// A valid stored token is returned without touching the exchange. Otherwise the caller
	/// joins the waiter queue; at most one exchange runs at a time and every caller queued
	/// behind it receives the same token or the same [`Error::RefreshFailed`].
	pub async fn ensure_access_token(&self, refresh_token: &str) -> Result<AccessToken> {
		loop {
			let observed = self.state.lock().generation;

			if let Some(token) = self.store.access_token().await?.filter(AccessToken::is_valid) {
				return Ok(token);
			}

			let (receiver, lead) = {
				let mut state = self.state.lock();

				// An exchange finished while storage was being read; its token may be valid.
				if !state.refreshing && state.generation != observed {
					continue;
				}

				let (sender, receiver) = oneshot::channel();

				state.waiters.push_back(sender);

				let lead = !mem::replace(&mut state.refreshing, true);

				(receiver, lead)
			};

			if lead {
				self.run_refresh(refresh_token).await;
			} else {
				self.metrics.record_coalesced();
			}

			return match receiver.await {
				Ok(Ok(token)) => Ok(token),
				Ok(Err(reason)) => Err(Error::RefreshFailed { reason }),
				Err(oneshot::Canceled) =>
					Err(Error::refresh_failed("the in-flight refresh was dropped")),
			};
		}
	}

	/// Starts an exchange unless one is already in flight, then drains the queue.
	///
	/// When an exchange is already running this returns immediately; that exchange drains
	/// the queue when it completes.
	pub async fn fetch_if_needed(&self, refresh_token: &str) {
		if mem::replace(&mut self.state.lock().refreshing, true) {
			return;
		}

		self.run_refresh(refresh_token).await;
	}

	async fn run_refresh(&self, refresh_token: &str) {
		let mut drain = DrainOnDrop { coordinator: self, outcome: None };
		let span = FlowSpan::new(FlowKind::Refresh, "refresh_coordinator");

		self.metrics.record_attempt();
		obs::refresh_event("starting access token refresh", self.pending_waiters());

		let outcome = span.instrument(self.fetch_access_token(refresh_token)).await;

		match &outcome {
			Ok(_) => self.metrics.record_success(),
			Err(_) => self.metrics.record_failure(),
		}

		drain.outcome = Some(outcome);
	}

	async fn fetch_access_token(&self, refresh_token: &str) -> RefreshOutcome {
		let exchanged = self.exchange.exchange_refresh_token(refresh_token).await;
		let received_at = OffsetDateTime::now_utc();
		let (token, rotated) = match exchanged
			.and_then(|response| Ok((AccessToken::from_response(&response, received_at)?, response)))
		{
			Ok((token, response)) => (token, response.refresh_token),
			Err(e) => {
				// A failed exchange leaves no access token behind.
				let cleared =
					self.store.store_refreshed_access_token(refresh_token, None, None).await;

				return Err(match cleared {
					Ok(_) => e.to_string(),
					Err(store_err) => {
						obs::refresh_warning("failed to clear the stale access token", &store_err);

						format!("{e} (clearing the stale access token also failed: {store_err})")
					},
				});
			},
		};
		let rotated = rotated.as_ref().map(|secret| secret.expose());

		match self.store.store_refreshed_access_token(refresh_token, rotated, Some(&token)).await {
			Ok(RefreshStoreOutcome::Stored) => Ok(token),
			Ok(RefreshStoreOutcome::RefreshTokenReplaced) =>
				Err("the refresh token was replaced while the exchange was in flight".into()),
			Err(e) => Err(e.to_string()),
		}
	}

	fn drain(&self, outcome: RefreshOutcome) {
		let waiters = {
			let mut state = self.state.lock();

			state.refreshing = false;
			state.generation = state.generation.wrapping_add(1);

			mem::take(&mut state.waiters)
		};

		obs::refresh_event("drained access token waiters", waiters.len());

		for waiter in waiters {
			// A receiver is gone only if its caller stopped waiting.
			let _ = waiter.send(outcome.clone());
		}
	}
}
impl Debug for RefreshCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("RefreshCoordinator")
			.field("refreshing", &state.refreshing)
			.field("waiters", &state.waiters.len())
			.field("metrics", &self.metrics)
			.finish()
	}
}

// Drains the queue even when the leader's future is dropped mid-exchange, so waiters are
// rejected instead of hanging and the coordinator returns to idle.
struct DrainOnDrop<'a> {
	coordinator: &'a RefreshCoordinator,
	outcome: Option<RefreshOutcome>,
}
impl Drop for DrainOnDrop<'_> {
	fn drop(&mut self) {
		let outcome = self.outcome.take().unwrap_or_else(|| {
			self.coordinator.metrics.record_failure();

			Err("the refresh exchange was abandoned before completing".into())
		});

		self.coordinator.drain(outcome);
	}
}
