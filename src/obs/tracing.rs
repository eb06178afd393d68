// self
use crate::{_prelude::*, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// Span wrapper used around token exchanges and API requests.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("metry_sdk.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a debug event about the refresh coordinator's state; a no-op without `tracing`.
pub(crate) fn refresh_event(message: &'static str, waiters: usize) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(flow = FlowKind::Refresh.as_str(), waiters, "{message}");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (message, waiters);
	}
}

/// Emits a warning about a refresh side effect that failed; a no-op without `tracing`.
pub(crate) fn refresh_warning(message: &'static str, error: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(flow = FlowKind::Refresh.as_str(), error = %error, "{message}");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (message, error);
	}
}
