//! Pipeline instrumentation behind the `tracing` feature.
//!
//! Spans and events share the `detpost` target so a subscriber can filter
//! the whole pipeline with one directive. Events name their stage in a
//! `stage` field. Without the feature both macros expand to inert code, and
//! event values are still evaluated so call sites compile the same way.

#[cfg(feature = "tracing")]
macro_rules! trace_span {
    ($stage:expr $(, $($field:tt)*)?) => {
        tracing::span!(target: "detpost", tracing::Level::INFO, $stage $(, $($field)*)?)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_span {
    ($stage:expr $(, $($field:tt)*)?) => {
        $crate::trace::NoopSpan::new($stage)
    };
}

#[cfg(feature = "tracing")]
macro_rules! trace_event {
    ($stage:expr $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::event!(
            target: "detpost",
            tracing::Level::INFO,
            stage = $stage
            $(, $key = $value)*
        )
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_event {
    ($stage:expr $(, $key:ident = $value:expr)* $(,)?) => {
        let _ = ($stage $(, $value)*);
    };
}

pub(crate) use trace_event;
pub(crate) use trace_span;

/// Span guard used when tracing is compiled out.
#[cfg(not(feature = "tracing"))]
pub(crate) struct NoopSpan;

#[cfg(not(feature = "tracing"))]
impl NoopSpan {
    #[inline]
    pub(crate) fn new(_stage: &'static str) -> Self {
        Self
    }

    #[inline]
    pub(crate) fn entered(self) -> Self {
        self
    }
}
