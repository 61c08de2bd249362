//! Adapter from an `opentelemetry` tracer to the [`Tracer`] seam.

use opentelemetry::global::{self, BoxedTracer};
use opentelemetry::trace::{
    self as otel, Span as _, SpanId, TraceContextExt, TraceId, TraceState, Tracer as _,
    TracerProvider as _,
};
use opentelemetry::{Context, InstrumentationScope, KeyValue};

use super::{SpanContext, SpanStart, TraceFlags, TraceSpan, Tracer};
use crate::config::TelemetryConfig;

/// Starts relay spans on an OpenTelemetry tracer.
#[derive(Debug, Clone)]
pub struct OtelTracer<T> {
    tracer: T,
}

impl<T> OtelTracer<T> {
    /// Wrap `tracer`.
    pub fn new(tracer: T) -> Self {
        Self { tracer }
    }
}

impl OtelTracer<BoxedTracer> {
    /// Tracer from the globally installed provider, scoped by `config`.
    ///
    /// `endpoint` is left to whoever installs the provider and exporter.
    pub fn from_global(config: &TelemetryConfig) -> Self {
        let scope = InstrumentationScope::builder(config.tracer_name.clone())
            .with_version(config.tracer_version.clone())
            .with_attributes([KeyValue::new("service.name", config.service_name.clone())])
            .build();
        Self::new(global::tracer_provider().tracer_with_scope(scope))
    }
}

/// A span started by [`OtelTracer`].
#[derive(Debug)]
pub struct OtelSpan<S>(pub S);

impl<S: otel::Span> TraceSpan for OtelSpan<S> {
    fn span_context(&self) -> SpanContext {
        let context = self.0.span_context();
        SpanContext::new(
            context.trace_id().to_string(),
            context.span_id().to_string(),
            TraceFlags::new(context.trace_flags().to_u8()),
        )
    }
}

impl<T> Tracer for OtelTracer<T>
where
    T: otel::Tracer + Send + Sync,
    T::Span: Send + Sync + 'static,
{
    type Span = OtelSpan<T::Span>;

    fn start_span(&self, start: SpanStart) -> Self::Span {
        let parent = start
            .parent
            .as_ref()
            .and_then(remote_context)
            .map(|remote| Context::new().with_remote_span_context(remote))
            .unwrap_or_default();

        let span = self
            .tracer
            .span_builder(start.name)
            .with_start_time(start.start_time)
            .with_attributes(
                start
                    .attributes
                    .into_iter()
                    .map(|(key, value)| KeyValue::new(key, value)),
            )
            .start_with_context(&self.tracer, &parent);
        OtelSpan(span)
    }
}

fn remote_context(context: &SpanContext) -> Option<otel::SpanContext> {
    let trace_id = TraceId::from_hex(&context.trace_id).ok()?;
    let span_id = SpanId::from_hex(&context.span_id).ok()?;
    Some(otel::SpanContext::new(
        trace_id,
        span_id,
        otel::TraceFlags::new(context.trace_flags.to_u8()),
        true,
        TraceState::default(),
    ))
}
