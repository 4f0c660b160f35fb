use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("chatstream.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("chatstream.client.request_errors");
pub(crate) static CLIENT_CANCELLATIONS: Counter = Counter::new("chatstream.client.cancellations");
pub(crate) static CLIENT_EXCHANGE_DURATION: Moments =
    Moments::new("chatstream.client.exchange_duration_seconds");

pub(crate) static STREAM_BYTES: Counter = Counter::new("chatstream.stream.bytes");
pub(crate) static STREAM_LINES: Counter = Counter::new("chatstream.stream.lines");
pub(crate) static STREAM_INCREMENTS: Counter = Counter::new("chatstream.stream.increments");
pub(crate) static STREAM_FALLBACKS: Counter = Counter::new("chatstream.stream.fallbacks");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("chatstream.stream.errors");
pub(crate) static STREAM_TTFB: Moments = Moments::new("chatstream.stream.ttfb_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_counter(&CLIENT_CANCELLATIONS);
    collector.register_moments(&CLIENT_EXCHANGE_DURATION);

    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_LINES);
    collector.register_counter(&STREAM_INCREMENTS);
    collector.register_counter(&STREAM_FALLBACKS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_moments(&STREAM_TTFB);
}
