use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("cligpt.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("cligpt.client.request_errors");
pub(crate) static CLIENT_HEADERS_LATENCY: Moments =
    Moments::new("cligpt.client.headers_latency_seconds");
pub(crate) static IMAGE_REQUESTS: Counter = Counter::new("cligpt.client.image_requests");

pub(crate) static STREAM_FRAMES: Counter = Counter::new("cligpt.stream.frames");
pub(crate) static STREAM_BYTES: Counter = Counter::new("cligpt.stream.bytes");
pub(crate) static STREAM_SOFT_ENDS: Counter = Counter::new("cligpt.stream.soft_ends");

pub(crate) static STORE_WRITES: Counter = Counter::new("cligpt.store.writes");
pub(crate) static STORE_READS: Counter = Counter::new("cligpt.store.reads");

pub(crate) static CHAT_TURNS: Counter = Counter::new("cligpt.chat.turns");
pub(crate) static CHAT_TURN_FAILURES: Counter = Counter::new("cligpt.chat.turn_failures");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: &Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_HEADERS_LATENCY);
    collector.register_counter(&IMAGE_REQUESTS);

    collector.register_counter(&STREAM_FRAMES);
    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_SOFT_ENDS);

    collector.register_counter(&STORE_WRITES);
    collector.register_counter(&STORE_READS);

    collector.register_counter(&CHAT_TURNS);
    collector.register_counter(&CHAT_TURN_FAILURES);
}
