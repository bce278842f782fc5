mod cache;
mod engine;
mod prefetch;
mod signal;

pub use cache::{AudioCache, ClipRequest, Ledger, Lookup};
pub use engine::{EventSink, NarrationEvent, Narrator};
pub use signal::{NarrationSignal, SignalCell};
