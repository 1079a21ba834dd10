//! The thought buffer — Anna's prioritized, deduplicated, bounded inbox
//!
//! Many producers, one consumer. Producers get a cloneable [`ThoughtSink`]
//! that exposes only `add`; the scheduler drains through the buffer itself.
//! All critical sections are short and synchronous — nothing awaits while
//! the internal lock is held.

mod buffer;
mod sink;
mod stats;

pub use buffer::ThoughtBuffer;
pub use sink::ThoughtSink;
pub use stats::BufferStats;
