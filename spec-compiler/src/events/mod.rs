//! Observability and status publication.
//!
//! - [`EventSink`]: in-process observations from components that recover
//!   locally
//! - [`StatusPublisher`]: plan status events delivered to the scheduler
//!   over a [`TopicTransport`]

mod publisher;
mod sink;
mod transport;

pub use publisher::{PublishError, PublishReport, StatusPublisher};
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
pub use transport::{PubSubRestTransport, TopicTransport, TransportCode, TransportError};
