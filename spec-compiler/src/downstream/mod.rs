//! Forwarding of compiled specs to their consumer.

mod sender;

pub use sender::{DownstreamContext, DownstreamError, DownstreamSender, LoggingDownstreamSender};
