//! Message protocol: envelope, kinds, correlation, channel naming.

pub mod channels;
pub mod correlation;
pub mod messages;

pub use channels::{ChannelKind, ChannelSet};
pub use correlation::CorrelationTracker;
pub use messages::{decode, encode, DecodeError, Envelope, MessageBody, ResultPayload, KNOWN_KINDS};
