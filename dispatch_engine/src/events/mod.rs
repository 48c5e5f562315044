//! Event hooks and the real-time fan-out.
//!
//! State changes in the engine are published as [`RealtimeEvent`]s addressed to a [`Channel`], and as
//! [`NotificationRequest`]s for the outbound email collaborator. The engine never waits on a consumer: events are
//! queued on bounded channels and handled by whatever hooks the host process registered in [`EventHooks`].
mod channel;
mod event_types;
mod hooks;
mod publisher;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
pub use publisher::Publisher;
