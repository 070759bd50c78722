//! Agent messaging: envelopes, the delivery queue and fan-in reports.
//!
//! Mechanics only. Routing decisions (which agent receives what) belong to
//! the orchestrator; this crate only defines what travels and how it queues.

pub mod envelope;
pub mod queue;
pub mod report;

pub use envelope::{AgentMessage, MessageType, Payload, Priority, Source, Target};
pub use queue::{MessageSink, QueueClosed, QueueReceiver, QueueSender, unbounded};
pub use report::{AgentReply, DeliveryFailure, DeliveryReport};
