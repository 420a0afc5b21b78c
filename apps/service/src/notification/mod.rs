//! Outbound alerts for status changes and certificate conditions.

pub mod delivery;
pub mod dispatcher;
pub mod events;
pub mod message;

pub use delivery::{Deliver, DeliveryError, WebhookSender};
pub use dispatcher::{DispatchSummary, NotificationDispatcher};
pub use events::{NotificationEvent, Trigger};
