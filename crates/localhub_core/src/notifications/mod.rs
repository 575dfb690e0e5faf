//! Notification fan-out, rendering adapters and delivery.
//!
//! # Responsibility
//! - Select recipients for each notifying use case ([`fanout`]).
//! - Map content types to adapters that allow verbs and render messages
//!   ([`adapter`], [`registry`]).
//! - Persist notifications and hand them to email/web-push channels
//!   ([`dispatch`], [`channels`]).
//!
//! # Invariants
//! - A notification whose verb its adapter does not allow is stored but
//!   never delivered.
//! - Channel failures never abort a dispatch run.

pub mod adapter;
pub mod channels;
pub mod dispatch;
pub mod fanout;
pub mod registry;

pub use adapter::{Adapter, AdapterContext, ObjectSummary, WebpushPayload};
pub use channels::{
    ChannelError, EmailMessage, EmailSender, MemoryEmailOutbox, MemoryPushOutbox, PushMessage,
    PushSender,
};
pub use dispatch::{DispatchReport, Dispatcher, NotificationError};
pub use fanout::FanOut;
pub use registry::{AdapterRegistry, RegistryError};
