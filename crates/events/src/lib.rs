//! Conclave notification infrastructure.
//!
//! The engine treats delivery as someone else's problem: it emits
//! [`Notification`]s through the fire-and-forget
//! [`NotificationDispatcher`] trait and asks the
//! [`DocumentStateCollaborator`] to move linked documents. This crate
//! provides those traits, the in-process [`NotificationBus`]
//! (publish/subscribe over `tokio::sync::broadcast`), and null
//! implementations for tests.

pub mod bus;
pub mod dispatch;

pub use bus::{Notification, NotificationBus};
pub use dispatch::{
    BusDispatcher, DocumentStateCollaborator, NotificationDispatcher, NullDispatcher,
    NullDocumentCollaborator,
};
