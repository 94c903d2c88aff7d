//! IO modules - external collaborator boundaries
//!
//! This module defines the capabilities the engine consumes but does not own:
//! - `stores` - async traits for tickets, checkouts, inventory, notifications,
//!   zone configuration and the injectable clock
//! - `memory` - in-memory implementations (test substrate and sim wiring)

pub mod memory;
pub mod stores;

// Re-export commonly used types
pub use stores::{
    CheckoutRecord, CheckoutStore, Clock, Lot, NotificationSink, ParkingInventory, SystemClock,
    TicketStore, ZoneConfigStore,
};
