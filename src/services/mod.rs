//! Services - business logic and state management
//!
//! This module contains the core business logic services:
//! - `engine` - facade wiring the components, exposed API surface
//! - `tracker` - per-subject position history and geofence exit decision
//! - `zones` - in-memory registry of per-lot auto-checkout configuration
//! - `coordinator` - checkout state machine (initiate/confirm/cancel)
//! - `scheduler` - delayed-task primitive for confirmation timers

pub mod coordinator;
pub mod engine;
pub mod scheduler;
pub mod tracker;
pub mod zones;

// Re-export commonly used types
pub use coordinator::CheckoutCoordinator;
pub use engine::{CheckoutEngine, Collaborators};
pub use scheduler::{Scheduler, TokioScheduler};
pub use tracker::PositionTracker;
pub use zones::ZoneRegistry;
