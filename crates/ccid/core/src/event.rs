//! Device lifecycle events
//!
//! The host integration owns USB discovery and permission handling. It reports
//! what happened through [`DeviceLink::notify`], which validates the transition
//! and forwards the event to a [`DeviceEventHandler`]. Nothing in this crate
//! calls back into the host on its own.

use std::fmt;

use tracing::{debug, warn};

/// Lifecycle event reported by the host integration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A reader was plugged in
    Attached,
    /// Access was granted and the bulk endpoints are open
    Ready,
    /// The reader was unplugged
    Detached,
}

/// Current state of the reader link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    /// No reader present
    #[default]
    Detached,
    /// Reader present but not yet usable
    Attached,
    /// Reader usable for exchanges
    Ready,
}

/// Event that is not valid in the current link state
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Device event {event:?} is not valid while {state:?}")]
pub struct TransitionError {
    /// State the link was in
    pub state: LinkState,
    /// Rejected event
    pub event: DeviceEvent,
}

/// Trait for handling device lifecycle events
pub trait DeviceEventHandler {
    /// Handle a device event
    fn handle_event(&mut self, event: DeviceEvent);
}

// Implement handlers for closures
impl<F> DeviceEventHandler for F
where
    F: FnMut(DeviceEvent),
{
    fn handle_event(&mut self, event: DeviceEvent) {
        self(event)
    }
}

/// Tracks the reader link state and dispatches accepted events
pub struct DeviceLink<H> {
    state: LinkState,
    handler: H,
}

impl<H> fmt::Debug for DeviceLink<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceLink")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<H: DeviceEventHandler> DeviceLink<H> {
    /// Create a detached link
    pub const fn new(handler: H) -> Self {
        Self {
            state: LinkState::Detached,
            handler,
        }
    }

    /// Current link state
    pub const fn state(&self) -> LinkState {
        self.state
    }

    /// Whether exchanges can be made
    pub const fn is_ready(&self) -> bool {
        matches!(self.state, LinkState::Ready)
    }

    /// Apply an event and forward it to the handler
    ///
    /// Out-of-order events leave the state unchanged and are not forwarded.
    pub fn notify(&mut self, event: DeviceEvent) -> Result<LinkState, TransitionError> {
        let next = match (self.state, event) {
            (LinkState::Detached, DeviceEvent::Attached) => LinkState::Attached,
            (LinkState::Attached, DeviceEvent::Ready) => LinkState::Ready,
            (LinkState::Attached | LinkState::Ready, DeviceEvent::Detached) => LinkState::Detached,
            (state, event) => {
                warn!(?state, ?event, "Ignoring out-of-order device event");
                return Err(TransitionError { state, event });
            }
        };

        debug!(from = ?self.state, to = ?next, "Device link transition");
        self.state = next;
        self.handler.handle_event(event);
        Ok(next)
    }

    /// Take ownership of the handler
    pub fn into_handler(self) -> H {
        self.handler
    }
}
