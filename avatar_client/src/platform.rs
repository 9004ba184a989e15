//! Platform event plumbing.
//!
//! Keyboard, pointer, and viewport callbacks never touch simulation state
//! directly. They post `PlatformEvent`s into a channel owned by the simulation
//! context, which applies them at the start of the next tick. Disposing the
//! context closes the channel, which detaches every listener at once: later
//! posts are rejected.

use anyhow::bail;
use tokio::sync::mpsc;
use tracing::debug;

/// Everything the view can report to the simulation.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformEvent {
    KeyDown(String),
    KeyUp(String),
    /// Relative pointer movement (`movementX`, `movementY`).
    PointerMove { dx: f32, dy: f32 },
    /// Click on the render surface; asks for pointer capture.
    Click,
    /// Pointer capture engaged or released by the platform.
    PointerLockChanged(bool),
    /// The view lost focus; held keys are forgotten.
    Blur,
    Resize { width: u32, height: u32 },
    /// The view is being torn down.
    Unmount,
}

/// Listener-side handle. Cheap to clone; one per registered callback.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<PlatformEvent>,
}

impl EventSender {
    /// Posts an event. Returns false once the context has been disposed.
    pub fn post(&self, event: PlatformEvent) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                debug!(?event, "Listener detached, event dropped");
                false
            }
        }
    }

    pub fn is_detached(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Context-side end of the platform channel.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<PlatformEvent>,
}

impl EventReceiver {
    pub fn try_next(&mut self) -> Option<PlatformEvent> {
        self.rx.try_recv().ok()
    }

    pub fn close(&mut self) {
        self.rx.close();
    }
}

pub fn platform_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventReceiver { rx })
}

/// Pointer-capture requests. The platform may refuse.
pub trait PointerLock: Send {
    /// Asks for capture. A grant arrives later as `PointerLockChanged(true)`.
    fn request(&mut self) -> anyhow::Result<()>;
}

/// Grants every request by posting the lock-change event back.
pub struct AutoPointerLock {
    events: EventSender,
}

impl AutoPointerLock {
    pub fn new(events: EventSender) -> Self {
        Self { events }
    }
}

impl PointerLock for AutoPointerLock {
    fn request(&mut self) -> anyhow::Result<()> {
        if !self.events.post(PlatformEvent::PointerLockChanged(true)) {
            bail!("view detached");
        }
        Ok(())
    }
}

/// Refuses every request (sandboxed frames, tests).
#[derive(Default)]
pub struct DeniedPointerLock;

impl PointerLock for DeniedPointerLock {
    fn request(&mut self) -> anyhow::Result<()> {
        bail!("pointer lock denied by platform")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closing_receiver_detaches_senders() {
        let (tx, mut rx) = platform_channel();
        let other = tx.clone();
        assert!(tx.post(PlatformEvent::KeyDown("KeyW".into())));
        rx.close();
        assert!(!other.post(PlatformEvent::Click));
        assert!(tx.is_detached());
        // Events queued before closing are still delivered.
        assert_eq!(rx.try_next(), Some(PlatformEvent::KeyDown("KeyW".into())));
        assert_eq!(rx.try_next(), None);
    }

    #[test]
    fn auto_lock_posts_grant() {
        let (tx, mut rx) = platform_channel();
        let mut lock = AutoPointerLock::new(tx);
        lock.request().unwrap();
        assert_eq!(rx.try_next(), Some(PlatformEvent::PointerLockChanged(true)));
    }

    #[test]
    fn denied_lock_errors() {
        assert!(DeniedPointerLock.request().is_err());
    }
}
