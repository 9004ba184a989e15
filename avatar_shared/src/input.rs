//! Input handling.
//!
//! Platform key codes are mapped to logical keys once, at the event edge. The
//! simulation only ever sees `Keys` and an accumulated pointer delta.
//!
//! Writers: platform event handlers (`press`, `release`, `pointer_moved`,
//! `set_pointer_locked`). Reader: the frame loop, once per tick.

bitflags::bitflags! {
    /// Logical keys currently held.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Keys: u8 {
        const FORWARD = 1 << 0;
        const BACK = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
        const JUMP = 1 << 4;
        const MOVEMENT = Self::FORWARD.bits()
            | Self::BACK.bits()
            | Self::LEFT.bits()
            | Self::RIGHT.bits();
    }
}

impl Keys {
    /// Maps a physical key code (`KeyboardEvent.code` naming) to a logical key.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "KeyW" | "ArrowUp" => Some(Self::FORWARD),
            "KeyS" | "ArrowDown" => Some(Self::BACK),
            "KeyA" | "ArrowLeft" => Some(Self::LEFT),
            "KeyD" | "ArrowRight" => Some(Self::RIGHT),
            "Space" => Some(Self::JUMP),
            _ => None,
        }
    }
}

/// Pointer movement accumulated since the last consumption.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LookDelta {
    pub dx: f32,
    pub dy: f32,
}

impl LookDelta {
    pub fn is_zero(self) -> bool {
        self.dx == 0.0 && self.dy == 0.0
    }
}

/// User input state at a moment in time.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    held: Keys,
    pointer_locked: bool,
    look: LookDelta,
}

impl InputState {
    /// Records a key-down by code. Returns false for unmapped codes.
    pub fn press(&mut self, code: &str) -> bool {
        match Keys::from_code(code) {
            Some(key) => {
                self.held.insert(key);
                true
            }
            None => false,
        }
    }

    /// Records a key-up by code. Returns false for unmapped codes.
    pub fn release(&mut self, code: &str) -> bool {
        match Keys::from_code(code) {
            Some(key) => {
                self.held.remove(key);
                true
            }
            None => false,
        }
    }

    pub fn held(&self) -> Keys {
        self.held
    }

    pub fn is_held(&self, key: Keys) -> bool {
        self.held.intersects(key)
    }

    /// True when any of the four direction keys is down.
    pub fn is_moving(&self) -> bool {
        self.held.intersects(Keys::MOVEMENT)
    }

    pub fn pointer_locked(&self) -> bool {
        self.pointer_locked
    }

    /// Engages or releases pointer capture. Releasing drops any pending delta.
    pub fn set_pointer_locked(&mut self, locked: bool) {
        self.pointer_locked = locked;
        if !locked {
            self.look = LookDelta::default();
        }
    }

    /// Accumulates a pointer movement. Ignored unless the pointer is captured.
    pub fn pointer_moved(&mut self, dx: f32, dy: f32) {
        if !self.pointer_locked {
            return;
        }
        self.look.dx += dx;
        self.look.dy += dy;
    }

    /// Returns and resets the accumulated pointer delta.
    pub fn take_look_delta(&mut self) -> LookDelta {
        std::mem::take(&mut self.look)
    }

    /// Forgets every held key (e.g. when the view loses focus).
    pub fn clear(&mut self) {
        self.held = Keys::empty();
        self.look = LookDelta::default();
    }
}
