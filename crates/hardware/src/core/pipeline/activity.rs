//! Per-cycle activity recording.
//!
//! Each stage marks itself active when it did something this cycle or holds work that can
//! progress next cycle. An externally triggered event (a thread being activated) marks the
//! CPU itself. A cycle with no activity lets the driver skip ahead to the next scheduled event.

use std::fmt;

/// Sources of activity within one cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Activity {
    /// External events such as thread activation.
    Cpu = 1 << 0,
    /// Fetch1.
    Fetch1 = 1 << 1,
    /// Fetch2.
    Fetch2 = 1 << 2,
    /// Decode.
    Decode = 1 << 3,
    /// Execute.
    Execute = 1 << 4,
}

impl Activity {
    const ALL: [(Self, &'static str); 5] = [
        (Self::Cpu, "cpu"),
        (Self::Fetch1, "fetch1"),
        (Self::Fetch2, "fetch2"),
        (Self::Decode, "decode"),
        (Self::Execute, "execute"),
    ];
}

/// Activity bits for the current cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActivityRecorder {
    bits: u8,
}

impl ActivityRecorder {
    /// Marks `source` active.
    pub const fn activate(&mut self, source: Activity) {
        self.bits |= source as u8;
    }

    /// Whether `source` is marked.
    pub const fn is_active(&self, source: Activity) -> bool {
        self.bits & source as u8 != 0
    }

    /// Whether anything is marked.
    pub const fn any(&self) -> bool {
        self.bits != 0
    }

    /// Clears every mark.
    pub const fn clear(&mut self) {
        self.bits = 0;
    }
}

impl fmt::Display for ActivityRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Activity::ALL
            .iter()
            .filter(|(source, _)| self.is_active(*source))
            .map(|&(_, name)| name)
            .collect();
        if names.is_empty() {
            write!(f, "idle")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}
