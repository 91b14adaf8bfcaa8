//! Out-of-band log and progress notifications.
//!
//! Sideband frames (`*L`, `*P`) may be interleaved any number of times
//! before a call's terminating result frame. The session parses them and
//! hands them to a [`SidebandHandler`]; the default forwards to `tracing`.

use tracing::{debug, info, trace, warn};

/// One `*L <module> <vlevel> "<message>"` log frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFrame {
    pub module: String,
    /// Verbosity level as reported by the server; higher is chattier.
    pub level: i64,
    pub message: String,
}

/// One `*P` progress frame visible to the handler.
///
/// A kill frame (`*P K <ptr>`) closes the bar inside the session and is not
/// forwarded; handlers see a begin, then updates, and infer completion from
/// the call finishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressFrame {
    Begin { ptr: u64, steps: u64, title: String },
    Update { ptr: u64, pos: u64 },
}

/// Receives sideband notifications during a call.
pub trait SidebandHandler {
    fn log(&mut self, frame: LogFrame);
    fn progress(&mut self, frame: ProgressFrame);
}

/// Default handler: everything goes to `tracing` on the client side.
#[derive(Debug, Default)]
pub struct TracingSideband;

impl SidebandHandler for TracingSideband {
    fn log(&mut self, frame: LogFrame) {
        match frame.level {
            0..=4 => info!(module = %frame.module, level = frame.level, "{}", frame.message),
            5..=9 => debug!(module = %frame.module, level = frame.level, "{}", frame.message),
            _ => trace!(module = %frame.module, level = frame.level, "{}", frame.message),
        }
    }

    fn progress(&mut self, frame: ProgressFrame) {
        match frame {
            ProgressFrame::Begin { ptr, steps, title } => {
                debug!(ptr, steps, title, "remote progress started");
            }
            ProgressFrame::Update { ptr, pos } => {
                trace!(ptr, pos, "remote progress");
            }
        }
    }
}

/// Tracks which progress bars the server currently has open, so stray
/// updates and kills can be flagged.
#[derive(Debug, Default)]
pub(crate) struct ProgressRegistry {
    open: Vec<u64>,
}

impl ProgressRegistry {
    pub(crate) fn begin(&mut self, ptr: u64) {
        if self.open.contains(&ptr) {
            warn!(ptr, "progress bar restarted while open");
        } else {
            self.open.push(ptr);
        }
    }

    pub(crate) fn update(&mut self, ptr: u64) {
        if !self.open.contains(&ptr) {
            warn!(ptr, "progress update for unknown bar");
        }
    }

    pub(crate) fn kill(&mut self, ptr: u64) {
        match self.open.iter().position(|&open| open == ptr) {
            Some(index) => {
                self.open.remove(index);
                debug!(ptr, "remote progress finished");
            }
            None => warn!(ptr, "progress kill for unknown bar"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_tracks_open_bars() {
        let mut registry = ProgressRegistry::default();
        registry.begin(7);
        registry.update(7);
        registry.kill(7);
        assert!(registry.open.is_empty());
    }

    #[test]
    fn registry_survives_stray_frames() {
        let mut registry = ProgressRegistry::default();
        registry.update(1);
        registry.kill(2);
        registry.begin(3);
        registry.begin(3);
        assert_eq!(registry.open, vec![3]);
    }
}
