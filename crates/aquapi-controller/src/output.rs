use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

#[cfg(target_os = "linux")]
use crate::ControllerError;
use crate::Result;

// ─── Level ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Off,
    On,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Off => f.write_str("off"),
            Level::On => f.write_str("on"),
        }
    }
}

/// A single digital output driving one pump.
pub trait OutputLine {
    fn set(&mut self, level: Level) -> Result<()>;
}

// ─── Chip selection ───────────────────────────────────────────────────────

/// Board identification exposed by the device tree.
pub const DEVICE_TREE_MODEL: &str = "/proc/device-tree/model";

/// GPIO character device for a board model string. The Pi 5 header hangs off
/// the RP1 controller, which the kernel registers as `gpiochip4`.
pub fn chip_for_model(model: &str) -> PathBuf {
    if model.contains("Raspberry Pi 5") {
        PathBuf::from("/dev/gpiochip4")
    } else {
        PathBuf::from("/dev/gpiochip0")
    }
}

/// Pick the chip for this board from `model_path`; unreadable models fall
/// back to `/dev/gpiochip0`.
pub fn detect_chip(model_path: &Path) -> PathBuf {
    match fs::read(model_path) {
        Ok(raw) => {
            let model = String::from_utf8_lossy(&raw);
            let model = model.trim_matches(|c: char| c == '\0' || c.is_whitespace());
            tracing::info!(model, "detected board");
            chip_for_model(model)
        }
        Err(e) => {
            tracing::debug!(path = %model_path.display(), error = %e, "board model unavailable");
            chip_for_model("")
        }
    }
}

// ─── CdevLine ─────────────────────────────────────────────────────────────

/// One output line requested from a GPIO character device.
///
/// The request is held for the life of the value and released when it is
/// dropped. With `active_low` the kernel inverts the physical level, so
/// `Level::On` always means pump running.
#[cfg(target_os = "linux")]
pub struct CdevLine {
    chip: PathBuf,
    offset: u32,
    handle: gpio_cdev::LineHandle,
}

#[cfg(target_os = "linux")]
impl CdevLine {
    pub fn open(chip: impl Into<PathBuf>, offset: u32, active_low: bool) -> Result<Self> {
        use gpio_cdev::{Chip, LineRequestFlags};

        let chip = chip.into();
        let gpio_err = |source| ControllerError::Gpio {
            chip: chip.clone(),
            offset,
            source,
        };
        let mut flags = LineRequestFlags::OUTPUT;
        if active_low {
            flags |= LineRequestFlags::ACTIVE_LOW;
        }
        let handle = Chip::new(&chip)
            .and_then(|mut c| c.get_line(offset))
            .and_then(|line| line.request(flags, 0, "aquapi"))
            .map_err(gpio_err)?;
        tracing::debug!(chip = %chip.display(), offset, active_low, "gpio line requested");
        Ok(Self {
            chip,
            offset,
            handle,
        })
    }

    pub fn chip(&self) -> &Path {
        &self.chip
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }
}

#[cfg(target_os = "linux")]
impl fmt::Debug for CdevLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdevLine")
            .field("chip", &self.chip)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

#[cfg(target_os = "linux")]
impl OutputLine for CdevLine {
    fn set(&mut self, level: Level) -> Result<()> {
        let value = u8::from(level == Level::On);
        self.handle
            .set_value(value)
            .map_err(|source| ControllerError::Gpio {
                chip: self.chip.clone(),
                offset: self.offset,
                source,
            })
    }
}

// ─── SimulatedLine ────────────────────────────────────────────────────────

/// In-memory output used for dry runs and tests. Every `set` is appended to
/// a shared history.
#[derive(Debug, Default)]
pub struct SimulatedLine {
    history: LineHistory,
}

impl SimulatedLine {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that stays readable after the line is moved into a loop.
    pub fn history(&self) -> LineHistory {
        self.history.clone()
    }
}

impl OutputLine for SimulatedLine {
    fn set(&mut self, level: Level) -> Result<()> {
        tracing::info!(%level, "simulated output");
        self.history.push(level);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct LineHistory(Arc<Mutex<Vec<Level>>>);

impl LineHistory {
    fn push(&self, level: Level) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(level);
    }

    /// Every level written, oldest first.
    pub fn levels(&self) -> Vec<Level> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// The level last written, `None` before the first write.
    pub fn current(&self) -> Option<Level> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .copied()
    }
}

// ─── LineGuard ────────────────────────────────────────────────────────────

/// Owns an output line and guarantees it ends OFF.
///
/// The line is driven OFF when the guard is created and again when it is
/// dropped, including during panic unwinding.
#[derive(Debug)]
pub struct LineGuard<L: OutputLine> {
    line: L,
    level: Level,
}

impl<L: OutputLine> LineGuard<L> {
    pub fn new(mut line: L) -> Result<Self> {
        line.set(Level::Off)?;
        Ok(Self {
            line,
            level: Level::Off,
        })
    }

    pub fn set(&mut self, level: Level) -> Result<()> {
        self.line.set(level)?;
        self.level = level;
        Ok(())
    }

    pub fn level(&self) -> Level {
        self.level
    }
}

impl<L: OutputLine> Drop for LineGuard<L> {
    fn drop(&mut self) {
        match self.line.set(Level::Off) {
            Ok(()) => tracing::debug!("output forced off"),
            Err(e) => tracing::error!(error = %e, "failed to force output off"),
        }
    }
}
