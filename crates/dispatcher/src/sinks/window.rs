//! Time window computation and path expansion for the file sink

use chrono::DateTime;
use contracts::ContractError;
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::warn;

/// Smallest accepted window size, in seconds
pub const MIN_WINDOW_SIZE: u64 = 60;

/// File name time suffix appended to the prefix
const FILE_TIME_FORMAT: &str = "%Y%m%d%H%M";

/// When a new file window has to be opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    /// Window length in seconds, 0 = never rotate
    size: u64,
    /// Align window starts to multiples of `size`
    align: bool,
}

impl WindowPolicy {
    /// Create a policy, raising sizes below the minimum
    pub fn new(size: u64, align: bool) -> Self {
        let size = if size != 0 && size < MIN_WINDOW_SIZE {
            warn!(
                requested = size,
                min = MIN_WINDOW_SIZE,
                "Window size too small, using minimum"
            );
            MIN_WINDOW_SIZE
        } else {
            size
        };
        Self { size, align }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Start of the window containing `now`
    pub fn start_for(&self, now: i64) -> i64 {
        if self.size == 0 || !self.align {
            return now;
        }
        let size = self.size as i64;
        now.div_euclid(size) * size
    }

    /// Start time of the window that should be open at `now`, if it differs from `open`
    pub fn next_window(&self, open: Option<i64>, now: i64) -> Option<i64> {
        let Some(open) = open else {
            return Some(self.start_for(now));
        };

        if self.size == 0 {
            return None;
        }

        if self.align {
            let current = self.start_for(now);
            (current != open).then_some(current)
        } else {
            (now >= open + self.size as i64).then_some(now)
        }
    }
}

/// Expand the directory template and file prefix for a window starting at `start`
pub fn window_path(template: &str, prefix: &str, start: i64) -> Result<PathBuf, ContractError> {
    let time = DateTime::from_timestamp(start, 0)
        .ok_or_else(|| ContractError::Other(format!("window start {start} out of range")))?;

    let mut dir = String::new();
    write!(dir, "{}", time.format(template)).map_err(|_| {
        ContractError::config_validation("path_pattern", format!("invalid template '{template}'"))
    })?;

    let mut file = String::from(prefix);
    // The fixed format string cannot fail
    let _ = write!(file, "{}", time.format(FILE_TIME_FORMAT));

    Ok(PathBuf::from(dir).join(file))
}
