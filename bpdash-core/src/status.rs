use serde::{Deserialize, Serialize};
use std::fmt;

/// Health of a monitored service, as reported by the checker.
///
/// Encoded on the wire as its integer code (`0..=3`). Toggling walks the
/// four values cyclically, see [`CheckState::next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub enum CheckState {
    #[default]
    Ok = 0,
    Warn = 1,
    Critical = 2,
    Unknown = 3,
}

impl CheckState {
    pub const ALL: [CheckState; 4] = [
        CheckState::Ok,
        CheckState::Warn,
        CheckState::Critical,
        CheckState::Unknown,
    ];

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(CheckState::Ok),
            1 => Some(CheckState::Warn),
            2 => Some(CheckState::Critical),
            3 => Some(CheckState::Unknown),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Next state in the toggle cycle: `(code + 1) mod 4`.
    pub fn next(self) -> Self {
        Self::ALL[(self.code() as usize + 1) % Self::ALL.len()]
    }

    pub fn label(self) -> &'static str {
        match self {
            CheckState::Ok => "ok",
            CheckState::Warn => "warn",
            CheckState::Critical => "critical",
            CheckState::Unknown => "unknown",
        }
    }

    /// Class applied to the rendered status badge.
    pub fn css_class(self) -> &'static str {
        match self {
            CheckState::Ok => "good",
            CheckState::Warn => "warning",
            CheckState::Critical => "bad",
            CheckState::Unknown => "unknown",
        }
    }
}

impl TryFrom<i64> for CheckState {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        CheckState::from_code(code).ok_or_else(|| format!("check state {code} out of range 0..=3"))
    }
}

impl From<CheckState> for u8 {
    fn from(state: CheckState) -> Self {
        state.code()
    }
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Status of one timeline frame.
///
/// Raw codes: `0 -> ok`, `1 -> nok`, `9 -> inexisting`, anything else is `unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum FrameStatus {
    Ok,
    Nok,
    Unknown,
    Inexisting,
}

impl FrameStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => FrameStatus::Ok,
            1 => FrameStatus::Nok,
            9 => FrameStatus::Inexisting,
            _ => FrameStatus::Unknown,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            FrameStatus::Ok => 0,
            FrameStatus::Nok => 1,
            FrameStatus::Unknown => 2,
            FrameStatus::Inexisting => 9,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FrameStatus::Ok => "ok",
            FrameStatus::Nok => "nok",
            FrameStatus::Unknown => "unknown",
            FrameStatus::Inexisting => "inexisting",
        }
    }
}

impl From<i64> for FrameStatus {
    fn from(code: i64) -> Self {
        FrameStatus::from_code(code)
    }
}

impl From<FrameStatus> for i64 {
    fn from(status: FrameStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for FrameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
