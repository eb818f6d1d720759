//! bpdash core - shared model of the monitoring engine.
//!
//! - `status` : check-state and frame-status enums with their wire codes
//! - `object` : typed identity and state of one monitored service
//! - `frame` : observed status intervals (timeline frames)
//! - `protocol` : commands, broadcast deltas and the attribute tagged union
//! - `aggregate` : reduction of a timeline into availability figures
//! - `fairness` : rendering weights that keep every frame visible
//! - `window` : start/end filtering of timelines

pub mod aggregate;
pub mod fairness;
pub mod frame;
pub mod object;
pub mod protocol;
pub mod status;
pub mod window;

pub use aggregate::{aggregate, Aggregate};
pub use fairness::{display_frames, DisplayFrame, MIN_DISPLAY_PERCENT};
pub use frame::FrameModel;
pub use object::{ObjectKey, ObjectState};
pub use protocol::{AttrChange, Attrs, ChannelEvent, Command, Delta, ProtocolError};
pub use status::{CheckState, FrameStatus};
pub use window::TimeWindow;
