/*!
# bpdash viewer

Client side of the dashboard. A [`ViewerSession`] owns one
[`StateSyncChannel`] to the hub, the local [`ObjectMirror`] it keeps in sync,
and the [`Notifier`] surfacing every failure. Timelines are pulled through
[`ReadModelClient`] and shaped into [`BpPanel`]s for rendering.
*/

pub mod channel;
pub mod connect;
pub mod error;
pub mod mirror;
pub mod notify;
pub mod panel;
pub mod readmodel;
pub mod render;
pub mod session;

pub use channel::{ChannelStatus, PendingCommand, StateSyncChannel};
pub use error::{FetchError, ValidationError, ViewerError};
pub use mirror::{MirrorEntry, ObjectMirror, RenderedObject};
pub use notify::{Notification, NotificationKind, Notifier};
pub use panel::{submit_annotation, BpPanel, Interruption, TimelinePanel};
pub use readmodel::{ReadModelClient, UnannotatedEvent};
pub use session::{SessionConfig, ViewerSession};
