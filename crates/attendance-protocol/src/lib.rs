//! Protocol between the background sync delegate and interactive contexts.
//!
//! The delegate has queue access but no credentials, so it asks a live
//! interactive context to commit each event and waits for the reply:
//!
//! ```text
//! delegate                         interactive context
//!    | -- SYNC_START {count} ------------> |
//!    | -- SYNC_RECORD {request_id, event}-> |  commit
//!    | <------- SYNC_REPLY {request_id, success}
//!    | -- SYNC_COMPLETE {succeeded, failed}> |
//! ```
//!
//! [`ContextBus`] carries this in-process; [`SocketLink`] carries it over
//! the daemon's Unix socket as newline-delimited JSON [`Frame`]s.

mod bus;
mod error;
mod link;
mod messages;
mod socket;

pub use bus::{ContextBus, ContextEndpoint, Inbound, PendingRequest};
pub use error::{LinkError, LinkResult};
pub use link::InteractiveLink;
pub use messages::{ConnectivityState, Frame, Notification, SyncReply, SyncRequest};
pub use socket::{read_frame, write_frame, DaemonConnection, SocketLink};
