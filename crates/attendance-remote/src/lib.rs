//! Remote write adapter for the attendance sync engine.
//!
//! [`RemoteWriteAdapter`] is the one capability the engine needs from the
//! remote store. [`SupabaseAttendanceClient`] implements it over the
//! Supabase REST API.

mod adapter;
mod client;
mod error;

pub use adapter::RemoteWriteAdapter;
pub use client::{RecordAttendanceArgs, SupabaseAttendanceClient};
pub use error::{RemoteError, RemoteResult};
