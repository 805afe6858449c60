//! Remote storage layer for Driveloft.
//!
//! This module defines the trait the lifecycle engine talks to
//! (`RemoteStorage`), the Google Drive implementation behind it, and an
//! in-memory remote used by tests.
//!
//! # Design Principles
//! - Provider isolation: no Drive-specific logic escapes this crate
//! - Request-scoped sessions: an adapter holds one bearer token, nothing else
//! - Best-effort side steps: permission grants, deletion and metadata lookups
//!   log failures instead of surfacing them

pub mod drive;
pub mod memory;
pub mod remote;

pub use drive::{
    grant_plan, mime_for_name, remote_name, sanitize_file_name, DriveAdapter, DriveClient,
    DriveFactory, OauthCredentials, OauthHelper,
};
pub use memory::{MemoryFactory, MemoryRemote};
pub use remote::{
    AuthFlow, DriveSettings, ObjectInfo, RemoteFactory, RemoteObject, RemoteStorage,
    SharingPolicy, UploadRequest,
};
