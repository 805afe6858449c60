//! Attachment offload engine for Driveloft.
//!
//! Reacts to the host's file lifecycle events: uploads freshly attached
//! files to remote storage, rewrites their locators, deletes local copies,
//! removes remote objects when attachments are deleted, and sweeps
//! pre-existing local files on demand. Configuration is a singleton record
//! behind a short-lived read cache; the host's document persistence is an
//! explicit collaborator trait.

pub mod config;
pub mod engine;
pub mod paths;
pub mod store;

pub use config::{ConfigCache, ConfigStore, JsonConfigStore, MemoryConfigStore, OffloadConfig};
pub use engine::{
    AuthorizeOutcome, ConnectionStatus, EngineOptions, MigrationReport, OffloadEngine,
    ServedFile, SettingsView,
};
pub use paths::SiteRoots;
pub use store::{DocumentStore, FileRecord, JsonDocumentStore, MemoryDocumentStore};
