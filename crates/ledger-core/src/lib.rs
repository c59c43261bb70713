//! Versioned file ledger for ephemeral execution sandboxes.
//!
//! Every file written inside a sandbox is mirrored into an append-only
//! version chain, tenants and projects are created lazily on first use, and a
//! project's latest file tree can be replayed into a fresh sandbox.

pub mod bootstrap;
pub mod config;
pub mod db;
pub mod error;
pub mod files;
pub mod ledger;
pub mod registry;
pub mod restore;
pub mod sandbox;
pub mod session;
pub mod tracker;

/// Core result type used throughout the ledger.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type that encompasses all ledger operations.
pub use error::Error;

/// Configuration and the injected store handle.
pub use config::LedgerConfig;
pub use db::LedgerDb;

/// Ledger components.
pub use bootstrap::TenantBootstrap;
pub use files::VersionedFileStore;
pub use ledger::Ledger;
pub use registry::ProjectRegistry;
pub use restore::RestoreService;
pub use session::SessionRegistry;
pub use tracker::{TrackedWriter, WriteThroughTracker};

/// Sandbox write capability.
pub use sandbox::{LocalDirWriter, SandboxWriter};

/// Record and state types from the storage layer.
pub use ledger_local_db::{
    FileVersionRecord, ProjectRecord, SandboxState, SessionRecord, SessionStatus, SnapshotRecord,
    TenantRecord,
};
