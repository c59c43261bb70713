//! Database schema definitions and constants.

// Current schema version
pub const SCHEMA_VERSION: u32 = 1;

// Table names
pub const TABLE_SCHEMA_MIGRATIONS: &str = "schema_migrations";
pub const TABLE_TENANTS: &str = "tenants";
pub const TABLE_PROJECTS: &str = "projects";
pub const TABLE_SESSIONS: &str = "sessions";
pub const TABLE_FILE_VERSIONS: &str = "file_versions";
pub const TABLE_PROJECT_SNAPSHOTS: &str = "project_snapshots";

/// Every table created by the migrations, in dependency order.
pub const ALL_TABLES: [&str; 6] = [
    TABLE_SCHEMA_MIGRATIONS,
    TABLE_TENANTS,
    TABLE_PROJECTS,
    TABLE_SESSIONS,
    TABLE_FILE_VERSIONS,
    TABLE_PROJECT_SNAPSHOTS,
];
