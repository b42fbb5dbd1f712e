//! Tuning constants shared across the version set and compaction logic.

/// Number of levels in the LSM tree, L0..L6.
pub const NUM_LEVELS: usize = 7;

/// Number of L0 files that triggers compaction.
pub const L0_COMPACTION_TRIGGER: usize = 4;

/// Soft limit on L0 file count: writes are slowed down once this is hit.
pub const L0_SLOWDOWN_WRITES_TRIGGER: usize = 8;

/// Hard limit on L0 file count: writes stop until compaction catches up.
pub const L0_STOP_WRITES_TRIGGER: usize = 12;

/// Maximum number of bytes in all compacted files for one compaction (25MB).
pub const MAX_GRANDPARENT_OVERLAP_BYTES: u64 = 10 * 1024 * 1024 * 10 / 2;

/// Files kept open by the table cache are excluded from max_open_files counting.
pub const NUM_NON_TABLE_CACHE_FILES: u64 = 10;
