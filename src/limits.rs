//! Hard input limits. Everything user-supplied is bounded before it can
//! grow a ledger, a WAL entry, or a scan window without bound.

use crate::model::{Ms, DAY_MS};

/// Longest resource or walk-in name accepted.
pub const MAX_NAME_LEN: usize = 256;

/// Longest contact string (phone number) accepted.
pub const MAX_CONTACT_LEN: usize = 64;

/// Resources a single engine will hold.
pub const MAX_RESOURCES: usize = 10_000;

/// Ledger entries per resource, terminal states included.
pub const MAX_LEDGER_LEN: usize = 100_000;

/// Items per admission bundle.
pub const MAX_BUNDLE_SIZE: usize = 100;

/// Timestamps must fall in [2020-01-01, 2100-01-01) UTC.
pub const MIN_VALID_TIMESTAMP_MS: Ms = 1_577_836_800_000;
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

/// Widest single reservation window: one year.
pub const MAX_SPAN_DURATION_MS: Ms = 366 * DAY_MS;

/// Widest availability query window: two years.
pub const MAX_QUERY_WINDOW_MS: Ms = 2 * 366 * DAY_MS;
