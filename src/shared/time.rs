//! Timestamp helpers
//!
//! Every timestamp the service assigns goes through [`now`], which truncates
//! to microseconds. That is the precision Postgres `TIMESTAMPTZ` keeps, so a
//! value read back from the database compares equal to the one handed out.

use chrono::{DateTime, SubsecRound, Utc};

/// Current time, truncated to microsecond precision
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
