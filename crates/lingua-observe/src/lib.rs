//! Append-only usage event log.
//!
//! Operational outcomes that support-facing tooling needs to query later —
//! billed turns, debits that failed after a turn already succeeded, scoring
//! completions and failures — are recorded here as structured rows rather
//! than free-form log lines. The table is append-only; reconciliation jobs
//! read it, nothing rewrites it.

mod error;
mod event;
mod store;

pub use error::ObserveError;
pub use event::{ParseUsageDomainError, UsageDomain, UsageEvent, UsageEventPayload};
pub use store::{emit_event, query_events, EventFilter};
