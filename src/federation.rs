//! Federation trust validation: DRS discovery, WebFinger lookup, and the realm trust decision.

pub mod drs;
pub mod trust;
pub mod webfinger;
