//! Authority alias cache and instance discovery.

pub mod alias;
pub mod discovery;
