//! Exec-approval coordination for remote agent runtimes.
//!
//! Mirrors pending approvals pushed by the runtime, pauses an agent's
//! in-flight run while a decision is outstanding, resumes it exactly once
//! after an allow, and prunes undecided approvals past their grace window.

pub mod bus;
pub mod coordinator;
pub mod ingress;
pub mod pause;
pub mod paused;
pub mod pending;
pub mod prune;
pub mod resolve;
pub mod resume;
pub mod service;
