//! Tollgate Auth: session token lifecycle, password login and
//! group/privilege access checks.

pub mod policy;
pub mod service;

pub use policy::{AccessPolicy, AccessRequirement};
pub use service::{LoginOutput, SessionService};
