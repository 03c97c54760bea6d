//! The two entity tiers the verdict pipeline operates on, plus the Domain
//! key type and opaque Process identity.

mod communication;
mod domain;
mod link;
mod process;

pub use communication::{Communication, CommunicationWeak};
pub use domain::Domain;
pub use link::{FiveTuple, Link, LinkWeak, Protocol};
pub use process::Process;
