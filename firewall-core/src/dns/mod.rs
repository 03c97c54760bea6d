//! DNS response filtering (H3) and IP scope classification.

mod rrset;
mod scope;

pub use rrset::{filter, FilterOutcome, RR, RRCache};
pub use scope::{classify, IPScope};
