//! Dynamic universe promotion.
//!
//! Structural engines may promote symbols outside the static universe into
//! P1 scanning for a limited number of trading days. A confirmation engine
//! can make a promotion permanent until it is removed explicitly.

mod actor;
mod dynamic;

pub use actor::{load_universe, DuiHandle, ProposalResult, UniverseError};
pub use dynamic::{
    DuiEntry, DynamicUniverse, PromotionOutcome, PromotionRejection, PromotionState,
};
