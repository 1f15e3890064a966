//! Tier classification and population enforcement

mod classifier;
mod enforcer;
mod locator;


pub use classifier::{classify, is_infrastructure, tier_of, Tiers};
pub use enforcer::{excess_reason, split_tier, EnforcementReport, PolicyEnforcer, Termination};
pub use locator::ContainerLocator;
