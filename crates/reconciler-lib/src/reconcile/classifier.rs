//! Tier classification
//!
//! Splits the container population into low and high consumption tiers.
//! Infrastructure containers are dropped first and never reach either tier.

use crate::models::{ContainerRecord, Tier};
use crate::policy::{Policy, INFRASTRUCTURE_DENYLIST};

/// Containers of one cycle split by tier, each sorted by `rss_kb` descending
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tiers {
    pub low: Vec<ContainerRecord>,
    pub high: Vec<ContainerRecord>,
}

impl Tiers {
    pub fn get(&self, tier: Tier) -> &[ContainerRecord] {
        match tier {
            Tier::Low => &self.low,
            Tier::High => &self.high,
        }
    }

    pub fn total(&self) -> usize {
        self.low.len() + self.high.len()
    }
}

/// Whether the container belongs to the monitoring stack or the runtime
pub fn is_infrastructure(container: &ContainerRecord) -> bool {
    let name = container.name.to_lowercase();
    let cmdline = container.cmdline.to_lowercase();
    INFRASTRUCTURE_DENYLIST
        .iter()
        .any(|needle| name.contains(needle) || cmdline.contains(needle))
}

pub fn tier_of(container: &ContainerRecord, policy: &Policy) -> Tier {
    if container.rss_kb > policy.memory_threshold_kb
        || container.cpu_percent > policy.cpu_threshold_percent
    {
        Tier::High
    } else {
        Tier::Low
    }
}

/// Partition `containers` into tiers
///
/// The descending memory order of each tier is relied on by the enforcer,
/// which keeps the head of each tier and terminates the tail.
pub fn classify(containers: &[ContainerRecord], policy: &Policy) -> Tiers {
    let mut tiers = Tiers::default();

    for container in containers.iter().filter(|c| !is_infrastructure(c)) {
        match tier_of(container, policy) {
            Tier::High => tiers.high.push(container.clone()),
            Tier::Low => tiers.low.push(container.clone()),
        }
    }

    tiers.low.sort_unstable_by(|a, b| b.rss_kb.cmp(&a.rss_kb));
    tiers.high.sort_unstable_by(|a, b| b.rss_kb.cmp(&a.rss_kb));

    tiers
}
