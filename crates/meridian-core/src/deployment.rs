//! BIP9-style version-bits deployment activation.
//!
//! Each deployment claims one of the 29 usable bits above
//! [`crate::constants::VERSIONBITS_TOP_BITS`] and moves through a small
//! state machine, evaluated once per confirmation window rather than per
//! block: `Defined -> Started -> LockedIn -> Active`, with `Failed` reachable
//! from `Defined` or `Started` once the deployment's timeout passes. State
//! only changes at period boundaries, so callers cache the result keyed by
//! the hash of the last block of the *previous* period — every block
//! within a period shares its start-of-period state.

use std::collections::HashMap;

use crate::constants::{MAX_VERSION_BITS_DEPLOYMENTS, VERSIONBITS_TOP_BITS};
use crate::error::DeploymentError;
use crate::types::Hash256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThresholdState {
    Defined,
    Started,
    LockedIn,
    Active,
    Failed,
}

/// A single version-bits deployment's parameters.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub name: String,
    pub bit: u8,
    /// Median-time-past at or after which signaling begins.
    pub start_time: u64,
    /// Median-time-past at or after which the deployment fails if not yet
    /// locked in.
    pub timeout: u64,
    /// Confirmation window length, in blocks.
    pub window: u64,
    /// Blocks within a window that must signal for lock-in.
    pub threshold: u64,
}

/// Per-period signal tally the caller collects by scanning a window of
/// headers for [`crate::types::BlockHeader::signals_bit`].
#[derive(Debug, Clone, Copy)]
pub struct PeriodStats {
    pub median_time_past: u64,
    pub signal_count: u64,
}

impl Deployment {
    /// Advance this deployment's state by one confirmation window.
    pub fn next_state(&self, current: ThresholdState, stats: PeriodStats) -> ThresholdState {
        match current {
            ThresholdState::Defined => {
                if stats.median_time_past >= self.timeout {
                    ThresholdState::Failed
                } else if stats.median_time_past >= self.start_time {
                    ThresholdState::Started
                } else {
                    ThresholdState::Defined
                }
            }
            ThresholdState::Started => {
                if stats.median_time_past >= self.timeout {
                    ThresholdState::Failed
                } else if stats.signal_count >= self.threshold {
                    ThresholdState::LockedIn
                } else {
                    ThresholdState::Started
                }
            }
            ThresholdState::LockedIn => ThresholdState::Active,
            ThresholdState::Active => ThresholdState::Active,
            ThresholdState::Failed => ThresholdState::Failed,
        }
    }

    /// Mask isolating this deployment's signal bit in a header's version.
    pub fn version_mask(&self) -> u32 {
        1u32 << self.bit
    }
}

/// A registered set of deployments, enforcing the bit-budget invariants:
/// no more than [`MAX_VERSION_BITS_DEPLOYMENTS`] at once, no two
/// deployments claiming the same bit over overlapping `[start_time,
/// timeout)` ranges.
#[derive(Debug, Default)]
pub struct DeploymentSet {
    deployments: Vec<Deployment>,
}

impl DeploymentSet {
    pub fn new() -> Self {
        Self { deployments: Vec::new() }
    }

    pub fn register(&mut self, deployment: Deployment) -> Result<(), DeploymentError> {
        if deployment.bit as usize >= MAX_VERSION_BITS_DEPLOYMENTS {
            return Err(DeploymentError::BitOutOfRange(deployment.bit));
        }
        if self.deployments.len() >= MAX_VERSION_BITS_DEPLOYMENTS {
            return Err(DeploymentError::TooManyDeployments);
        }
        let overlaps = self.deployments.iter().any(|d| {
            d.bit == deployment.bit
                && d.start_time < deployment.timeout
                && deployment.start_time < d.timeout
        });
        if overlaps {
            return Err(DeploymentError::BitAlreadyInUse(deployment.bit));
        }
        self.deployments.push(deployment);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Deployment, DeploymentError> {
        self.deployments
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| DeploymentError::UnknownDeployment(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Deployment> {
        self.deployments.iter()
    }

    /// The version bits a block template should set: `VERSIONBITS_TOP_BITS`
    /// plus one bit per deployment currently `Started` or `LockedIn` (a
    /// block signals through the entire signaling window, including the
    /// period it locks in during).
    pub fn signal_bits(&self, states: &HashMap<String, ThresholdState>) -> u32 {
        let mut version = VERSIONBITS_TOP_BITS;
        for deployment in &self.deployments {
            match states.get(&deployment.name) {
                Some(ThresholdState::Started) | Some(ThresholdState::LockedIn) => {
                    version |= deployment.version_mask();
                }
                _ => {}
            }
        }
        version
    }
}

/// Caches per-deployment threshold state at period boundaries so repeated
/// lookups for blocks within the same period are free.
#[derive(Debug, Default)]
pub struct DeploymentTracker {
    cache: HashMap<(String, Hash256), ThresholdState>,
}

impl DeploymentTracker {
    pub fn new() -> Self {
        Self { cache: HashMap::new() }
    }

    /// State as of the start of the period following `period_boundary_hash`
    /// (the hash of the last block of the *previous* period), computing and
    /// caching it from `prior_state` and this period's stats if not
    /// already known.
    pub fn state_at(
        &mut self,
        deployment: &Deployment,
        period_boundary_hash: Hash256,
        prior_state: ThresholdState,
        stats: PeriodStats,
    ) -> ThresholdState {
        let key = (deployment.name.clone(), period_boundary_hash);
        if let Some(state) = self.cache.get(&key) {
            return *state;
        }
        let state = deployment.next_state(prior_state, stats);
        self.cache.insert(key, state);
        state
    }

    pub fn cached_state(&self, deployment_name: &str, period_boundary_hash: Hash256) -> Option<ThresholdState> {
        self.cache.get(&(deployment_name.to_string(), period_boundary_hash)).copied()
    }
}
