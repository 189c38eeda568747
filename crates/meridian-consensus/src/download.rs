//! Block-download scheduler: tracks in-flight block requests per peer
//! during initial block download, detects stalled/timed-out peers, and
//! frees inflight slots on disconnect so blocks become eligible for
//! re-request elsewhere.
//!
//! Pure bookkeeping — this module never touches the network itself. The
//! node's peer-to-peer layer calls [`DownloadScheduler::mark_inflight`]
//! when it sends a `getdata`, [`DownloadScheduler::mark_received`] when the
//! block arrives, and polls [`DownloadScheduler::stalled`] /
//! [`DownloadScheduler::timed_out`] on its own timer.

use std::collections::HashMap;

use meridian_core::types::Hash256;

/// Base timeout before a peer's oldest in-flight request is considered
/// dead, before accounting for its queued header backlog.
pub const BLOCK_TIMEOUT_BASE_SECS: u64 = 10;
/// Extra grace period per still-unprocessed validated header a peer has
/// queued ahead of the requested block, so a peer serving a long catch-up
/// isn't penalized for its own backlog.
pub const PER_HEADER_DELAY_SECS: u64 = 1;
/// Default per-peer in-flight window, mirrored from
/// [`meridian_core::config::ChainEngineConfig::max_blocks_in_flight_per_peer`]
/// when the caller doesn't override it.
pub const DEFAULT_MAX_IN_FLIGHT_PER_PEER: usize = 16;

#[derive(Debug, Clone, Copy)]
struct InflightRequest {
    hash: Hash256,
    requested_at: u64,
    header_validated: bool,
}

#[derive(Debug, Clone, Default)]
struct PeerState {
    inflight: Vec<InflightRequest>,
    stalling_since: Option<u64>,
    preferred_download: bool,
    queued_validated_headers: usize,
}

/// Per-peer in-flight block request tracking for initial block download.
#[derive(Debug, Default)]
pub struct DownloadScheduler {
    peers: HashMap<String, PeerState>,
    /// hash -> (peer, index into that peer's `inflight` vec).
    by_hash: HashMap<Hash256, (String, usize)>,
    max_in_flight_per_peer: usize,
}

impl DownloadScheduler {
    pub fn new(max_in_flight_per_peer: usize) -> Self {
        Self { peers: HashMap::new(), by_hash: HashMap::new(), max_in_flight_per_peer }
    }

    pub fn set_preferred(&mut self, peer: &str, preferred: bool) {
        self.peers.entry(peer.to_string()).or_default().preferred_download = preferred;
    }

    pub fn is_preferred(&self, peer: &str) -> bool {
        self.peers.get(peer).is_some_and(|p| p.preferred_download)
    }

    /// Record that `hash` was requested from `peer` at `now`. Returns
    /// `false` (and does nothing) if the peer is already at its in-flight
    /// window, or if `hash` is already in flight with some peer.
    pub fn mark_inflight(&mut self, peer: &str, hash: Hash256, now: u64, header_validated: bool) -> bool {
        if self.by_hash.contains_key(&hash) {
            return false;
        }
        let state = self.peers.entry(peer.to_string()).or_default();
        if state.inflight.len() >= self.max_in_flight_per_peer {
            return false;
        }
        let idx = state.inflight.len();
        state.inflight.push(InflightRequest { hash, requested_at: now, header_validated });
        self.by_hash.insert(hash, (peer.to_string(), idx));
        true
    }

    /// Clear the in-flight entry for `hash` (the block arrived). Also clears
    /// the owning peer's stall marker, since progress was made.
    pub fn mark_received(&mut self, hash: &Hash256) {
        let Some((peer, idx)) = self.by_hash.remove(hash) else { return };
        if let Some(state) = self.peers.get_mut(&peer) {
            if idx < state.inflight.len() {
                state.inflight.remove(idx);
                reindex(state, &mut self.by_hash, &peer);
            }
            state.stalling_since = None;
        }
    }

    /// `true` iff `peer` is the unique source of a still-missing block and
    /// has been for longer than `window` seconds.
    pub fn stalled(&mut self, peer: &str, now: u64, window: u64) -> bool {
        let Some(state) = self.peers.get_mut(peer) else { return false };
        if state.inflight.is_empty() {
            state.stalling_since = None;
            return false;
        }
        let since = *state.stalling_since.get_or_insert(now);
        now.saturating_sub(since) > window
    }

    /// `true` iff `peer`'s oldest in-flight request has outlived the
    /// timeout budget: base timeout plus a per-queued-header allowance.
    pub fn timed_out(&self, peer: &str, now: u64) -> bool {
        let Some(state) = self.peers.get(peer) else { return false };
        let Some(oldest) = state.inflight.iter().map(|r| r.requested_at).min() else { return false };
        let budget =
            BLOCK_TIMEOUT_BASE_SECS + PER_HEADER_DELAY_SECS * state.queued_validated_headers as u64;
        now.saturating_sub(oldest) > budget
    }

    pub fn set_queued_validated_headers(&mut self, peer: &str, count: usize) {
        self.peers.entry(peer.to_string()).or_default().queued_validated_headers = count;
    }

    /// Remove all of `peer`'s in-flight requests, returning the hashes so
    /// the caller can re-request them from another source.
    pub fn disconnect_peer(&mut self, peer: &str) -> Vec<Hash256> {
        let Some(state) = self.peers.remove(peer) else { return Vec::new() };
        let hashes: Vec<Hash256> = state.inflight.iter().map(|r| r.hash).collect();
        for hash in &hashes {
            self.by_hash.remove(hash);
        }
        hashes
    }

    pub fn total_inflight(&self) -> usize {
        self.by_hash.len()
    }

    pub fn peer_inflight_count(&self, peer: &str) -> usize {
        self.peers.get(peer).map(|p| p.inflight.len()).unwrap_or(0)
    }
}

/// After removing an entry from a peer's `inflight` vec, every later
/// request's index shifted down by one; fix up `by_hash` accordingly.
fn reindex(state: &PeerState, by_hash: &mut HashMap<Hash256, (String, usize)>, peer: &str) {
    for (idx, req) in state.inflight.iter().enumerate() {
        by_hash.insert(req.hash, (peer.to_string(), idx));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(n: u8) -> Hash256 {
        Hash256([n; 32])
    }

    #[test]
    fn mark_inflight_then_received_clears_state() {
        let mut sched = DownloadScheduler::new(16);
        assert!(sched.mark_inflight("peer-a", hash(1), 1_000, true));
        assert_eq!(sched.total_inflight(), 1);
        assert_eq!(sched.peer_inflight_count("peer-a"), 1);

        sched.mark_received(&hash(1));
        assert_eq!(sched.total_inflight(), 0);
        assert_eq!(sched.peer_inflight_count("peer-a"), 0);
    }

    #[test]
    fn mark_inflight_rejects_duplicate_hash_from_other_peer() {
        let mut sched = DownloadScheduler::new(16);
        assert!(sched.mark_inflight("peer-a", hash(1), 1_000, true));
        assert!(!sched.mark_inflight("peer-b", hash(1), 1_001, true));
    }

    #[test]
    fn mark_inflight_respects_per_peer_window() {
        let mut sched = DownloadScheduler::new(1);
        assert!(sched.mark_inflight("peer-a", hash(1), 1_000, true));
        assert!(!sched.mark_inflight("peer-a", hash(2), 1_000, true));
    }

    #[test]
    fn removing_middle_request_reindexes_survivors() {
        let mut sched = DownloadScheduler::new(16);
        sched.mark_inflight("peer-a", hash(1), 1_000, true);
        sched.mark_inflight("peer-a", hash(2), 1_001, true);
        sched.mark_inflight("peer-a", hash(3), 1_002, true);

        sched.mark_received(&hash(2));
        assert_eq!(sched.peer_inflight_count("peer-a"), 2);
        // hash(3) should still be tracked correctly after the index shift.
        sched.mark_received(&hash(3));
        assert_eq!(sched.peer_inflight_count("peer-a"), 1);
    }

    #[test]
    fn stalled_requires_sustained_lack_of_progress() {
        let mut sched = DownloadScheduler::new(16);
        sched.mark_inflight("peer-a", hash(1), 1_000, true);
        assert!(!sched.stalled("peer-a", 1_000, 30));
        assert!(!sched.stalled("peer-a", 1_020, 30));
        assert!(sched.stalled("peer-a", 1_050, 30));
    }

    #[test]
    fn stalled_false_with_no_inflight() {
        let mut sched = DownloadScheduler::new(16);
        assert!(!sched.stalled("peer-a", 1_000, 30));
    }

    #[test]
    fn timed_out_scales_with_queued_headers() {
        let mut sched = DownloadScheduler::new(16);
        sched.mark_inflight("peer-a", hash(1), 1_000, true);
        sched.set_queued_validated_headers("peer-a", 20);

        assert!(!sched.timed_out("peer-a", 1_015));
        assert!(sched.timed_out("peer-a", 1_032));
    }

    #[test]
    fn disconnect_peer_frees_hashes_for_rerequest() {
        let mut sched = DownloadScheduler::new(16);
        sched.mark_inflight("peer-a", hash(1), 1_000, true);
        sched.mark_inflight("peer-a", hash(2), 1_001, true);

        let freed = sched.disconnect_peer("peer-a");
        assert_eq!(freed.len(), 2);
        assert_eq!(sched.total_inflight(), 0);
        assert!(sched.mark_inflight("peer-b", hash(1), 1_002, true));
    }

    #[test]
    fn preferred_download_flag_round_trips() {
        let mut sched = DownloadScheduler::new(16);
        assert!(!sched.is_preferred("peer-a"));
        sched.set_preferred("peer-a", true);
        assert!(sched.is_preferred("peer-a"));
    }
}
