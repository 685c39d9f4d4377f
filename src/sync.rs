// src/sync.rs
//! Sequence bookkeeping for the two sync channels.
//!
//! Advertisements are last-value-wins: only the newest sequence number of a
//! neighbor matters, older notifications are dropped. Prefix ownership is a
//! log: every sequence number of a router must be replayed, one at a time and
//! in order.
//!
//! Request names follow
//! `/<router>/DV/ADV/seq=<n>` and `/<router>/DV/PFX/seq=<n>`.

use crate::name::Name;

pub const ROLE_TAG: &str = "DV";
const ADV_TAG: &str = "ADV";
const PFX_TAG: &str = "PFX";

/// Sync group in which `router` announces its advertisement sequence number.
pub fn advert_group(router: &Name) -> Name {
    router.append(ROLE_TAG).append(ADV_TAG)
}

/// Name of `router`'s advertisement number `seq`.
pub fn advert_name(router: &Name, seq: u64) -> Name {
    advert_group(router).append(format!("seq={seq}"))
}

/// Name of entry `seq` of `router`'s prefix log.
pub fn prefix_ops_name(router: &Name, seq: u64) -> Name {
    router
        .append(ROLE_TAG)
        .append(PFX_TAG)
        .append(format!("seq={seq}"))
}

/// What to do after a failed fetch, given the consecutive failure count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Below the threshold: log and fetch again right away.
    Retry,
    /// The threshold was just reached: log once and stop.
    GiveUp,
    /// Already past the threshold: stay quiet.
    Suppressed,
}

impl FailureOutcome {
    pub fn classify(failures: u32, threshold: u32) -> Self {
        if failures < threshold {
            FailureOutcome::Retry
        } else if failures == threshold {
            FailureOutcome::GiveUp
        } else {
            FailureOutcome::Suppressed
        }
    }
}

/// Per-neighbor advertisement sequence state.
#[derive(Debug, Clone, Default)]
pub struct AdvertSyncState {
    last_seq: Option<u64>,
    in_flight: Option<u64>,
}

impl AdvertSyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_seq(&self) -> Option<u64> {
        self.last_seq
    }

    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    /// Handle `update(neighbor, seq)`. Returns the sequence number to fetch
    /// now, if any. Stale or duplicate numbers change nothing. A newer number
    /// arriving while a fetch is running is remembered and fetched by
    /// [`AdvertSyncState::finish`].
    pub fn notify(&mut self, seq: u64) -> Option<u64> {
        if self.last_seq.is_some_and(|last| seq <= last) {
            return None;
        }
        self.last_seq = Some(seq);
        if self.in_flight.is_some() {
            return None;
        }
        self.in_flight = Some(seq);
        Some(seq)
    }

    /// Heartbeat refetch of the last known number. Skipped while a fetch
    /// for this neighbor is still running.
    pub fn heartbeat(&mut self) -> Option<u64> {
        if self.in_flight.is_some() {
            return None;
        }
        let seq = self.last_seq?;
        self.in_flight = Some(seq);
        Some(seq)
    }

    /// The fetch for `seq` is over (success or abandoned). Returns a newer
    /// number to fetch next, if one arrived meanwhile.
    pub fn finish(&mut self, seq: u64) -> Option<u64> {
        self.in_flight = None;
        match self.last_seq {
            Some(last) if last > seq => {
                self.in_flight = Some(last);
                Some(last)
            }
            _ => None,
        }
    }

    /// Sequence number to use for an immediate retry after a failure on
    /// `seq`: the newest known one.
    pub fn retry(&mut self, seq: u64) -> u64 {
        let next = self.last_seq.map_or(seq, |last| last.max(seq));
        self.in_flight = Some(next);
        next
    }
}

/// Per-router prefix log replay state.
#[derive(Debug, Clone, Default)]
pub struct PrefixSyncState {
    processed: u64,
    pending: u64,
    errors: u32,
    fetching: bool,
}

impl PrefixSyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn pending(&self) -> u64 {
        self.pending
    }

    pub fn errors(&self) -> u32 {
        self.errors
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching
    }

    /// Raise the pending watermark. Returns true if it moved.
    pub fn notify(&mut self, seq: u64) -> bool {
        if seq <= self.pending {
            return false;
        }
        self.pending = seq;
        true
    }

    /// Claim the next sequence number to fetch, if replay is behind and no
    /// fetch is already running for this router.
    pub fn next_fetch(&mut self) -> Option<u64> {
        if self.fetching || self.processed >= self.pending {
            return None;
        }
        self.fetching = true;
        Some(self.processed + 1)
    }

    /// Entry `seq` was fetched and replayed. Only the immediate successor of
    /// `processed` is accepted; anything else is refused and leaves the
    /// state untouched.
    pub fn applied(&mut self, seq: u64) -> bool {
        if seq != self.processed + 1 {
            return false;
        }
        self.processed = seq;
        self.errors = 0;
        self.fetching = false;
        true
    }

    /// Record a failed fetch of `processed + 1`.
    ///
    /// On [`FailureOutcome::Retry`] the fetch stays claimed and the caller
    /// fetches the same number again. Otherwise the loop is released with
    /// `processed` unchanged, so the number is retried by the next
    /// notification or heartbeat and never skipped. The error count is kept
    /// until [`PrefixSyncState::applied`] succeeds, so those later attempts
    /// come back as [`FailureOutcome::Suppressed`].
    pub fn failed(&mut self, threshold: u32) -> FailureOutcome {
        self.errors = self.errors.saturating_add(1);
        let outcome = FailureOutcome::classify(self.errors, threshold);
        if outcome != FailureOutcome::Retry {
            self.fetching = false;
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(s: &str) -> Name {
        s.parse().unwrap()
    }

    #[test]
    fn request_names() {
        assert_eq!(advert_group(&n("/a")).to_string(), "/a/DV/ADV");
        assert_eq!(advert_name(&n("/a"), 7).to_string(), "/a/DV/ADV/seq=7");
        assert_eq!(
            prefix_ops_name(&n("/ndn/b"), 3).to_string(),
            "/ndn/b/DV/PFX/seq=3"
        );
    }

    #[test]
    fn failure_classification() {
        assert_eq!(FailureOutcome::classify(1, 5), FailureOutcome::Retry);
        assert_eq!(FailureOutcome::classify(4, 5), FailureOutcome::Retry);
        assert_eq!(FailureOutcome::classify(5, 5), FailureOutcome::GiveUp);
        assert_eq!(FailureOutcome::classify(6, 5), FailureOutcome::Suppressed);
    }

    #[test]
    fn advert_stale_notifications_are_ignored() {
        let mut s = AdvertSyncState::new();
        assert_eq!(s.notify(3), Some(3));
        assert_eq!(s.finish(3), None);
        assert_eq!(s.notify(3), None);
        assert_eq!(s.notify(2), None);
        assert_eq!(s.last_seq(), Some(3));
        assert_eq!(s.in_flight(), None);
    }

    #[test]
    fn advert_newer_seq_is_fetched_after_current() {
        let mut s = AdvertSyncState::new();
        assert_eq!(s.notify(1), Some(1));
        assert_eq!(s.notify(2), None);
        assert_eq!(s.notify(4), None);
        assert_eq!(s.finish(1), Some(4));
        assert_eq!(s.in_flight(), Some(4));
        assert_eq!(s.finish(4), None);
    }

    #[test]
    fn heartbeat_skips_running_fetch() {
        let mut s = AdvertSyncState::new();
        assert_eq!(s.heartbeat(), None);
        s.notify(5);
        assert_eq!(s.heartbeat(), None);
        s.finish(5);
        assert_eq!(s.heartbeat(), Some(5));
        assert_eq!(s.heartbeat(), None);
    }

    #[test]
    fn retry_prefers_newest_seq() {
        let mut s = AdvertSyncState::new();
        s.notify(1);
        s.notify(2);
        assert_eq!(s.retry(1), 2);
    }

    #[test]
    fn prefix_replay_is_strictly_ordered() {
        let mut s = PrefixSyncState::new();
        assert!(s.notify(3));
        assert!(!s.notify(1));
        assert_eq!(s.next_fetch(), Some(1));
        // only one fetch at a time
        assert_eq!(s.next_fetch(), None);
        assert!(!s.applied(2));
        assert!(s.applied(1));
        assert_eq!(s.next_fetch(), Some(2));
        assert!(s.applied(2));
        assert_eq!(s.next_fetch(), Some(3));
        assert!(s.applied(3));
        assert_eq!(s.next_fetch(), None);
        assert_eq!(s.processed(), 3);
    }

    #[test]
    fn prefix_failure_abandons_without_skipping() {
        let mut s = PrefixSyncState::new();
        s.notify(2);
        assert_eq!(s.next_fetch(), Some(1));
        for _ in 0..4 {
            assert_eq!(s.failed(5), FailureOutcome::Retry);
            assert!(s.is_fetching());
        }
        assert_eq!(s.failed(5), FailureOutcome::GiveUp);
        assert!(!s.is_fetching());
        assert_eq!(s.processed(), 0);
        // picked up again at the same number
        assert_eq!(s.next_fetch(), Some(1));
    }

    #[test]
    fn prefix_failures_stay_quiet_until_replay_succeeds() {
        let mut s = PrefixSyncState::new();
        s.notify(1);
        s.next_fetch();
        for _ in 0..4 {
            s.failed(5);
        }
        assert_eq!(s.failed(5), FailureOutcome::GiveUp);
        assert_eq!(s.errors(), 5);

        // restarted by a heartbeat, still failing
        assert_eq!(s.next_fetch(), Some(1));
        assert_eq!(s.failed(5), FailureOutcome::Suppressed);
        assert!(!s.is_fetching());
        assert_eq!(s.next_fetch(), Some(1));
        assert_eq!(s.failed(5), FailureOutcome::Suppressed);

        // the entry finally arrives
        assert_eq!(s.next_fetch(), Some(1));
        assert!(s.applied(1));
        assert_eq!(s.errors(), 0);
    }

    #[test]
    fn prefix_success_resets_errors() {
        let mut s = PrefixSyncState::new();
        s.notify(1);
        s.next_fetch();
        s.failed(5);
        s.failed(5);
        assert_eq!(s.errors(), 2);
        assert!(s.applied(1));
        assert_eq!(s.errors(), 0);
    }
}
