//! Bully-algorithm state machine (spec.md §4.7), kept free of any I/O so the
//! decision logic is exercised directly in tests; [`crate::run`] is the only
//! piece that touches a live [`swarm_net::NetHandle`].
//!
//! Comparisons are lexicographic on node-id strings, matching the
//! higher-node-id tiebreak used everywhere else replicated state converges
//! (spec.md §3, §4.5).

use std::time::{Duration, Instant};

/// What the caller should do in response to a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElectionAction {
    /// Broadcast `ELECTION_START` naming this node as candidate.
    BroadcastElectionStart,
    /// Broadcast `ELECTION_VICTORY` naming this node as the winner.
    BroadcastVictory,
}

/// Emperor heartbeats missing for this long trigger a challenge.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(15);
/// Interval at which the sitting emperor re-asserts itself.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
/// How long the current highest-seen candidate waits for a higher
/// challenger before declaring victory uncontested.
pub const VICTORY_WAIT: Duration = Duration::from_secs(3);

pub struct Election {
    local_node_id: String,
    /// Seneschals never run for office (spec.md §9 Open Questions: retained
    /// as "no").
    participates: bool,
    is_emperor: bool,
    known_emperor: Option<String>,
    last_heartbeat_seen: Instant,
    election_in_progress: bool,
    /// Highest candidate id observed in the current election round.
    highest_candidate: Option<String>,
    candidate_since: Option<Instant>,
}

impl Election {
    pub fn new(local_node_id: impl Into<String>, participates: bool) -> Self {
        Self {
            local_node_id: local_node_id.into(),
            participates,
            is_emperor: false,
            known_emperor: None,
            last_heartbeat_seen: Instant::now(),
            election_in_progress: false,
            highest_candidate: None,
            candidate_since: None,
        }
    }

    pub fn local_node_id(&self) -> &str {
        &self.local_node_id
    }

    pub fn is_emperor(&self) -> bool {
        self.is_emperor
    }

    pub fn known_emperor(&self) -> Option<&str> {
        self.known_emperor.as_deref()
    }

    /// A node self-declares emperor on first boot when it has no seed peers
    /// to contest with — callers decide whether that applies.
    pub fn declare_self_emperor_uncontested(&mut self) {
        self.is_emperor = true;
        self.known_emperor = Some(self.local_node_id.clone());
        self.last_heartbeat_seen = Instant::now();
    }

    pub fn on_heartbeat(&mut self, from_node_id: &str, now: Instant) {
        self.last_heartbeat_seen = now;
        self.known_emperor = Some(from_node_id.to_string());
        self.election_in_progress = false;
        self.highest_candidate = None;
        self.is_emperor = from_node_id == self.local_node_id;
    }

    /// Received an `ELECTION_START` naming `candidate_id`. Returns
    /// `Some(action)` iff this node must broadcast something in response.
    pub fn on_election_start(&mut self, candidate_id: &str, now: Instant) -> Option<ElectionAction> {
        if !self.participates || candidate_id == self.local_node_id {
            return None;
        }
        self.election_in_progress = true;
        self.is_emperor = false;

        let higher_seen = self
            .highest_candidate
            .as_deref()
            .is_none_or(|h| candidate_id > h);
        if higher_seen {
            self.highest_candidate = Some(candidate_id.to_string());
            self.candidate_since = Some(now);
        }

        if candidate_id < self.local_node_id.as_str() {
            // We outrank the challenger: assert ourselves and take over.
            let we_are_highest = self.highest_candidate.as_deref() != Some(candidate_id)
                || self.local_node_id > *candidate_id;
            if we_are_highest && self.highest_candidate.as_deref() != Some(self.local_node_id.as_str()) {
                self.highest_candidate = Some(self.local_node_id.clone());
                self.candidate_since = Some(now);
            }
            Some(ElectionAction::BroadcastElectionStart)
        } else {
            // The challenger outranks us; we cannot win this round.
            None
        }
    }

    pub fn on_victory(&mut self, winner_node_id: &str, now: Instant) {
        self.known_emperor = Some(winner_node_id.to_string());
        self.is_emperor = winner_node_id == self.local_node_id;
        self.election_in_progress = false;
        self.highest_candidate = None;
        self.last_heartbeat_seen = now;
    }

    /// Called on every tick of the election loop's timer. Decides whether
    /// to start a fresh election (heartbeat timeout) or declare victory
    /// (we are the highest surviving candidate and nobody higher has
    /// challenged within [`VICTORY_WAIT`]).
    pub fn check_timeouts(&mut self, now: Instant) -> Option<ElectionAction> {
        if !self.participates {
            return None;
        }

        if self.election_in_progress {
            let is_highest = self.highest_candidate.as_deref() == Some(self.local_node_id.as_str());
            let waited_long_enough = self
                .candidate_since
                .is_some_and(|since| now.duration_since(since) >= VICTORY_WAIT);
            if is_highest && waited_long_enough {
                self.is_emperor = true;
                self.known_emperor = Some(self.local_node_id.clone());
                self.election_in_progress = false;
                self.highest_candidate = None;
                self.last_heartbeat_seen = now;
                return Some(ElectionAction::BroadcastVictory);
            }
            return None;
        }

        if !self.is_emperor && now.duration_since(self.last_heartbeat_seen) >= HEARTBEAT_TIMEOUT {
            self.election_in_progress = true;
            self.highest_candidate = Some(self.local_node_id.clone());
            self.candidate_since = Some(now);
            return Some(ElectionAction::BroadcastElectionStart);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_node_is_not_emperor() {
        let e = Election::new("n1", true);
        assert!(!e.is_emperor());
    }

    #[test]
    fn heartbeat_from_self_marks_emperor() {
        let mut e = Election::new("n1", true);
        e.on_heartbeat("n1", Instant::now());
        assert!(e.is_emperor());
    }

    #[test]
    fn heartbeat_from_peer_clears_emperor_status() {
        let mut e = Election::new("n1", true);
        e.on_heartbeat("n1", Instant::now());
        e.on_heartbeat("n2", Instant::now());
        assert!(!e.is_emperor());
        assert_eq!(e.known_emperor(), Some("n2"));
    }

    #[test]
    fn heartbeat_timeout_triggers_election_start() {
        let mut e = Election::new("n1", true);
        let long_ago = Instant::now() - HEARTBEAT_TIMEOUT - Duration::from_secs(1);
        e.last_heartbeat_seen = long_ago;

        let action = e.check_timeouts(Instant::now());
        assert_eq!(action, Some(ElectionAction::BroadcastElectionStart));
    }

    #[test]
    fn lower_id_challenger_is_outbid_by_higher_local_id() {
        let mut e = Election::new("n9", true);
        let action = e.on_election_start("n2", Instant::now());
        assert_eq!(action, Some(ElectionAction::BroadcastElectionStart));
    }

    #[test]
    fn higher_id_challenger_silences_lower_local_id() {
        let mut e = Election::new("n2", true);
        let action = e.on_election_start("n9", Instant::now());
        assert_eq!(action, None);
        assert!(!e.is_emperor());
    }

    #[test]
    fn highest_candidate_declares_victory_after_wait_uncontested() {
        let mut e = Election::new("n9", true);
        let start = Instant::now();
        e.on_election_start("n2", start);

        // Too soon: no victory yet.
        assert_eq!(e.check_timeouts(start), None);

        let later = start + VICTORY_WAIT + Duration::from_millis(50);
        let action = e.check_timeouts(later);
        assert_eq!(action, Some(ElectionAction::BroadcastVictory));
        assert!(e.is_emperor());
    }

    #[test]
    fn victory_from_a_peer_resets_our_emperor_flag() {
        let mut e = Election::new("n2", true);
        e.declare_self_emperor_uncontested();
        assert!(e.is_emperor());

        e.on_victory("n9", Instant::now());
        assert!(!e.is_emperor());
        assert_eq!(e.known_emperor(), Some("n9"));
    }

    #[test]
    fn seneschal_never_participates() {
        let mut e = Election::new("n9", false);
        assert_eq!(e.on_election_start("n2", Instant::now()), None);
        assert_eq!(e.check_timeouts(Instant::now()), None);
        assert!(!e.is_emperor());
    }
}
