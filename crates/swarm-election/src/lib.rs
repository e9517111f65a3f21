//! Bully-algorithm leader election (spec.md §4.7): a missing emperor
//! heartbeat triggers `ELECTION_START`, higher node-ids silence lower
//! challengers, and the highest surviving candidate broadcasts
//! `ELECTION_VICTORY` once uncontested. Emperor-only work elsewhere in the
//! swarm (dispatch, planning, review, integration) gates on
//! [`ElectionHandle::is_emperor`].

pub mod bully;
pub mod error;
pub mod messages;
pub mod run;

pub use bully::{Election, ElectionAction, HEARTBEAT_INTERVAL, HEARTBEAT_TIMEOUT, VICTORY_WAIT};
pub use error::{ElectionError, ElectionResult};
pub use messages::{ElectionStart, ElectionVictory, EmperorHeartbeat};
pub use run::{spawn, ElectionHandle};
