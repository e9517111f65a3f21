//! Cross-swarm broker (spec.md §4.6): a bounty board and capability/offering
//! relay carried on a protocol space disjoint from the intra-swarm mesh.
//! Brokers federate records between swarm boundaries under the same
//! last-writer-wins discipline the gossip plane uses internally, and the
//! overflow delegator uses the board plus a reputation floor to hand local
//! work to a capable remote swarm when the local idle pool runs dry.

pub mod board;
pub mod error;
pub mod overflow;
pub mod relay;
pub mod reputation;
pub mod run;
pub mod sync;

pub use board::Board;
pub use error::{BrokerError, BrokerResult};
pub use overflow::BrokerOverflowDelegator;
pub use relay::{RelayEnvelope, RelayRecord};
pub use reputation::ReputationLedger;
pub use sync::{BrokerSyncResponse, BrokerWatermarks};
