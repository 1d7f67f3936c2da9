pub mod cluster;
pub mod error;
pub mod forwarder;
pub mod leader;

pub use cluster::ClusterMap;
pub use error::{TxSvcError, TxSvcResult};
pub use forwarder::{TxForwarder, HBEAT_INTERVAL};
pub use leader::{LeaderSchedule, LEADER_MIN};
