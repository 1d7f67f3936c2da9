pub mod dispatch;
pub mod error;
pub mod instr;
pub mod state;
pub mod stats;
pub mod subscriber;

pub use dispatch::Dispatcher;
pub use error::{PublishError, PublishResult};
pub use instr::build_batch_transaction;
pub use state::{EntryState, PendingEntry, PublishPipeline};
pub use stats::PublishStats;
pub use subscriber::PipelineSubscriber;
