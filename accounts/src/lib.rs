pub mod attr;
pub mod error;
pub mod mirror;
pub mod verify;
pub mod wire;

pub use attr::{iter_attr_dict, AttrId, AttrTable};
pub use error::{MirrorError, MirrorResult};
pub use mirror::{Mirror, MirrorSubscriber};
pub use verify::AggregateVerifier;
pub use wire::{
  AccountType, CmdUpdPrice, Command, MappingAccount, PriceAccount, PriceComponent, PriceInfo, PriceStatus,
  ProductAccount, PC_COMP_SIZE, PC_MAGIC, PC_MAP_TABLE_SIZE, PC_MAX_SEND_LATENCY, PC_PUBKEY_SIZE, PC_SYMBOL_SIZE,
  PC_VERSION_1, PC_VERSION_2,
};
