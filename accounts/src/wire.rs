use bytemuck::{Pod, Zeroable};

pub const PC_MAGIC: u32 = 0xa1b2_c3d4;
pub const PC_VERSION_1: u32 = 1;
pub const PC_VERSION_2: u32 = 2;
pub const PC_SYMBOL_SIZE: usize = 16;
pub const PC_PUBKEY_SIZE: usize = 32;
pub const PC_MAP_TABLE_SIZE: usize = 307;
pub const PC_COMP_SIZE: usize = 16;
pub const PC_MAX_SEND_LATENCY: i64 = 25;

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountType {
  Unknown = 0,
  Mapping = 1,
  Product = 2,
  Price = 3,
}

impl From<u32> for AccountType {
  fn from(v: u32) -> Self {
    match v {
      1 => AccountType::Mapping,
      2 => AccountType::Product,
      3 => AccountType::Price,
      _ => AccountType::Unknown,
    }
  }
}

/// Trading status of one price account. `Auction` and `Ignored` are not
/// present in the historical on-chain header but are carried by newer
/// publishers and consumed by the aggregation filter: an `Auction` quote is
/// excluded the same as `Unknown`/`Halted`, while `Ignored` marks a
/// publisher the aggregator should skip without counting it as stale.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceStatus {
  Unknown = 0,
  Trading = 1,
  Halted = 2,
  Auction = 3,
  Ignored = 4,
}

impl From<u32> for PriceStatus {
  fn from(v: u32) -> Self {
    match v {
      1 => PriceStatus::Trading,
      2 => PriceStatus::Halted,
      3 => PriceStatus::Auction,
      4 => PriceStatus::Ignored,
      _ => PriceStatus::Unknown,
    }
  }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
  InitMapping = 0,
  AddMapping = 1,
  AddProduct = 2,
  AddPrice = 3,
  AddPublisher = 4,
  DelPublisher = 5,
  UpdPrice = 6,
  AggPrice = 7,
  InitPrice = 8,
  SetMinPub = 9,
}

/// Wire record a publisher sends on-chain to update its own component price,
/// little-endian throughout per the cluster's native byte order.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CmdUpdPrice {
  pub version: u32,
  pub cmd: u32,
  pub status: u32,
  pub unused: u32,
  pub price: i64,
  pub conf: u64,
  pub pub_slot: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable, PartialEq, Eq)]
pub struct PriceInfo {
  pub price: i64,
  pub conf: u64,
  pub status: u32,
  pub corp_act: u32,
  pub pub_slot: u64,
}

impl PriceInfo {
  pub fn status(&self) -> PriceStatus {
    PriceStatus::from(self.status)
  }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PriceComponent {
  pub publisher: [u8; PC_PUBKEY_SIZE],
  pub agg: PriceInfo,
  pub latest: PriceInfo,
}

/// The three decaying averages a price account carries, packed with the
/// `numer`/`denom` carry state `aggregate::EmaState` expects.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct EmaWire {
  pub val: i64,
  pub numer: i64,
  pub denom: i64,
}

/// Decoded price account, matching the newer field set (twap/twac,
/// prev_slot/prev_price/prev_conf, quote_type, quoter_count) layered on top
/// of the historical `pc_price_t` header.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PriceAccount {
  pub magic: u32,
  pub version: u32,
  pub atype: u32,
  pub size: u32,
  pub price_type: u32,
  pub expo: i32,
  pub num: u32,
  pub num_qt: u32,
  pub last_slot: u64,
  pub valid_slot: u64,
  pub twap: EmaWire,
  pub twac: EmaWire,
  pub timestamp: i64,
  pub min_pub: u8,
  pub quote_type: u8,
  pub drv2: u8,
  pub drv3: u8,
  pub drv4: u32,
  pub product_account: [u8; PC_PUBKEY_SIZE],
  pub next_price_account: [u8; PC_PUBKEY_SIZE],
  pub prev_slot: u64,
  pub prev_price: i64,
  pub prev_conf: u64,
  pub prev_timestamp: i64,
  pub agg: PriceInfo,
  pub comp: [PriceComponent; PC_COMP_SIZE],
}

impl PriceAccount {
  pub fn account_type(&self) -> AccountType {
    AccountType::from(self.atype)
  }

  pub fn is_valid_magic(&self) -> bool {
    self.magic == PC_MAGIC
  }

  pub fn from_bytes(data: &[u8]) -> Option<&PriceAccount> {
    bytemuck::try_from_bytes(data.get(..std::mem::size_of::<PriceAccount>())?).ok()
  }
}

/// Fixed header of a product account. The packed `(u8 keylen,key,u8
/// vallen,val)*` attribute dictionary immediately follows this header in
/// the account's raw bytes and isn't part of the `Pod` struct itself, since
/// it's variable-length; use [`ProductAccount::attr_dict_bytes`] to reach
/// it.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ProductAccount {
  pub magic: u32,
  pub version: u32,
  pub atype: u32,
  pub size: u32,
  pub price_account: [u8; PC_PUBKEY_SIZE],
}

impl ProductAccount {
  pub fn from_bytes(data: &[u8]) -> Option<&ProductAccount> {
    bytemuck::try_from_bytes(data.get(..std::mem::size_of::<ProductAccount>())?).ok()
  }

  /// Returns the raw bytes of the packed attribute dictionary trailing the
  /// fixed header, bounded by the account's declared `size` (the account's
  /// on-chain allocation is typically larger than `size`, so the fixed
  /// header's `size_of` can't be trusted as the upper bound on its own).
  /// Pass the result to [`crate::attr::iter_attr_dict`] to decode it.
  pub fn attr_dict_bytes<'a>(&self, data: &'a [u8]) -> Option<&'a [u8]> {
    let header_len = std::mem::size_of::<ProductAccount>();
    let declared_end = self.size as usize;
    if declared_end < header_len {
      return None;
    }
    data.get(header_len..declared_end)
  }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MappingAccount {
  pub magic: u32,
  pub version: u32,
  pub atype: u32,
  pub size: u32,
  pub num: u32,
  pub unused: u32,
  pub next_mapping_account: [u8; PC_PUBKEY_SIZE],
  pub products: [[u8; PC_PUBKEY_SIZE]; PC_MAP_TABLE_SIZE],
}

impl MappingAccount {
  pub fn from_bytes(data: &[u8]) -> Option<&MappingAccount> {
    bytemuck::try_from_bytes(data.get(..std::mem::size_of::<MappingAccount>())?).ok()
  }

  pub fn product_keys(&self) -> impl Iterator<Item = &[u8; PC_PUBKEY_SIZE]> {
    self.products.iter().take(self.num as usize)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn price_status_round_trips_known_values() {
    assert_eq!(PriceStatus::from(1), PriceStatus::Trading);
    assert_eq!(PriceStatus::from(4), PriceStatus::Ignored);
    assert_eq!(PriceStatus::from(99), PriceStatus::Unknown);
  }

  #[test]
  fn price_account_rejects_undersized_buffer() {
    assert!(PriceAccount::from_bytes(&[0u8; 4]).is_none());
  }

  #[test]
  fn price_account_reads_magic_from_zeroed_buffer() {
    let size = std::mem::size_of::<PriceAccount>();
    let mut buf = vec![0u8; size];
    buf[0..4].copy_from_slice(&PC_MAGIC.to_le_bytes());
    let acc = PriceAccount::from_bytes(&buf).unwrap();
    assert!(acc.is_valid_magic());
  }

  #[test]
  fn product_account_exposes_the_trailing_attribute_dictionary() {
    let header_len = std::mem::size_of::<ProductAccount>();
    let mut dict = Vec::new();
    for (k, v) in [("asset_type", "Crypto"), ("base", "BTC")] {
      dict.push(k.len() as u8);
      dict.extend_from_slice(k.as_bytes());
      dict.push(v.len() as u8);
      dict.extend_from_slice(v.as_bytes());
    }
    let mut buf = vec![0u8; header_len];
    buf[0..4].copy_from_slice(&PC_MAGIC.to_le_bytes());
    buf[12..16].copy_from_slice(&((header_len + dict.len()) as u32).to_le_bytes());
    buf.extend_from_slice(&dict);

    let product = ProductAccount::from_bytes(&buf).unwrap();
    let attrs = product.attr_dict_bytes(&buf).unwrap();
    let pairs: Vec<(&str, &str)> = crate::attr::iter_attr_dict(attrs).collect();
    assert_eq!(pairs, vec![("asset_type", "Crypto"), ("base", "BTC")]);
  }

  #[test]
  fn attr_dict_bytes_is_none_when_size_is_smaller_than_the_header() {
    let header_len = std::mem::size_of::<ProductAccount>();
    let buf = vec![0u8; header_len];
    let product = ProductAccount::from_bytes(&buf).unwrap();
    assert!(product.attr_dict_bytes(&buf).is_none());
  }
}
