use std::collections::HashMap;

/// Interned handle for an attribute key string (e.g. `"asset_type"`,
/// `"quote_currency"`). Held per-`Manager` rather than as a process-wide
/// singleton, so multiple managers in the same process (tests, or a future
/// multi-cluster daemon) don't share or leak interning state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttrId(u32);

/// Assigns monotonically increasing ids to attribute key strings as they are
/// first seen, matching the original `attr_id_set`'s interning behavior
/// without its global-singleton storage.
#[derive(Debug, Default)]
pub struct AttrTable {
  ids: HashMap<String, AttrId>,
  strs: Vec<String>,
}

impl AttrTable {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn intern(&mut self, key: &str) -> AttrId {
    if let Some(&id) = self.ids.get(key) {
      return id;
    }
    let id = AttrId(self.strs.len() as u32);
    self.strs.push(key.to_string());
    self.ids.insert(key.to_string(), id);
    id
  }

  pub fn get(&self, key: &str) -> Option<AttrId> {
    self.ids.get(key).copied()
  }

  pub fn str_of(&self, id: AttrId) -> Option<&str> {
    self.strs.get(id.0 as usize).map(|s| s.as_str())
  }
}

/// Iterates the packed `(u8 len, bytes)*` key/value pairs an account's
/// attribute dictionary blob is encoded as, yielding `(key, value)` string
/// slices without allocating.
pub fn iter_attr_dict(mut data: &[u8]) -> impl Iterator<Item = (&str, &str)> {
  std::iter::from_fn(move || {
    let (key, rest) = read_pascal_str(data)?;
    let (value, rest) = read_pascal_str(rest)?;
    data = rest;
    Some((key, value))
  })
}

fn read_pascal_str(data: &[u8]) -> Option<(&str, &[u8])> {
  let &len = data.first()?;
  let len = len as usize;
  let body = data.get(1..1 + len)?;
  let s = std::str::from_utf8(body).ok()?;
  Some((s, &data[1 + len..]))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn interns_assign_stable_monotonic_ids() {
    let mut t = AttrTable::new();
    let a = t.intern("asset_type");
    let b = t.intern("quote_currency");
    let a2 = t.intern("asset_type");
    assert_eq!(a, a2);
    assert_ne!(a, b);
    assert_eq!(t.str_of(a), Some("asset_type"));
  }

  #[test]
  fn iterates_packed_attr_dict() {
    let mut data = Vec::new();
    for (k, v) in [("asset_type", "Crypto"), ("base", "BTC")] {
      data.push(k.len() as u8);
      data.extend_from_slice(k.as_bytes());
      data.push(v.len() as u8);
      data.extend_from_slice(v.as_bytes());
    }
    let pairs: Vec<(&str, &str)> = iter_attr_dict(&data).collect();
    assert_eq!(pairs, vec![("asset_type", "Crypto"), ("base", "BTC")]);
  }
}
