use crate::error::{JsonError, JsonResult};
use crate::tokenizer::{tokenize, Token};

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  Obj,
  Arr,
  Str(String),
  Num(String),
  Bool(bool),
  Null,
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
  pub key: Option<String>,
  pub value: Value,
  pub parent: Option<NodeId>,
  pub children: Vec<NodeId>,
}

/// A compact arena built from a token stream: every JSON value becomes one
/// `Node`, addressed by its index into `nodes` rather than by pointer.
/// Queries walk `children` + `key` rather than re-parsing text, which is the
/// point of materializing the tree at all for repeated field lookups (e.g.
/// an RPC response read once but queried for several fields).
#[derive(Debug, Default)]
pub struct JsonTree {
  nodes: Vec<Node>,
  root: Option<NodeId>,
}

impl JsonTree {
  /// Parses exactly one top-level value out of `buf`, returning the tree and
  /// the number of bytes consumed. Propagates `JsonError::Incomplete` from the
  /// tokenizer unchanged so callers can retry once more bytes arrive.
  pub fn parse(buf: &[u8]) -> JsonResult<(Self, usize)> {
    let (tokens, consumed) = tokenize(buf)?;
    let mut tree = JsonTree::default();
    let mut iter = tokens.into_iter().peekable();
    let root = tree.build_value(&mut iter, None, None)?;
    tree.root = Some(root);
    Ok((tree, consumed))
  }

  pub fn root(&self) -> Option<NodeId> {
    self.root
  }

  pub fn value(&self, id: NodeId) -> &Value {
    &self.nodes[id].value
  }

  pub fn children(&self, id: NodeId) -> &[NodeId] {
    &self.nodes[id].children
  }

  /// Looks up a member of the object at `parent` by key. Returns `None` if
  /// `parent` is not an object node or the key is absent.
  pub fn find_val(&self, parent: NodeId, key: &str) -> Option<NodeId> {
    self.nodes[parent]
      .children
      .iter()
      .copied()
      .find(|&c| self.nodes[c].key.as_deref() == Some(key))
  }

  pub fn get_int(&self, id: NodeId) -> Option<i64> {
    match &self.nodes[id].value {
      Value::Num(s) => s.parse::<i64>().ok(),
      _ => None,
    }
  }

  pub fn get_uint(&self, id: NodeId) -> Option<u64> {
    match &self.nodes[id].value {
      Value::Num(s) => s.parse::<u64>().ok(),
      _ => None,
    }
  }

  pub fn get_f64(&self, id: NodeId) -> Option<f64> {
    match &self.nodes[id].value {
      Value::Num(s) => s.parse::<f64>().ok(),
      _ => None,
    }
  }

  pub fn get_bool(&self, id: NodeId) -> Option<bool> {
    match &self.nodes[id].value {
      Value::Bool(b) => Some(*b),
      _ => None,
    }
  }

  pub fn get_text(&self, id: NodeId) -> Option<&str> {
    match &self.nodes[id].value {
      Value::Str(s) => Some(s.as_str()),
      _ => None,
    }
  }

  fn push_node(&mut self, key: Option<String>, value: Value, parent: Option<NodeId>) -> NodeId {
    let id = self.nodes.len();
    self.nodes.push(Node {
      key,
      value,
      parent,
      children: Vec::new(),
    });
    if let Some(p) = parent {
      self.nodes[p].children.push(id);
    }
    id
  }

  fn build_value(
    &mut self,
    iter: &mut std::iter::Peekable<std::vec::IntoIter<Token>>,
    key: Option<String>,
    parent: Option<NodeId>,
  ) -> JsonResult<NodeId> {
    let tok = iter
      .next()
      .ok_or_else(|| JsonError::Invalid("unexpected end of token stream".into()))?;
    match tok {
      Token::StartObj => {
        let id = self.push_node(key, Value::Obj, parent);
        loop {
          match iter.peek() {
            Some(Token::EndObj) => {
              iter.next();
              break;
            }
            Some(Token::Key(_)) => {
              let k = match iter.next() {
                Some(Token::Key(k)) => k,
                _ => unreachable!(),
              };
              self.build_value(iter, Some(k), Some(id))?;
            }
            _ => return Err(JsonError::Invalid("expected key or '}'".into())),
          }
        }
        Ok(id)
      }
      Token::StartArr => {
        let id = self.push_node(key, Value::Arr, parent);
        loop {
          match iter.peek() {
            Some(Token::EndArr) => {
              iter.next();
              break;
            }
            Some(_) => {
              self.build_value(iter, None, Some(id))?;
            }
            None => return Err(JsonError::Invalid("expected value or ']'".into())),
          }
        }
        Ok(id)
      }
      Token::Str(s) => Ok(self.push_node(key, Value::Str(s), parent)),
      Token::Num(n) => Ok(self.push_node(key, Value::Num(n), parent)),
      Token::Bool(b) => Ok(self.push_node(key, Value::Bool(b), parent)),
      Token::Null => Ok(self.push_node(key, Value::Null, parent)),
      Token::EndObj | Token::EndArr | Token::Key(_) => {
        Err(JsonError::Invalid("unexpected token building value".into()))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn finds_nested_fields() {
    let body = br#"{"jsonrpc":"2.0","result":{"context":{"slot":42},"value":{"lamports":100}},"id":1}"#;
    let (tree, _) = JsonTree::parse(body).unwrap();
    let root = tree.root().unwrap();
    let result = tree.find_val(root, "result").unwrap();
    let context = tree.find_val(result, "context").unwrap();
    let slot = tree.find_val(context, "slot").unwrap();
    assert_eq!(tree.get_uint(slot), Some(42));

    let value = tree.find_val(result, "value").unwrap();
    let lamports = tree.find_val(value, "lamports").unwrap();
    assert_eq!(tree.get_uint(lamports), Some(100));
  }

  #[test]
  fn missing_key_returns_none() {
    let (tree, _) = JsonTree::parse(br#"{"a":1}"#).unwrap();
    let root = tree.root().unwrap();
    assert!(tree.find_val(root, "b").is_none());
  }

  #[test]
  fn array_children_preserve_order() {
    let (tree, _) = JsonTree::parse(br#"[3,1,2]"#).unwrap();
    let root = tree.root().unwrap();
    let vals: Vec<i64> = tree
      .children(root)
      .iter()
      .map(|&c| tree.get_int(c).unwrap())
      .collect();
    assert_eq!(vals, vec![3, 1, 2]);
  }
}
