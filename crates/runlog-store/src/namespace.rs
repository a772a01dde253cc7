//! Structured environment namespaces.

use std::fmt;

use serde::{Deserialize, Serialize};

const SEPARATOR: char = '/';

/// The `(environment type, environment id)` pair addressing an environment's
/// storage subtree.
///
/// The joined `"{kind}/{id}"` form only exists at the storage boundary. Ids may
/// themselves contain `/`; parsing splits on the first separator only, so
/// `render` and `parse` round-trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Namespace {
  kind: String,
  id: String,
}

impl Namespace {
  pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
    Self {
      kind: kind.into(),
      id: id.into(),
    }
  }

  /// A namespace that renders to the empty string.
  pub fn empty() -> Self {
    Self::default()
  }

  /// Parse the joined form produced by [`Namespace::render`].
  pub fn parse(value: &str) -> Self {
    match value.split_once(SEPARATOR) {
      Some((kind, id)) => Self::new(kind, id),
      None => Self::new(value, ""),
    }
  }

  pub fn kind(&self) -> &str {
    &self.kind
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  /// True unless both parts are present.
  pub fn is_empty(&self) -> bool {
    self.kind.is_empty() || self.id.is_empty()
  }

  /// `"{kind}/{id}"`, or `""` when either part is missing.
  pub fn render(&self) -> String {
    if self.is_empty() {
      String::new()
    } else {
      format!("{}{}{}", self.kind, SEPARATOR, self.id)
    }
  }
}

impl fmt::Display for Namespace {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.render())
  }
}

impl From<String> for Namespace {
  fn from(value: String) -> Self {
    Self::parse(&value)
  }
}

impl From<Namespace> for String {
  fn from(value: Namespace) -> Self {
    value.render()
  }
}
