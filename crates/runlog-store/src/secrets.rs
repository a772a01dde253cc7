//! Selective encryption of variable dictionaries.
//!
//! String values are secrets and are encrypted; every other value is stored
//! as is. The split is carried by the types: a [`PlainValue`] can never hold a
//! string, so a secret cannot reach disk unencrypted, and only
//! [`SealedValue::Encrypted`] entries are ever handed to the cipher on load.

use std::collections::BTreeMap;

use runlog_crypto::Cipher;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;

/// A variable map as exchanged with callers.
pub type Variables = BTreeMap<String, Value>;

/// A non-string JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct PlainValue(Value);

impl PlainValue {
  pub fn as_value(&self) -> &Value {
    &self.0
  }

  pub fn into_value(self) -> Value {
    self.0
  }
}

impl TryFrom<Value> for PlainValue {
  type Error = String;

  fn try_from(value: Value) -> Result<Self, Self::Error> {
    match value {
      Value::String(_) => Err("string values must be sealed as secrets".to_string()),
      other => Ok(Self(other)),
    }
  }
}

impl From<PlainValue> for Value {
  fn from(value: PlainValue) -> Self {
    value.0
  }
}

/// A caller-side variable, classified by whether it must be encrypted.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableValue {
  Secret(String),
  Plain(PlainValue),
}

impl From<Value> for VariableValue {
  fn from(value: Value) -> Self {
    match value {
      Value::String(s) => Self::Secret(s),
      other => Self::Plain(PlainValue(other)),
    }
  }
}

impl From<VariableValue> for Value {
  fn from(value: VariableValue) -> Self {
    match value {
      VariableValue::Secret(s) => Value::String(s),
      VariableValue::Plain(p) => p.into_value(),
    }
  }
}

/// A variable as persisted, tagged with how it was stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SealedValue {
  Encrypted(String),
  Plain(PlainValue),
}

/// Encrypt every secret in `data`.
pub fn seal(
  data: &Variables,
  cipher: &dyn Cipher,
  key: Option<&str>,
) -> Result<BTreeMap<String, SealedValue>, StoreError> {
  data
    .iter()
    .map(|(name, value)| {
      let sealed = match VariableValue::from(value.clone()) {
        VariableValue::Secret(plain) => {
          let ciphertext =
            cipher
              .encrypt(&plain, key)
              .map_err(|source| StoreError::Encryption {
                entry: name.clone(),
                source,
              })?;
          SealedValue::Encrypted(ciphertext)
        }
        VariableValue::Plain(plain) => SealedValue::Plain(plain),
      };
      Ok::<_, StoreError>((name.clone(), sealed))
    })
    .collect()
}

/// Decrypt the entries that were encrypted by [`seal`].
pub fn unseal(
  sealed: BTreeMap<String, SealedValue>,
  cipher: &dyn Cipher,
  key: Option<&str>,
) -> Result<Variables, StoreError> {
  sealed
    .into_iter()
    .map(|(name, value)| {
      let value = match value {
        SealedValue::Encrypted(ciphertext) => {
          let plain = cipher
            .decrypt(&ciphertext, key)
            .map_err(|source| StoreError::Encryption {
              entry: name.clone(),
              source,
            })?;
          Value::String(plain)
        }
        SealedValue::Plain(plain) => plain.into_value(),
      };
      Ok::<_, StoreError>((name, value))
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use runlog_crypto::ChaChaCipher;
  use serde_json::json;

  #[test]
  fn test_classification() {
    assert_eq!(
      VariableValue::from(json!("pw")),
      VariableValue::Secret("pw".to_string())
    );
    assert!(matches!(
      VariableValue::from(json!({"nested": "str"})),
      VariableValue::Plain(_)
    ));
    assert!(PlainValue::try_from(json!("no")).is_err());
  }

  #[test]
  fn test_seal_only_encrypts_strings() {
    let cipher = ChaChaCipher::with_default_key("k");
    let data: Variables = [
      ("token".to_string(), json!("abc")),
      ("retries".to_string(), json!(3)),
      ("flags".to_string(), json!([true, "x"])),
    ]
    .into_iter()
    .collect();

    let sealed = seal(&data, &cipher, None).unwrap();
    assert!(matches!(&sealed["token"], SealedValue::Encrypted(c) if c != "abc"));
    assert!(matches!(&sealed["retries"], SealedValue::Plain(p) if p.as_value() == &json!(3)));
    assert!(matches!(&sealed["flags"], SealedValue::Plain(_)));

    let opened = unseal(sealed, &cipher, None).unwrap();
    assert_eq!(opened, data);
  }

  #[test]
  fn test_unseal_reports_entry_on_wrong_key() {
    let cipher = ChaChaCipher::with_default_key("k");
    let data: Variables = [("token".to_string(), json!("abc"))].into_iter().collect();
    let sealed = seal(&data, &cipher, None).unwrap();

    let err = unseal(sealed, &cipher, Some("other")).unwrap_err();
    assert!(matches!(err, StoreError::Encryption { entry, .. } if entry == "token"));
  }

  #[test]
  fn test_tagged_plain_string_is_rejected() {
    let raw = json!({"type": "plain", "value": "leaked"});
    assert!(serde_json::from_value::<SealedValue>(raw).is_err());
  }
}
