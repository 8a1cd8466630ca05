//! The envelope carried (encrypted) inside every link object.

use crate::commit::CommitId;
use crate::error::{ProtocolError, ProtocolResult};
use ciborium::value::Value;

/// Envelope format version written by this crate.
pub const PAYLOAD_FORMAT_VERSION: u32 = 1;

/// Plaintext content of a link object.
///
/// The delta bytes are opaque here; only the version-control collaborator
/// understands them. The embedded link name binds the payload to the object
/// it was uploaded as, so a renamed or copied object is detected on pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPayload {
    /// Envelope format version.
    pub format_version: u32,
    /// Object name the payload was uploaded under.
    pub link: String,
    /// Commit the delta assumes is already present.
    pub baseline: Option<CommitId>,
    /// Commit reachable at the delta's head.
    pub head: CommitId,
    /// Version-control delta.
    pub delta: Vec<u8>,
}

impl LinkPayload {
    /// Creates a payload at the current format version.
    pub fn new(
        link: impl Into<String>,
        baseline: Option<CommitId>,
        head: CommitId,
        delta: Vec<u8>,
    ) -> Self {
        Self {
            format_version: PAYLOAD_FORMAT_VERSION,
            link: link.into(),
            baseline,
            head,
            delta,
        }
    }

    /// Encodes to CBOR.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Payload`] if serialization fails.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        let mut pairs = vec![
            (
                Value::Text("format_version".into()),
                Value::Integer(self.format_version.into()),
            ),
            (Value::Text("link".into()), Value::Text(self.link.clone())),
            (
                Value::Text("head".into()),
                Value::Text(self.head.as_str().to_string()),
            ),
            (Value::Text("delta".into()), Value::Bytes(self.delta.clone())),
        ];

        if let Some(baseline) = &self.baseline {
            pairs.push((
                Value::Text("baseline".into()),
                Value::Text(baseline.as_str().to_string()),
            ));
        }

        let mut out = Vec::with_capacity(self.delta.len() + 128);
        ciborium::ser::into_writer(&Value::Map(pairs), &mut out)
            .map_err(|e| ProtocolError::Payload(e.to_string()))?;
        Ok(out)
    }

    /// Decodes from CBOR.
    ///
    /// Unknown keys are ignored. A newer `format_version` is reported as an
    /// error rather than guessed at.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Payload`] for malformed CBOR, a missing or
    /// mistyped field, or an unsupported version; [`ProtocolError::InvalidCommit`]
    /// for an unparseable commit id.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        let value: Value = ciborium::de::from_reader(bytes)
            .map_err(|e| ProtocolError::Payload(e.to_string()))?;
        let map = value
            .as_map()
            .ok_or_else(|| ProtocolError::Payload("expected map".into()))?;

        let get_field = |name: &str| {
            map.iter()
                .find(|(k, _)| k.as_text() == Some(name))
                .map(|(_, v)| v)
        };
        let missing = |name: &str| ProtocolError::Payload(format!("missing {name}"));

        let format_version = get_field("format_version")
            .and_then(Value::as_integer)
            .and_then(|i| u32::try_from(i).ok())
            .ok_or_else(|| missing("format_version"))?;
        if format_version == 0 || format_version > PAYLOAD_FORMAT_VERSION {
            return Err(ProtocolError::Payload(format!(
                "unsupported format version {format_version}"
            )));
        }

        let link = get_field("link")
            .and_then(Value::as_text)
            .ok_or_else(|| missing("link"))?
            .to_string();

        let head = get_field("head")
            .and_then(Value::as_text)
            .ok_or_else(|| missing("head"))
            .and_then(CommitId::new)?;

        let baseline = match get_field("baseline") {
            None | Some(Value::Null) => None,
            Some(v) => Some(
                v.as_text()
                    .ok_or_else(|| ProtocolError::Payload("baseline must be text".into()))
                    .and_then(CommitId::new)?,
            ),
        };

        let delta = get_field("delta")
            .and_then(Value::as_bytes)
            .ok_or_else(|| missing("delta"))?
            .clone();

        Ok(Self {
            format_version,
            link,
            baseline,
            head,
            delta,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(hex: &str) -> CommitId {
        CommitId::new(hex).unwrap()
    }

    fn encode_value(value: &Value) -> Vec<u8> {
        let mut out = Vec::new();
        ciborium::ser::into_writer(value, &mut out).unwrap();
        out
    }

    #[test]
    fn payload_with_baseline() {
        let payload = LinkPayload::new(
            "0000000002.000001.laptop.9.final.ab.link",
            Some(commit("aaaa1111")),
            commit("bbbb2222"),
            vec![1, 2, 3],
        );
        let decoded = LinkPayload::decode(&payload.encode().unwrap()).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn payload_without_baseline() {
        let payload = LinkPayload::new("x", None, commit("cafe"), vec![0]);
        let decoded = LinkPayload::decode(&payload.encode().unwrap()).unwrap();
        assert_eq!(decoded.baseline, None);
        assert_eq!(decoded.format_version, PAYLOAD_FORMAT_VERSION);
    }

    #[test]
    fn rejects_future_version() {
        let value = Value::Map(vec![
            (Value::Text("format_version".into()), Value::Integer(2u32.into())),
            (Value::Text("link".into()), Value::Text("x".into())),
            (Value::Text("head".into()), Value::Text("cafe".into())),
            (Value::Text("delta".into()), Value::Bytes(vec![1])),
        ]);
        let err = LinkPayload::decode(&encode_value(&value)).unwrap_err();
        assert!(err.to_string().contains("unsupported format version"));
    }

    #[test]
    fn rejects_missing_head() {
        let value = Value::Map(vec![
            (Value::Text("format_version".into()), Value::Integer(1u32.into())),
            (Value::Text("link".into()), Value::Text("x".into())),
            (Value::Text("delta".into()), Value::Bytes(vec![1])),
        ]);
        assert_eq!(
            LinkPayload::decode(&encode_value(&value)),
            Err(ProtocolError::Payload("missing head".into()))
        );
    }

    #[test]
    fn rejects_bad_commit() {
        let value = Value::Map(vec![
            (Value::Text("format_version".into()), Value::Integer(1u32.into())),
            (Value::Text("link".into()), Value::Text("x".into())),
            (Value::Text("head".into()), Value::Text("not-hex".into())),
            (Value::Text("delta".into()), Value::Bytes(vec![1])),
        ]);
        assert!(matches!(
            LinkPayload::decode(&encode_value(&value)),
            Err(ProtocolError::InvalidCommit(_))
        ));
    }

    #[test]
    fn rejects_non_map_and_garbage() {
        assert!(LinkPayload::decode(&encode_value(&Value::Integer(5u32.into()))).is_err());
        assert!(LinkPayload::decode(&[0xff, 0x00, 0x13]).is_err());
    }
}
