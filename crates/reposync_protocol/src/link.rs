//! Link identifiers and their object-name codec.
//!
//! A link's store object name carries its whole identifier:
//!
//! ```text
//! 0000000042.000003.laptop.1718000000000.open.9f2c41d07b8e4a55.link
//! ^number    ^gen   ^instance ^instance ts ^final ^nonce         ^suffix
//! ```
//!
//! `number` and `generation` are zero-padded to a fixed width and come
//! first, so a plain lexicographic sort of names agrees with chain order.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Field separator inside link names.
pub const SEPARATOR: char = '.';
/// Fixed width of the chain position field.
pub const NUMBER_WIDTH: usize = 10;
/// Fixed width of the generation field.
pub const GENERATION_WIDTH: usize = 6;
/// Largest chain position that fits the padding width.
pub const MAX_NUMBER: u64 = 9_999_999_999;
/// Largest generation that fits the padding width.
pub const MAX_GENERATION: u32 = 999_999;
/// Trailing token of every link name.
pub const LINK_SUFFIX: &str = "link";

const FINAL_TOKEN: &str = "final";
const OPEN_TOKEN: &str = "open";
const MAX_NONCE_LEN: usize = 64;
const FIELD_COUNT: usize = 7;

/// Identifier of one chain link.
///
/// Link identifiers are created only at push time and never change once
/// uploaded; amending a position creates a new generation instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkId {
    /// Chain position (starts at 1).
    pub number: u64,
    /// Revision of this position (starts at 1).
    pub generation: u32,
    /// Instance that wrote the link.
    pub instance_id: String,
    /// Writer's clock when the link was named (milliseconds).
    pub instance_timestamp: u64,
    /// Whether this link closes its position.
    pub is_final: bool,
    /// Random token making concurrent names distinct.
    pub nonce: String,
}

impl LinkId {
    /// Creates a link identifier.
    pub fn new(
        number: u64,
        generation: u32,
        instance_id: impl Into<String>,
        instance_timestamp: u64,
        is_final: bool,
        nonce: impl Into<String>,
    ) -> Self {
        Self {
            number,
            generation,
            instance_id: instance_id.into(),
            instance_timestamp,
            is_final,
            nonce: nonce.into(),
        }
    }

    /// Returns `(number, generation)`.
    #[must_use]
    pub fn position(&self) -> (u64, u32) {
        (self.number, self.generation)
    }

    /// Returns true if `self` replaces `other` in place: same position,
    /// later generation, and `other` was still open.
    #[must_use]
    pub fn supersedes(&self, other: &LinkId) -> bool {
        self.number == other.number && self.generation > other.generation && !other.is_final
    }

    /// Checks that the identifier can be encoded.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidIdentifier`] describing the first
    /// violated constraint.
    pub fn validate(&self) -> ProtocolResult<()> {
        if self.number == 0 || self.number > MAX_NUMBER {
            return Err(ProtocolError::InvalidIdentifier(format!(
                "number {} outside 1..={MAX_NUMBER}",
                self.number
            )));
        }
        if self.generation == 0 || self.generation > MAX_GENERATION {
            return Err(ProtocolError::InvalidIdentifier(format!(
                "generation {} outside 1..={MAX_GENERATION}",
                self.generation
            )));
        }
        if let Some(reason) = instance_id_problem(&self.instance_id) {
            return Err(ProtocolError::InvalidIdentifier(format!(
                "instance id {:?} {reason}",
                self.instance_id
            )));
        }
        if let Some(reason) = nonce_problem(&self.nonce) {
            return Err(ProtocolError::InvalidIdentifier(format!(
                "nonce {:?} {reason}",
                self.nonce
            )));
        }
        Ok(())
    }

    /// Encodes the identifier as a store object name.
    ///
    /// # Errors
    ///
    /// Fails if any field violates [`validate`](Self::validate), in
    /// particular if the instance id contains [`SEPARATOR`].
    pub fn encode(&self) -> ProtocolResult<String> {
        self.validate()?;
        Ok(format!(
            "{number:0nw$}{sep}{generation:0gw$}{sep}{instance}{sep}{ts}{sep}{state}{sep}{nonce}{sep}{LINK_SUFFIX}",
            number = self.number,
            generation = self.generation,
            instance = self.instance_id,
            ts = self.instance_timestamp,
            state = if self.is_final { FINAL_TOKEN } else { OPEN_TOKEN },
            nonce = self.nonce,
            sep = SEPARATOR,
            nw = NUMBER_WIDTH,
            gw = GENERATION_WIDTH,
        ))
    }

    /// Decodes a store object name.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedName`] for any name that
    /// [`encode`](Self::encode) could not have produced.
    pub fn decode(name: &str) -> ProtocolResult<Self> {
        let fields: Vec<&str> = name.split(SEPARATOR).collect();
        if fields.len() != FIELD_COUNT {
            return Err(ProtocolError::malformed(
                name,
                format!("expected {FIELD_COUNT} fields, found {}", fields.len()),
            ));
        }
        if fields[6] != LINK_SUFFIX {
            return Err(ProtocolError::malformed(name, "missing link suffix"));
        }

        let number = parse_padded(name, fields[0], NUMBER_WIDTH, "number")?;
        let generation = parse_padded(name, fields[1], GENERATION_WIDTH, "generation")?;
        let generation = u32::try_from(generation)
            .map_err(|_| ProtocolError::malformed(name, "generation out of range"))?;

        let instance_id = fields[2];
        if let Some(reason) = instance_id_problem(instance_id) {
            return Err(ProtocolError::malformed(name, format!("instance id {reason}")));
        }

        let instance_timestamp = parse_canonical_u64(fields[3])
            .ok_or_else(|| ProtocolError::malformed(name, "bad instance timestamp"))?;

        let is_final = match fields[4] {
            FINAL_TOKEN => true,
            OPEN_TOKEN => false,
            other => {
                return Err(ProtocolError::malformed(
                    name,
                    format!("unknown state token {other:?}"),
                ))
            }
        };

        let nonce = fields[5];
        if let Some(reason) = nonce_problem(nonce) {
            return Err(ProtocolError::malformed(name, format!("nonce {reason}")));
        }

        let id = LinkId::new(
            number,
            generation,
            instance_id,
            instance_timestamp,
            is_final,
            nonce,
        );
        if number == 0 || generation == 0 {
            return Err(ProtocolError::malformed(name, "positions start at 1"));
        }
        Ok(id)
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{}.{}{} by {}",
            self.number,
            self.generation,
            if self.is_final { " (final)" } else { "" },
            self.instance_id
        )
    }
}

fn instance_id_problem(instance_id: &str) -> Option<&'static str> {
    if instance_id.is_empty() {
        Some("is empty")
    } else if instance_id.contains(SEPARATOR) {
        Some("contains the field separator")
    } else if instance_id
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_whitespace() || c.is_control())
    {
        Some("contains a path, whitespace or control character")
    } else {
        None
    }
}

fn nonce_problem(nonce: &str) -> Option<&'static str> {
    if nonce.is_empty() {
        Some("is empty")
    } else if nonce.len() > MAX_NONCE_LEN {
        Some("is too long")
    } else if !nonce.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some("must be ASCII alphanumeric")
    } else {
        None
    }
}

fn parse_padded(name: &str, field: &str, width: usize, what: &str) -> ProtocolResult<u64> {
    if field.len() != width || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProtocolError::malformed(
            name,
            format!("{what} must be {width} digits"),
        ));
    }
    field
        .parse()
        .map_err(|_| ProtocolError::malformed(name, format!("{what} out of range")))
}

/// Parses a plain decimal without sign or leading zeros.
fn parse_canonical_u64(field: &str) -> Option<u64> {
    if field.is_empty()
        || !field.bytes().all(|b| b.is_ascii_digit())
        || (field.len() > 1 && field.starts_with('0'))
    {
        return None;
    }
    field.parse().ok()
}
