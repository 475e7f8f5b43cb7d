//! Opaque keyset cursors.
//!
//! A cursor names a position in the `(created_at, id)` ordering of a
//! conversation's messages. Its wire form is `"<created_at>_<id>"` where
//! `created_at` is RFC 3339 UTC with fixed microsecond precision and `id` is
//! a hyphenated UUID. Neither component can contain `_`.

use std::{fmt, str::FromStr};

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::{Error, Result};

const SEPARATOR: char = '_';

/// Format a timestamp the way cursors and the store both encode it.
///
/// Fixed precision keeps lexical and chronological order in agreement.
/// Sub-microsecond digits are dropped.
pub fn encode_timestamp(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// A decoded cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor {
  pub created_at: DateTime<Utc>,
  pub id:         Uuid,
}

impl Cursor {
  pub fn new(created_at: DateTime<Utc>, id: Uuid) -> Self { Self { created_at, id } }

  /// Encode into the opaque wire form.
  pub fn encode(&self) -> String {
    format!(
      "{}{SEPARATOR}{}",
      encode_timestamp(self.created_at),
      self.id.hyphenated()
    )
  }

  /// Decode the opaque wire form.
  pub fn decode(s: &str) -> Result<Self> {
    let malformed = || Error::MalformedCursor(s.to_owned());

    let (ts, id) = s.split_once(SEPARATOR).ok_or_else(malformed)?;
    if ts.is_empty() || id.is_empty() || id.contains(SEPARATOR) {
      return Err(malformed());
    }

    let created_at = DateTime::parse_from_rfc3339(ts)
      .map_err(|_| malformed())?
      .with_timezone(&Utc);
    let id = Uuid::parse_str(id).map_err(|_| malformed())?;

    Ok(Self { created_at, id })
  }
}

impl fmt::Display for Cursor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.encode())
  }
}

impl FromStr for Cursor {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> { Self::decode(s) }
}
