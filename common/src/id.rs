// Fleeting Expiring Paste Service
// Copyright (C) 2021  Edward Shen
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::fmt::{Debug, Display};
use std::str::FromStr;

use rand::prelude::Distribution;
use rand::Rng;
use serde::de::{Unexpected, Visitor};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Length of the hyphenated form, e.g. `67e55044-10b1-426f-9247-bb680e5fe0c8`.
const TEXT_LEN: usize = 36;

/// Identifier of a paste. It is also the only thing protecting a paste from
/// being read, so it must only ever come from [`Generator`] fed by a secure
/// rng.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PasteId(Uuid);

impl PasteId {
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Debug for PasteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PasteId").field(&self.to_string()).finish()
    }
}

impl Display for PasteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0.hyphenated(), f)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseIdError {
    #[error("expected a {TEXT_LEN} character id, got {0} characters")]
    Length(usize),
    #[error("not a hyphenated hex id")]
    Malformed,
}

impl FromStr for PasteId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Uuid::try_parse also takes the simple, braced and urn forms; share
        // links only ever carry the hyphenated one.
        if s.len() != TEXT_LEN {
            return Err(ParseIdError::Length(s.len()));
        }

        Uuid::try_parse(s)
            .map(Self)
            .map_err(|_| ParseIdError::Malformed)
    }
}

impl Serialize for PasteId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PasteId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct PasteIdVisitor;
        impl<'de> Visitor<'de> for PasteIdVisitor {
            type Value = PasteId;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a hyphenated paste id")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse().map_err(|e| match e {
                    ParseIdError::Length(len) => E::invalid_length(len, &"a 36 character id"),
                    ParseIdError::Malformed => {
                        E::invalid_value(Unexpected::Str(v), &"a hyphenated hex id")
                    }
                })
            }
        }

        deserializer.deserialize_str(PasteIdVisitor)
    }
}

/// Samples fresh random ids. The version and variant bits are set so the
/// result is a well-formed v4 UUID; the other 122 bits come from the rng.
pub struct Generator;

impl Distribution<PasteId> for Generator {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> PasteId {
        let mut bytes = [0_u8; 16];
        rng.fill(&mut bytes[..]);
        PasteId(uuid::Builder::from_random_bytes(bytes).into_uuid())
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::OsRng;

    use super::*;

    #[test]
    fn generated_ids_are_v4_and_parse_back() {
        let id: PasteId = OsRng.sample(Generator);
        let text = id.to_string();

        assert_eq!(text.len(), TEXT_LEN);
        assert_eq!(id.0.get_version_num(), 4);
        assert_eq!(text.parse::<PasteId>(), Ok(id));
    }

    #[test]
    fn generated_ids_differ() {
        let a: PasteId = OsRng.sample(Generator);
        let b: PasteId = OsRng.sample(Generator);
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_other_uuid_forms() {
        assert_eq!(
            "67e5504410b1426f9247bb680e5fe0c8".parse::<PasteId>(),
            Err(ParseIdError::Length(32))
        );
        assert_eq!(
            "{67e55044-10b1-426f-9247-bb680e5fe0c8}".parse::<PasteId>(),
            Err(ParseIdError::Length(38))
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(
            "67e55044-10b1-426f-9247-bb680e5fe0cz".parse::<PasteId>(),
            Err(ParseIdError::Malformed)
        );
        assert_eq!(
            "67e55044x10b1-426f-9247-bb680e5fe0c8".parse::<PasteId>(),
            Err(ParseIdError::Malformed)
        );
        assert_eq!("".parse::<PasteId>(), Err(ParseIdError::Length(0)));
    }

    #[test]
    fn deserializes_from_json_string() {
        let id: PasteId = serde_json::from_str("\"67E55044-10B1-426F-9247-BB680E5FE0C8\"").unwrap();
        assert_eq!(id.to_string(), "67e55044-10b1-426f-9247-bb680e5fe0c8");

        assert!(serde_json::from_str::<PasteId>("\"nope\"").is_err());
    }
}
