//! Prefix-qualified, K-sortable identifiers for all engine entities.
//!
//! Every persisted entity uses a single [`Id`] type carrying a [`Prefix`]
//! that names the entity kind and a UUIDv7 suffix. The textual form is
//! `prefix_suffix` where the suffix is 26 characters of lowercase Crockford
//! base32, so identifiers are URL-safe and sort lexicographically in
//! generation order.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::{Error, Result};

const SUFFIX_LEN: usize = 26;

const ALPHABET: &[u8; 32] = b"0123456789abcdefghjkmnpqrstvwxyz";

const fn decode_table() -> [u8; 256] {
    let mut table = [0xff_u8; 256];
    let mut i = 0;
    while i < 32 {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
}

const DECODE: [u8; 256] = decode_table();

macro_rules! define_prefixes {
    ($($(#[$doc:meta])* $variant:ident => $text:literal, $new_fn:ident, $parse_fn:ident;)+) => {
        /// Entity kind encoded in an identifier prefix.
        ///
        /// The set is closed: parsing an unknown prefix fails.
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub enum Prefix {
            $($(#[$doc])* $variant,)+
        }

        impl Prefix {
            /// Returns the textual prefix.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }

            fn from_str(value: &str) -> Option<Self> {
                match value {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl Id {
            $(
                #[doc = concat!("Generates a new unique `", $text, "` identifier.")]
                pub fn $new_fn() -> Id {
                    Id::generate(Prefix::$variant)
                }

                #[doc = concat!("Parses a string and validates the `", $text, "` prefix.")]
                pub fn $parse_fn(value: &str) -> Result<Id> {
                    Id::parse_with_prefix(value, Prefix::$variant)
                }
            )+
        }
    };
}

define_prefixes! {
    /// Role.
    Role => "role", new_role, parse_role;
    /// Permission.
    Permission => "perm", new_permission, parse_permission;
    /// Role assignment.
    Assignment => "asgn", new_assignment, parse_assignment;
    /// ABAC policy.
    Policy => "wpol", new_policy, parse_policy;
    /// Relation tuple.
    Relation => "rel", new_relation, parse_relation;
    /// Check log entry.
    CheckLog => "chklog", new_check_log, parse_check_log;
    /// Resource type definition.
    ResourceType => "rtype", new_resource_type, parse_resource_type;
    /// Policy condition.
    Condition => "cond", new_condition, parse_condition;
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primary identifier type for all engine entities.
///
/// The zero value ([`Id::NIL`]) has an empty textual form and an empty
/// prefix; it maps to NULL in database columns. All other values carry a
/// prefix from the closed set and a 128-bit time-ordered suffix.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Id {
    inner: Option<(Prefix, u128)>,
}

impl Id {
    /// The zero identifier.
    pub const NIL: Id = Id { inner: None };

    /// Generates a new globally unique identifier with the given prefix.
    pub fn generate(prefix: Prefix) -> Id {
        Id {
            inner: Some((prefix, Uuid::now_v7().as_u128())),
        }
    }

    /// Parses a textual identifier (e.g. `role_01h2xcejqtf2nbrexx3vqjhp41`).
    pub fn parse(value: &str) -> Result<Id> {
        if value.is_empty() {
            return Err(Error::InvalidId("empty string".to_string()));
        }
        let Some((prefix, suffix)) = value.rsplit_once('_') else {
            return Err(Error::InvalidId(format!(
                "{value:?} is missing a prefix separator"
            )));
        };
        let Some(prefix) = Prefix::from_str(prefix) else {
            return Err(Error::InvalidId(format!("unknown prefix {prefix:?}")));
        };
        let suffix = decode_suffix(suffix)?;
        Ok(Id {
            inner: Some((prefix, suffix)),
        })
    }

    /// Parses a textual identifier and validates its prefix.
    pub fn parse_with_prefix(value: &str, expected: Prefix) -> Result<Id> {
        let parsed = Id::parse(value)?;
        match parsed.prefix() {
            Some(actual) if actual == expected => Ok(parsed),
            actual => Err(Error::PrefixMismatch {
                expected: expected.as_str(),
                actual: actual.map(Prefix::as_str).unwrap_or_default().to_string(),
            }),
        }
    }

    /// Returns the prefix, or `None` for the zero identifier.
    pub fn prefix(self) -> Option<Prefix> {
        self.inner.map(|(prefix, _)| prefix)
    }

    /// Reports whether this is the zero identifier.
    pub fn is_nil(&self) -> bool {
        self.inner.is_none()
    }

    /// Encodes for a database column. The zero identifier maps to NULL.
    pub fn to_db(self) -> Option<String> {
        self.inner.map(|_| self.to_string())
    }

    /// Decodes a database column value. NULL and the empty string map to
    /// the zero identifier.
    pub fn from_db(value: Option<&str>) -> Result<Id> {
        match value {
            None | Some("") => Ok(Id::NIL),
            Some(text) => Id::parse(text),
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some((prefix, suffix)) = self.inner else {
            return Ok(());
        };
        write!(f, "{}_{}", prefix.as_str(), encode_suffix(suffix))
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Id, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text.is_empty() {
            return Ok(Id::NIL);
        }
        Id::parse(&text).map_err(D::Error::custom)
    }
}

fn encode_suffix(value: u128) -> String {
    let mut out = [0u8; SUFFIX_LEN];
    for (i, slot) in out.iter_mut().enumerate() {
        let shift = 125 - 5 * i;
        *slot = ALPHABET[((value >> shift) & 0x1f) as usize];
    }
    // The alphabet is ASCII.
    String::from_utf8_lossy(&out).into_owned()
}

fn decode_suffix(text: &str) -> Result<u128> {
    let bytes = text.as_bytes();
    if bytes.len() != SUFFIX_LEN {
        return Err(Error::InvalidId(format!(
            "suffix must be {SUFFIX_LEN} characters, got {}",
            bytes.len()
        )));
    }
    let mut value: u128 = 0;
    for (i, &b) in bytes.iter().enumerate() {
        let digit = DECODE[b as usize];
        if digit == 0xff {
            return Err(Error::InvalidId(format!(
                "invalid suffix character {:?}",
                b as char
            )));
        }
        // The first character carries only the top 3 bits of the 128-bit value.
        if i == 0 && digit > 7 {
            return Err(Error::InvalidId(format!("suffix {text:?} overflows")));
        }
        value = (value << 5) | u128::from(digit);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_should_carry_prefix() {
        let id = Id::generate(Prefix::Role);
        assert!(!id.is_nil());
        assert_eq!(id.prefix(), Some(Prefix::Role));
        assert!(id.to_string().starts_with("role_"));
    }

    #[test]
    fn constructors_should_use_expected_prefixes() {
        let cases: [(Id, &str); 8] = [
            (Id::new_role(), "role_"),
            (Id::new_permission(), "perm_"),
            (Id::new_assignment(), "asgn_"),
            (Id::new_policy(), "wpol_"),
            (Id::new_relation(), "rel_"),
            (Id::new_check_log(), "chklog_"),
            (Id::new_resource_type(), "rtype_"),
            (Id::new_condition(), "cond_"),
        ];
        for (id, prefix) in cases {
            assert!(
                id.to_string().starts_with(prefix),
                "expected prefix {prefix:?}, got {id}"
            );
        }
    }

    #[test]
    fn parse_should_round_trip() {
        let original = Id::new_policy();
        let parsed = Id::parse(&original.to_string()).unwrap();
        assert_eq!(parsed, original);

        let typed = Id::parse_policy(&original.to_string()).unwrap();
        assert_eq!(typed, original);
    }

    #[test]
    fn parse_with_prefix_should_reject_foreign_prefix() {
        let perm = Id::new_permission().to_string();
        let err = Id::parse_role(&perm).unwrap_err();
        assert!(matches!(
            err,
            Error::PrefixMismatch { expected: "role", ref actual } if actual == "perm"
        ));
    }

    #[test]
    fn parse_should_reject_malformed_input() {
        for input in [
            "",
            "role",
            "role_",
            "role_short",
            "bogus_01h2xcejqtf2nbrexx3vqjhp41",
            "role_01h2xcejqtf2nbrexx3vqjhp4!",
        ] {
            assert!(Id::parse(input).is_err(), "expected error for {input:?}");
        }
    }

    #[test]
    fn parse_should_reject_overflowing_suffix() {
        let result = Id::parse(&format!("role_{}", "z".repeat(26)));
        assert!(matches!(result, Err(Error::InvalidId(_))));
    }

    #[test]
    fn textual_order_should_follow_generation_time() {
        let first = Id::new_role();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = Id::new_role();
        assert!(first.to_string() < second.to_string());
        assert!(first < second);
    }

    #[test]
    fn generated_ids_should_be_distinct() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(Id::new_relation()));
        }
    }

    #[test]
    fn nil_should_have_empty_text_and_prefix() {
        assert_eq!(Id::NIL.to_string(), "");
        assert_eq!(Id::NIL.prefix(), None);
        assert!(Id::NIL.is_nil());
        assert_eq!(Id::default(), Id::NIL);
    }

    #[test]
    fn db_codec_should_map_nil_to_null() {
        assert_eq!(Id::NIL.to_db(), None);
        assert_eq!(Id::from_db(None).unwrap(), Id::NIL);
        assert_eq!(Id::from_db(Some("")).unwrap(), Id::NIL);

        let id = Id::new_assignment();
        let column = id.to_db().unwrap();
        assert_eq!(Id::from_db(Some(&column)).unwrap(), id);
    }

    #[test]
    fn serde_should_round_trip_as_text() {
        let id = Id::new_resource_type();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("{:?}", id.to_string()));
        let back: Id = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);

        let nil: Id = serde_json::from_str("\"\"").unwrap();
        assert_eq!(nil, Id::NIL);
    }
}
