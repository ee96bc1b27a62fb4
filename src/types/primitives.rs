// Primitive types for the negotiation core
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Universal hash (Blake3), hex-encoded on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash([u8; 32]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hash arbitrary data with Blake3
    pub fn hash(data: &[u8]) -> Self {
        let hash = blake3::hash(data);
        Hash(*hash.as_bytes())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }
}

// Hex encoding keeps exported JSON stable across languages
impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        hex::encode(self.0).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        if bytes.len() != 32 {
            return Err(serde::de::Error::custom("hash must be 32 bytes"));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Hash(arr))
    }
}

/// Value in smallest-denomination native units (u128 covers any realistic MEV amount)
pub type Value = u128;

/// One native unit (10^18 smallest units, wei-style)
pub const UNIT: Value = 1_000_000_000_000_000_000;

/// One Gwei-equivalent (10^9 smallest units)
pub const GWEI: Value = 1_000_000_000;

/// Monotonic milliseconds as reported by the engine clock
pub type TimestampMs = u64;

/// Gas units for execution cost estimates
pub type GasUnits = u64;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident, $prefix:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Derive an id from a hash, tagged with the id-space prefix
            pub fn from_hash(hash: &Hash) -> Self {
                Self(format!("{}-{}", $prefix, hash))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Stable scout identity, assigned at first registration
    ScoutId,
    "scout"
);
string_id!(
    /// Unique bundle identifier, supplied by the submitting scout
    BundleId,
    "bundle"
);
string_id!(
    /// Challenge identifier, derived from the target bundle and issue time
    ChallengeId,
    "challenge"
);
string_id!(
    /// Counter-response identifier
    CounterId,
    "counter"
);
string_id!(
    /// Coalition identifier, derived from the member bundle set
    CoalitionId,
    "coalition"
);

/// Serde helper: u128 amounts as decimal strings.
///
/// Mandatory for cross-language stability; JSON numbers lose precision
/// above 2^53.
pub mod amount_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(amount: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        amount.to_string().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<u128>().map_err(serde::de::Error::custom)
    }
}
