// kb-common/src/model/checksum.rs
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::{KbError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumAlgorithm {
    Sha1,
    Sha256,
}

impl ChecksumAlgorithm {
    /// Length of the hex encoding of a digest.
    pub fn hex_len(self) -> usize {
        match self {
            Self::Sha1 => 40,
            Self::Sha256 => 64,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sha1" => Some(Self::Sha1),
            "sha256" => Some(Self::Sha256),
            _ => None,
        }
    }

    /// A fresh streaming hasher for this algorithm.
    pub fn hasher(self) -> Hasher {
        match self {
            Self::Sha1 => Hasher::Sha1(Sha1::new()),
            Self::Sha256 => Hasher::Sha256(Sha256::new()),
        }
    }

    pub fn hex_digest(self, bytes: &[u8]) -> String {
        let mut hasher = self.hasher();
        hasher.update(bytes);
        hasher.finalize_hex()
    }
}

/// Incremental digest over either supported algorithm.
pub enum Hasher {
    Sha1(Sha1),
    Sha256(Sha256),
}

impl Hasher {
    pub fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Sha1(h) => h.update(bytes),
            Self::Sha256(h) => h.update(bytes),
        }
    }

    pub fn finalize_hex(self) -> String {
        match self {
            Self::Sha1(h) => hex::encode(h.finalize()),
            Self::Sha256(h) => hex::encode(h.finalize()),
        }
    }
}

/// A known-good artifact digest. The hex value is stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum {
    algorithm: ChecksumAlgorithm,
    hex: String,
}

impl Checksum {
    pub fn new(algorithm: ChecksumAlgorithm, hex: &str) -> Result<Self> {
        let hex = hex.trim();
        if hex.len() != algorithm.hex_len() {
            return Err(KbError::Validation(format!(
                "{} checksum must be {} hex characters, got {}",
                algorithm.name(),
                algorithm.hex_len(),
                hex.len()
            )));
        }
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(KbError::Validation(format!(
                "{} checksum '{}' contains non-hex characters",
                algorithm.name(),
                hex
            )));
        }
        Ok(Self {
            algorithm,
            hex: hex.to_ascii_lowercase(),
        })
    }

    pub fn sha1(hex: &str) -> Result<Self> {
        Self::new(ChecksumAlgorithm::Sha1, hex)
    }

    pub fn sha256(hex: &str) -> Result<Self> {
        Self::new(ChecksumAlgorithm::Sha256, hex)
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Checks a hex digest computed elsewhere against this checksum.
    pub fn check_hex(&self, subject: &str, actual: &str) -> Result<()> {
        if actual.eq_ignore_ascii_case(&self.hex) {
            Ok(())
        } else {
            Err(KbError::Integrity {
                subject: subject.to_string(),
                expected: self.hex.clone(),
                actual: actual.to_ascii_lowercase(),
            })
        }
    }

    pub fn verify_bytes(&self, subject: &str, bytes: &[u8]) -> Result<()> {
        let actual = self.algorithm.hex_digest(bytes);
        tracing::debug!("Calculated {}: {} ({} bytes)", self.algorithm.name(), actual, bytes.len());
        tracing::debug!("Expected {}:   {}", self.algorithm.name(), self.hex);
        self.check_hex(subject, &actual)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.name(), self.hex)
    }
}

impl FromStr for Checksum {
    type Err = KbError;

    /// Accepts `sha1:<hex>`, `sha256:<hex>`, or a bare digest whose length
    /// identifies the algorithm.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some((algo, hex)) = s.split_once(':') {
            let algorithm = ChecksumAlgorithm::from_name(algo).ok_or_else(|| {
                KbError::Validation(format!("Unsupported checksum algorithm '{algo}'"))
            })?;
            return Self::new(algorithm, hex);
        }
        match s.len() {
            40 => Self::sha1(s),
            64 => Self::sha256(s),
            n => Err(KbError::Validation(format!(
                "Cannot infer checksum algorithm from a {n}-character digest"
            ))),
        }
    }
}

impl Serialize for Checksum {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Checksum {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
