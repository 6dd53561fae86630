use std::{fmt, str::FromStr};

use anyhow::{Context as _, Error, Result, bail};
use chrono::Utc;
use macaddr::MacAddr6;
use serde::Serialize;
use sha1::{Digest as _, Sha1};

const TOKEN_ID_LEN: usize = 40;

/// Station identity: a lowercase hex SHA-1 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TokenId(String);

impl TokenId {
    pub fn from_mac_address(mac_address: MacAddr6) -> Self {
        Self::from_mac_str(&mac_address.to_string())
    }

    /// Hashes the MAC address as reported, upper-cased. Not validated: a board
    /// reporting a malformed address still gets a stable identity.
    pub fn from_mac_str(mac_address: &str) -> Self {
        Self(sha1_hex(&mac_address.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn sensor_id(&self) -> &str {
        &self.0[..12]
    }

    pub fn login(&self) -> Result<u64> {
        let login = &self.0[12..20];
        u64::from_str_radix(login, 16)
            .with_context(|| format!("failed to parse login from token segment: {login}"))
    }

    /// MAC-like signing key, e.g. `01:23:45:67:89:AB`.
    pub fn signing_key(&self) -> String {
        self.0[..12]
            .as_bytes()
            .chunks(2)
            .map(|pair| String::from_utf8_lossy(pair).to_uppercase())
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl FromStr for TokenId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = s.len() == TOKEN_ID_LEN
            && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !valid {
            let example = sha1_hex(&Utc::now().timestamp_micros().to_string());
            bail!("invalid station token ID: '{s}' (must be valid SHA1 sum, like '{example}')");
        }

        Ok(Self(s.to_owned()))
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn sha1_hex(s: &str) -> String {
    hex::encode(Sha1::digest(s.as_bytes()))
}
