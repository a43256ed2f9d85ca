use std::fmt;

/// 16-byte content hash of a pair's identifier tuple.
///
/// For `sni`/`dns` rows the hashed tuple is `(src, src_nuid, fqdn)`; for `ip` rows it is
/// `(src, src_nuid, dst, dst_nuid)`. Computing the hash is the aggregation source's
/// responsibility; this type only carries and renders it.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub [u8; 16]);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

impl std::str::FromStr for Fingerprint {
    type Err = FingerprintParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 32 {
            return Err(FingerprintParseError::WrongLength(s.len()));
        }
        let mut bytes = [0u8; 16];
        for (idx, chunk) in bytes.iter_mut().enumerate() {
            let hex_pair = &s[idx * 2..idx * 2 + 2];
            *chunk = u8::from_str_radix(hex_pair, 16)
                .map_err(|_| FingerprintParseError::NotHex(hex_pair.to_string()))?;
        }
        Ok(Fingerprint(bytes))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FingerprintParseError {
    #[error("fingerprint must be exactly 32 hex characters, got {0}")]
    WrongLength(usize),
    #[error("not valid hex: {0}")]
    NotHex(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_display_and_parse() {
        let fp = Fingerprint([0xde, 0xad, 0xbe, 0xef, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01]);
        let rendered = fp.to_string();
        assert_eq!(rendered, "DEADBEEF000000000000000000000001");
        let parsed: Fingerprint = rendered.parse().unwrap();
        assert_eq!(parsed, fp);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!("DEAD".parse::<Fingerprint>().is_err());
    }
}
