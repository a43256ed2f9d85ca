use uuid::Uuid;

/// Identifies which network/agent a host belongs to.
///
/// Publicly-routable IPs carry [`NetworkId::PUBLIC`]; privately-routable IPs observed by an
/// unknown agent carry [`NetworkId::PRIVATE_UNKNOWN_AGENT`]; everything else carries the
/// configured agent's own UUID.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct NetworkId(pub Uuid);

impl NetworkId {
    pub const PUBLIC: Self = Self(Uuid::from_bytes([0xff; 16]));

    pub const PRIVATE_UNKNOWN_AGENT: Self = Self(Uuid::from_bytes([
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xfe,
    ]));

    pub fn agent(id: Uuid) -> Self {
        Self(id)
    }

    pub fn is_public(&self) -> bool {
        *self == Self::PUBLIC
    }

    pub fn is_private_unknown_agent(&self) -> bool {
        *self == Self::PRIVATE_UNKNOWN_AGENT
    }
}

impl std::fmt::Display for NetworkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_render_as_documented() {
        assert_eq!(
            NetworkId::PUBLIC.to_string(),
            "ffffffff-ffff-ffff-ffff-ffffffffffff"
        );
        assert_eq!(
            NetworkId::PRIVATE_UNKNOWN_AGENT.to_string(),
            "ffffffff-ffff-ffff-ffff-fffffffffffe"
        );
    }

    #[test]
    fn agent_id_is_distinct_from_sentinels() {
        let agent = NetworkId::agent(Uuid::nil());
        assert!(!agent.is_public());
        assert!(!agent.is_private_unknown_agent());
    }
}
