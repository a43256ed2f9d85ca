//! Modifier-stage queries: rare-signature and MIME-type-mismatch pairs, joined
//! against the current import's indicator rows.

use std::net::IpAddr;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::TryStreamExt as _;
use rita_types::{BeaconType, Error, Fingerprint, NetworkId, Result};
use sqlx::PgPool;
use uuid::Uuid;

/// One `(src, signature)` pair used by exactly one destination or fqdn in the window.
#[derive(Clone, Debug)]
pub struct RareSignatureHit {
    pub hash: Fingerprint,
    pub src: IpAddr,
    pub src_nuid: NetworkId,
    pub dst: Option<IpAddr>,
    pub dst_nuid: Option<NetworkId>,
    pub fqdn: Option<String>,
    pub beacon_type: BeaconType,
    pub signature: String,
}

/// One `(src, fqdn)` pair with a MIME type that disagrees with the requested URI's extension.
#[derive(Clone, Debug)]
pub struct MimeMismatchHit {
    pub hash: Fingerprint,
    pub src: IpAddr,
    pub src_nuid: NetworkId,
    pub dst: Option<IpAddr>,
    pub dst_nuid: Option<NetworkId>,
    pub fqdn: Option<String>,
    pub beacon_type: BeaconType,
    pub mime_type: String,
    pub uri_extension: String,
}

#[async_trait]
pub trait ModifierSource: Send + Sync {
    async fn rare_signatures(&self, import_id: Uuid) -> Result<BoxStream<'_, Result<RareSignatureHit>>>;
    async fn mime_mismatches(&self, import_id: Uuid) -> Result<BoxStream<'_, Result<MimeMismatchHit>>>;
}

pub struct PgModifierSource {
    pool: PgPool,
}

impl PgModifierSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RareSignatureRow {
    hash: Vec<u8>,
    src: IpAddr,
    src_nuid: Uuid,
    dst: Option<IpAddr>,
    dst_nuid: Option<Uuid>,
    fqdn: Option<String>,
    beacon_type: i16,
    signature: String,
}

impl TryFrom<RareSignatureRow> for RareSignatureHit {
    type Error = Error;

    fn try_from(row: RareSignatureRow) -> Result<Self> {
        Ok(Self {
            hash: Fingerprint(
                row.hash
                    .try_into()
                    .map_err(|v: Vec<u8>| Error::InvalidConfig(format!("hash column is {} bytes", v.len())))?,
            ),
            src: row.src,
            src_nuid: NetworkId(row.src_nuid),
            dst: row.dst,
            dst_nuid: row.dst_nuid.map(NetworkId),
            fqdn: row.fqdn,
            beacon_type: beacon_type_from_i16(row.beacon_type)?,
            signature: row.signature,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MimeMismatchRow {
    hash: Vec<u8>,
    src: IpAddr,
    src_nuid: Uuid,
    dst: Option<IpAddr>,
    dst_nuid: Option<Uuid>,
    fqdn: Option<String>,
    beacon_type: i16,
    mime_type: String,
    uri_extension: String,
}

impl TryFrom<MimeMismatchRow> for MimeMismatchHit {
    type Error = Error;

    fn try_from(row: MimeMismatchRow) -> Result<Self> {
        Ok(Self {
            hash: Fingerprint(
                row.hash
                    .try_into()
                    .map_err(|v: Vec<u8>| Error::InvalidConfig(format!("hash column is {} bytes", v.len())))?,
            ),
            src: row.src,
            src_nuid: NetworkId(row.src_nuid),
            dst: row.dst,
            dst_nuid: row.dst_nuid.map(NetworkId),
            fqdn: row.fqdn,
            beacon_type: beacon_type_from_i16(row.beacon_type)?,
            mime_type: row.mime_type,
            uri_extension: row.uri_extension,
        })
    }
}

fn beacon_type_from_i16(v: i16) -> Result<BeaconType> {
    match v {
        0 => Ok(BeaconType::Ip),
        1 => Ok(BeaconType::Sni),
        2 => Ok(BeaconType::Dns),
        other => Err(Error::InvalidConfig(format!("unknown beacon_type discriminant {other}"))),
    }
}

const RARE_SIGNATURE_SQL: &str = r#"
SELECT tm.hash, tm.src, tm.src_nuid, tm.dst, tm.dst_nuid, tm.fqdn, tm.beacon_type, sig.signature
FROM threat_mixtape tm
JOIN rare_signatures sig
  ON sig.src = tm.src AND sig.hash = tm.hash
WHERE tm.modifier_name = '' AND tm.import_id = $1
"#;

const MIME_MISMATCH_SQL: &str = r#"
SELECT tm.hash, tm.src, tm.src_nuid, tm.dst, tm.dst_nuid, tm.fqdn, tm.beacon_type,
       mm.mime_type, mm.uri_extension
FROM threat_mixtape tm
JOIN mime_mismatches mm
  ON mm.src = tm.src AND mm.fqdn = tm.fqdn
WHERE tm.modifier_name = '' AND tm.import_id = $1
"#;

#[async_trait]
impl ModifierSource for PgModifierSource {
    async fn rare_signatures(&self, import_id: Uuid) -> Result<BoxStream<'_, Result<RareSignatureHit>>> {
        let rows = sqlx::query_as::<_, RareSignatureRow>(RARE_SIGNATURE_SQL)
            .bind(import_id)
            .fetch(&self.pool);
        Ok(Box::pin(
            rows.map_err(Error::from)
                .and_then(|row| futures::future::ready(RareSignatureHit::try_from(row))),
        ))
    }

    async fn mime_mismatches(&self, import_id: Uuid) -> Result<BoxStream<'_, Result<MimeMismatchHit>>> {
        let rows = sqlx::query_as::<_, MimeMismatchRow>(MIME_MISMATCH_SQL)
            .bind(import_id)
            .fetch(&self.pool);
        Ok(Box::pin(
            rows.map_err(Error::from)
                .and_then(|row| futures::future::ready(MimeMismatchHit::try_from(row))),
        ))
    }
}
