//! Exposure Notifications v1 wire types.
//!
//! Hand-maintained `prost` structs matching the published `export.proto`
//! consumed by Android and iOS clients. Field numbers and wire types are a
//! frozen public contract and must not change.

use prost::Message;

/// Wire identifier of ECDSA over P-256 with SHA-256.
pub const SIGNATURE_ALGORITHM_OID: &str = "1.2.840.10045.4.3.2";

/// Contents of `export.bin`, after the 16-byte ASCII header.
#[derive(Clone, PartialEq, Message)]
pub struct TemporaryExposureKeyExport {
    /// Start of the batch window, seconds since the Unix epoch.
    #[prost(fixed64, optional, tag = "1")]
    pub start_timestamp: Option<u64>,
    /// End of the batch window, seconds since the Unix epoch.
    #[prost(fixed64, optional, tag = "2")]
    pub end_timestamp: Option<u64>,
    /// Region the keys were published for.
    #[prost(string, optional, tag = "3")]
    pub region: Option<String>,
    /// 1-based index of this archive within its batch set.
    #[prost(int32, optional, tag = "4")]
    pub batch_num: Option<i32>,
    /// Total number of archives in the batch set.
    #[prost(int32, optional, tag = "5")]
    pub batch_size: Option<i32>,
    /// Identities whose signatures accompany the payload.
    #[prost(message, repeated, tag = "6")]
    pub signature_infos: Vec<SignatureInfo>,
    /// The exported keys, sorted byte-wise on `key_data`.
    #[prost(message, repeated, tag = "7")]
    pub keys: Vec<TemporaryExposureKey>,
}

/// Signing identity as surfaced to clients.
///
/// Tags 1 and 2 are the deprecated platform app identifiers and are never
/// emitted.
#[derive(Clone, PartialEq, Message)]
pub struct SignatureInfo {
    /// Version of the verification key the clients should use.
    #[prost(string, optional, tag = "3")]
    pub verification_key_version: Option<String>,
    /// Identifier of the verification key.
    #[prost(string, optional, tag = "4")]
    pub verification_key_id: Option<String>,
    /// Signature algorithm OID; always [`SIGNATURE_ALGORITHM_OID`].
    #[prost(string, optional, tag = "5")]
    pub signature_algorithm: Option<String>,
}

/// One exported temporary exposure key.
#[derive(Clone, PartialEq, Message)]
pub struct TemporaryExposureKey {
    /// Raw 16-byte key.
    #[prost(bytes = "vec", optional, tag = "1")]
    pub key_data: Option<Vec<u8>>,
    /// Relative transmission risk.
    #[prost(int32, optional, tag = "2")]
    pub transmission_risk_level: Option<i32>,
    /// Rolling interval at which the key became active.
    #[prost(int32, optional, tag = "3")]
    pub rolling_start_interval_number: Option<i32>,
    /// Number of intervals the key stays valid.
    #[prost(int32, optional, tag = "4")]
    pub rolling_period: Option<i32>,
}

/// Contents of `export.sig`.
#[derive(Clone, PartialEq, Message)]
pub struct TekSignatureList {
    /// One entry per active signing identity.
    #[prost(message, repeated, tag = "1")]
    pub signatures: Vec<TekSignature>,
}

/// Signature over one archive's full `export.bin` byte stream.
#[derive(Clone, PartialEq, Message)]
pub struct TekSignature {
    /// The identity this signature belongs to.
    #[prost(message, optional, tag = "1")]
    pub signature_info: Option<SignatureInfo>,
    /// 1-based index of the signed archive within its batch set.
    #[prost(int32, optional, tag = "2")]
    pub batch_num: Option<i32>,
    /// Total number of archives in the batch set.
    #[prost(int32, optional, tag = "3")]
    pub batch_size: Option<i32>,
    /// ASN.1 DER ECDSA signature bytes.
    #[prost(bytes = "vec", optional, tag = "4")]
    pub signature: Option<Vec<u8>>,
}
