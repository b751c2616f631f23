//! Batch marshalling: the signed `export.bin` + `export.sig` ZIP artifact.

use std::io::{Cursor, Write};

use prost::Message;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::model::{Exposure, SignatureInfo};
use crate::proto;

/// Fixed 16-byte ASCII frame leading every `export.bin`.
pub const EXPORT_BIN_HEADER: &[u8; 16] = b"EK Export v1    ";

/// Name of the payload entry inside the archive.
pub const BIN_ENTRY: &str = "export.bin";

/// Name of the signature entry inside the archive.
pub const SIG_ENTRY: &str = "export.sig";

/// Marshalling failure for a single batch.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The ZIP container could not be assembled.
    #[error("zip assembly failed: {0}")]
    Zip(#[from] zip::result::ZipError),
    /// Writing into the in-memory archive failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One batch of exposures on its way into a signed archive.
#[derive(Debug)]
pub struct ExportBatch<'a> {
    /// Region stamped into the payload.
    pub region: &'a str,
    /// Start of the batch window, seconds since the Unix epoch.
    pub start_timestamp: i64,
    /// End of the batch window, seconds since the Unix epoch.
    pub end_timestamp: i64,
    /// 1-based index of this archive within its batch set.
    pub batch_num: i32,
    /// Total number of archives in the batch set.
    pub batch_size: i32,
    /// Exposures carried by this archive.
    pub exposures: &'a [Exposure],
    /// Signing identities stamped into payload and signature list.
    pub signature_infos: &'a [SignatureInfo],
}

impl ExportBatch<'_> {
    /// Serialises `export.bin`: the 16-byte header followed by the payload
    /// protobuf.
    ///
    /// Keys are emitted sorted byte-wise on the raw key data, so the output
    /// is canonical regardless of input order.
    #[must_use]
    pub fn export_bin(&self) -> Vec<u8> {
        let mut sorted: Vec<&Exposure> = self.exposures.iter().collect();
        sorted.sort_by(|a, b| a.key.cmp(&b.key));

        let payload = proto::TemporaryExposureKeyExport {
            start_timestamp: self.start_timestamp.try_into().ok(),
            end_timestamp: self.end_timestamp.try_into().ok(),
            region: Some(self.region.to_string()),
            batch_num: Some(self.batch_num),
            batch_size: Some(self.batch_size),
            signature_infos: self
                .signature_infos
                .iter()
                .map(signature_info_proto)
                .collect(),
            keys: sorted.into_iter().map(key_proto).collect(),
        };

        let mut bin = Vec::with_capacity(EXPORT_BIN_HEADER.len() + payload.encoded_len());
        bin.extend_from_slice(EXPORT_BIN_HEADER);
        bin.extend_from_slice(&payload.encode_to_vec());
        bin
    }

    /// Serialises `export.sig` for the given signature bytes.
    ///
    /// The payload is signed once per batch; every active identity carries
    /// a copy of the same signature.
    #[must_use]
    pub fn export_sig(&self, signature: &[u8]) -> Vec<u8> {
        let signatures = self
            .signature_infos
            .iter()
            .map(|info| proto::TekSignature {
                signature_info: Some(signature_info_proto(info)),
                batch_num: Some(self.batch_num),
                batch_size: Some(self.batch_size),
                signature: Some(signature.to_vec()),
            })
            .collect();

        proto::TekSignatureList { signatures }.encode_to_vec()
    }

    /// Assembles the two-entry ZIP from the serialised payload and the
    /// signature over it.
    ///
    /// # Errors
    /// Returns an error if the ZIP container cannot be written.
    pub fn archive(&self, export_bin: &[u8], signature: &[u8]) -> Result<Vec<u8>, ArchiveError> {
        let export_sig = self.export_sig(signature);

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        writer.start_file(BIN_ENTRY, options)?;
        writer.write_all(export_bin)?;
        writer.start_file(SIG_ENTRY, options)?;
        writer.write_all(&export_sig)?;

        Ok(writer.finish()?.into_inner())
    }
}

fn signature_info_proto(info: &SignatureInfo) -> proto::SignatureInfo {
    proto::SignatureInfo {
        verification_key_version: info.signing_key_version.clone(),
        verification_key_id: info.signing_key_id.clone(),
        signature_algorithm: Some(proto::SIGNATURE_ALGORITHM_OID.to_string()),
    }
}

fn key_proto(exposure: &Exposure) -> proto::TemporaryExposureKey {
    proto::TemporaryExposureKey {
        key_data: Some(exposure.key.clone()),
        transmission_risk_level: Some(exposure.transmission_risk),
        rolling_start_interval_number: Some(exposure.interval_number),
        rolling_period: Some(exposure.interval_count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DiagnosisType;
    use std::io::Read;

    fn exposure(first_byte: u8) -> Exposure {
        let mut key = vec![0_u8; 16];
        key[0] = first_byte;
        Exposure {
            key,
            transmission_risk: 3,
            interval_number: 2_677_824,
            interval_count: 144,
            region: "AT".to_string(),
            diagnosis_type: DiagnosisType::RedWarning,
        }
    }

    fn batch<'a>(
        exposures: &'a [Exposure],
        signature_infos: &'a [SignatureInfo],
    ) -> ExportBatch<'a> {
        ExportBatch {
            region: "AT",
            start_timestamp: 1_606_694_400,
            end_timestamp: 1_606_780_800,
            batch_num: 1,
            batch_size: 1,
            exposures,
            signature_infos,
        }
    }

    fn signature_info() -> SignatureInfo {
        SignatureInfo {
            signing_key_version: Some("v1".to_string()),
            signing_key_id: Some("284".to_string()),
            end_timestamp: None,
        }
    }

    fn read_entry(archive: &[u8], name: &str) -> Vec<u8> {
        let mut zip = zip::ZipArchive::new(Cursor::new(archive.to_vec())).unwrap();
        let mut entry = zip.by_name(name).unwrap();
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn export_bin_starts_with_the_fixed_header() {
        let exposures = [exposure(0x11)];
        let infos = [signature_info()];
        let bin = batch(&exposures, &infos).export_bin();
        assert_eq!(&bin[..16], b"EK Export v1    ");
        assert_eq!(
            &bin[..16],
            &[
                0x45, 0x4B, 0x20, 0x45, 0x78, 0x70, 0x6F, 0x72, 0x74, 0x20, 0x76, 0x31, 0x20,
                0x20, 0x20, 0x20
            ]
        );
    }

    #[test]
    fn export_bin_carries_window_and_sorted_keys() {
        let exposures = [exposure(0x11), exposure(0x00)];
        let infos = [signature_info()];
        let bin = batch(&exposures, &infos).export_bin();

        let payload = proto::TemporaryExposureKeyExport::decode(&bin[16..]).unwrap();
        assert_eq!(payload.start_timestamp, Some(1_606_694_400));
        assert_eq!(payload.end_timestamp, Some(1_606_780_800));
        assert_eq!(payload.region.as_deref(), Some("AT"));
        assert_eq!(payload.batch_num, Some(1));
        assert_eq!(payload.batch_size, Some(1));

        let keys: Vec<&[u8]> = payload
            .keys
            .iter()
            .map(|k| k.key_data.as_deref().unwrap())
            .collect();
        assert_eq!(keys[0][0], 0x00);
        assert_eq!(keys[1][0], 0x11);
        assert_eq!(payload.keys[0].rolling_period, Some(144));
        assert_eq!(
            payload.keys[0].rolling_start_interval_number,
            Some(2_677_824)
        );

        assert_eq!(
            payload.signature_infos[0].signature_algorithm.as_deref(),
            Some("1.2.840.10045.4.3.2")
        );
        assert_eq!(
            payload.signature_infos[0].verification_key_id.as_deref(),
            Some("284")
        );
    }

    #[test]
    fn identity_strings_surface_verbatim_in_the_payload() {
        let exposures = [exposure(0x11)];
        let infos = [SignatureInfo {
            signing_key_version: Some(String::new()),
            signing_key_id: None,
            end_timestamp: None,
        }];
        let bin = batch(&exposures, &infos).export_bin();
        let payload = proto::TemporaryExposureKeyExport::decode(&bin[16..]).unwrap();
        // an empty string is a value, not an absence
        assert_eq!(
            payload.signature_infos[0].verification_key_version.as_deref(),
            Some("")
        );
        assert_eq!(payload.signature_infos[0].verification_key_id, None);
    }

    #[test]
    fn archive_holds_exactly_the_two_expected_entries() {
        let exposures = [exposure(0x11)];
        let infos = [signature_info()];
        let batch = batch(&exposures, &infos);
        let bin = batch.export_bin();
        let archive = batch.archive(&bin, b"not-a-real-signature").unwrap();

        let zip = zip::ZipArchive::new(Cursor::new(archive.clone())).unwrap();
        let names: Vec<&str> = zip.file_names().collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"export.bin"));
        assert!(names.contains(&"export.sig"));

        assert_eq!(read_entry(&archive, "export.bin"), bin);
    }

    #[test]
    fn signature_list_replicates_one_signature_across_identities() {
        let exposures = [exposure(0x11)];
        let infos = [
            signature_info(),
            SignatureInfo {
                signing_key_version: Some("v2".to_string()),
                signing_key_id: Some("285".to_string()),
                end_timestamp: None,
            },
        ];
        let batch = batch(&exposures, &infos);
        let sig_bytes = batch.export_sig(b"shared-signature");

        let list = proto::TekSignatureList::decode(sig_bytes.as_slice()).unwrap();
        assert_eq!(list.signatures.len(), 2);
        for (signature, info) in list.signatures.iter().zip(&infos) {
            assert_eq!(signature.batch_num, Some(1));
            assert_eq!(signature.batch_size, Some(1));
            assert_eq!(signature.signature.as_deref(), Some(&b"shared-signature"[..]));
            assert_eq!(
                signature
                    .signature_info
                    .as_ref()
                    .unwrap()
                    .verification_key_id,
                info.signing_key_id
            );
        }
    }
}
