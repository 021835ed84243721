use log::{info, warn};
use serde::Serialize;

use super::{PatchError, PatchReader, PatchRecord};
use crate::config::ConfigDir;
use crate::image::RomImage;

/// What a successful patch did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PatchSummary {
    pub literal_records: usize,
    pub rle_records: usize,
    pub bytes_written: usize,
}

fn write_record(image: &mut [u8], record: &PatchRecord<'_>) -> Result<(), PatchError> {
    let offset = record.offset();
    let len = record.len();
    let end = offset
        .checked_add(len)
        .filter(|&end| end <= image.len())
        .ok_or(PatchError::WritePastEnd {
            offset,
            len,
            image_len: image.len(),
        })?;

    match *record {
        PatchRecord::Literal { data, .. } => image[offset..end].copy_from_slice(data),
        PatchRecord::Rle { byte, .. } => image[offset..end].fill(byte),
    }
    Ok(())
}

/// Apply an IPS patch to `image` in place.
///
/// Records are written as they are read. On error everything before the
/// failing record stays applied; nothing is rolled back.
pub fn apply_patch(image: &mut [u8], patch: &[u8]) -> Result<PatchSummary, PatchError> {
    let mut summary = PatchSummary::default();

    let reader = PatchReader::new(patch).map_err(|err| {
        warn!("patch rejected: {}", err);
        err
    })?;

    for record in reader {
        let applied = record.and_then(|record| {
            write_record(image, &record)?;
            Ok(record)
        });
        match applied {
            Ok(record) => {
                match record {
                    PatchRecord::Literal { .. } => summary.literal_records += 1,
                    PatchRecord::Rle { .. } => summary.rle_records += 1,
                }
                summary.bytes_written += record.len();
            }
            Err(err) => {
                warn!(
                    "patch aborted after {} record(s): {}",
                    summary.literal_records + summary.rle_records,
                    err
                );
                return Err(err);
            }
        }
    }

    info!(
        "patch applied: {} literal, {} RLE record(s), {} bytes",
        summary.literal_records, summary.rle_records, summary.bytes_written
    );
    Ok(summary)
}

/// Apply the code-tweak patch `patches/<name>.ips` from `config`.
pub fn apply_code_tweak(
    image: &mut RomImage,
    config: &ConfigDir,
    name: &str,
) -> crate::Result<PatchSummary> {
    let patch = config.patch_bytes(name)?;
    Ok(apply_patch(image.as_mut_bytes(), &patch)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn literal_record_lands_at_its_offset() {
        let mut image = [0u8; 64];
        let patch = b"PATCH\x00\x00\x10\x00\x04\xDE\xAD\xBE\xEFEOF";
        let summary = apply_patch(&mut image, patch).unwrap();

        assert_eq!(&image[16..20], &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert!(image[..16].iter().chain(&image[20..]).all(|&b| b == 0));
        assert_eq!(
            summary,
            PatchSummary {
                literal_records: 1,
                rle_records: 0,
                bytes_written: 4
            }
        );
    }

    #[test]
    fn rle_record_fills_a_run() {
        let mut image = [0u8; 64];
        let patch = b"PATCH\x00\x00\x00\x00\x00\x00\x05\xFFEOF";
        apply_patch(&mut image, patch).unwrap();
        assert_eq!(&image[..5], &[0xFF; 5]);
        assert!(image[5..].iter().all(|&b| b == 0));
    }

    #[test]
    fn reapplying_is_a_no_op() {
        let patch = b"PATCH\x00\x00\x02\x00\x03\x01\x02\x03\x00\x00\x08\x00\x00\x00\x04\x7FEOF";
        let mut image = vec![0x55u8; 32];
        apply_patch(&mut image, patch).unwrap();
        let once = image.clone();
        apply_patch(&mut image, patch).unwrap();
        assert_eq!(image, once);
    }

    #[test]
    fn earlier_records_survive_a_failure() {
        let mut image = [0u8; 8];
        // Second record runs past the end of the image.
        let patch = b"PATCH\x00\x00\x00\x00\x01\xAA\x00\x00\x06\x00\x04\x01\x02\x03\x04EOF";
        let err = apply_patch(&mut image, patch).unwrap_err();
        assert_eq!(
            err,
            PatchError::WritePastEnd {
                offset: 6,
                len: 4,
                image_len: 8
            }
        );
        assert_eq!(image, [0xAA, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn rle_past_end_is_rejected() {
        let mut image = [0u8; 8];
        let patch = b"PATCH\x00\x00\x04\x00\x00\x00\x05\xFFEOF";
        assert!(matches!(
            apply_patch(&mut image, patch),
            Err(PatchError::WritePastEnd { offset: 4, len: 5, .. })
        ));
        assert_eq!(image, [0u8; 8]);
    }

    #[test]
    fn bad_signature_changes_nothing() {
        let mut image = [7u8; 8];
        assert_eq!(
            apply_patch(&mut image, b"IPS!!\x00\x00\x00EOF"),
            Err(PatchError::BadSignature)
        );
        assert_eq!(image, [7u8; 8]);
    }

    #[test]
    fn missing_eof_keeps_applied_records() {
        let mut image = [0u8; 8];
        let patch = b"PATCH\x00\x00\x01\x00\x01\x09";
        assert_eq!(apply_patch(&mut image, patch), Err(PatchError::MissingEof));
        assert_eq!(image[1], 9);
    }
}
