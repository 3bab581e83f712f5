//! ---
//! credo_section: "07-export-import"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Operator sub-tree export/import and store ingestion."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
use std::fs::File;
use std::io::Read;
use std::path::Path;

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use tracing::debug;

use crate::{ExportError, Result};

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
const BZIP2_MAGIC: [u8; 3] = [0x42, 0x5A, 0x68];

enum ArchiveKind {
    Zip,
    TarGz,
    TarBz2,
}

fn sniff(path: &Path) -> Result<ArchiveKind> {
    let mut header = [0u8; 4];
    let read = File::open(path)?.read(&mut header)?;
    if read >= 4 && header == ZIP_MAGIC {
        return Ok(ArchiveKind::Zip);
    }
    if read >= 2 && header[..2] == GZIP_MAGIC {
        return Ok(ArchiveKind::TarGz);
    }
    if read >= 3 && header[..3] == BZIP2_MAGIC {
        return Ok(ArchiveKind::TarBz2);
    }
    Err(ExportError::UnsupportedArchive)
}

/// Extract a zip, tar.gz, or tar.bz2 archive into `dest`.
///
/// The format is detected from magic bytes, not the file name; anything
/// else is [`ExportError::UnsupportedArchive`].
pub fn extract_archive(path: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;
    match sniff(path)? {
        ArchiveKind::Zip => {
            let mut archive = zip::ZipArchive::new(File::open(path)?)
                .map_err(|err| ExportError::Extraction(err.to_string()))?;
            archive
                .extract(dest)
                .map_err(|err| ExportError::Extraction(err.to_string()))?;
        }
        ArchiveKind::TarGz => {
            let mut archive = tar::Archive::new(GzDecoder::new(File::open(path)?));
            archive
                .unpack(dest)
                .map_err(|err| ExportError::Extraction(err.to_string()))?;
        }
        ArchiveKind::TarBz2 => {
            let mut archive = tar::Archive::new(BzDecoder::new(File::open(path)?));
            archive
                .unpack(dest)
                .map_err(|err| ExportError::Extraction(err.to_string()))?;
        }
    }
    debug!(archive = %path.display(), dest = %dest.display(), "archive extracted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn unsupported_bytes_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.rar");
        std::fs::write(&path, b"Rar!\x1a\x07").unwrap();
        assert!(matches!(
            extract_archive(&path, &dir.path().join("out")),
            Err(ExportError::UnsupportedArchive)
        ));
    }

    #[test]
    fn tar_gz_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("tree");
        std::fs::create_dir_all(source.join("operator")).unwrap();
        std::fs::write(source.join("operator/operator.jwt"), b"claim").unwrap();

        let archive_path = dir.path().join("store.tar.gz");
        let writer = GzEncoder::new(File::create(&archive_path).unwrap(), Compression::default());
        let mut builder = tar::Builder::new(writer);
        builder.append_dir_all(".", &source).unwrap();
        builder.into_inner().unwrap().finish().unwrap().flush().unwrap();

        let dest = dir.path().join("out");
        extract_archive(&archive_path, &dest).unwrap();
        assert_eq!(
            std::fs::read(dest.join("operator/operator.jwt")).unwrap(),
            b"claim"
        );
    }
}
