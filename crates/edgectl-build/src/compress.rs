//! Gzip framing of bundle artefacts.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::BundleError;

/// Incremental writer producing a gzip-compressed artefact on disk.
pub struct BundleWriter {
    path: PathBuf,
    encoder: GzEncoder<File>,
}

impl BundleWriter {
    pub fn create(path: &Path) -> Result<Self, BundleError> {
        let file = File::create(path).map_err(|e| BundleError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            encoder: GzEncoder::new(file, Compression::default()),
        })
    }

    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), BundleError> {
        self.encoder
            .write_all(chunk)
            .map_err(|e| BundleError::io(&self.path, e))
    }

    /// Flush the gzip trailer. Returns the compressed size in bytes.
    pub fn finish(self) -> Result<u64, BundleError> {
        let file = self
            .encoder
            .finish()
            .map_err(|e| BundleError::io(&self.path, e))?;
        let meta = file.metadata().map_err(|e| BundleError::io(&self.path, e))?;
        Ok(meta.len())
    }
}

/// Compress the file at `src` into `dst`.
pub fn compress_file(src: &Path, dst: &Path) -> Result<u64, BundleError> {
    let mut input = File::open(src).map_err(|e| BundleError::io(src, e))?;
    let mut writer = BundleWriter::create(dst)?;
    std::io::copy(&mut input, &mut writer.encoder).map_err(|e| BundleError::io(dst, e))?;
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn decompress(path: &Path) -> Vec<u8> {
        let mut out = Vec::new();
        GzDecoder::new(File::open(path).unwrap())
            .read_to_end(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn chunks_are_concatenated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.gz");
        let mut writer = BundleWriter::create(&path).unwrap();
        writer.write_chunk(b"hello ").unwrap();
        writer.write_chunk(b"world").unwrap();
        let size = writer.finish().unwrap();

        assert!(size > 0);
        assert_eq!(decompress(&path), b"hello world");
    }

    #[test]
    fn compress_file_roundtrips_contents() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("output.eszip");
        let dst = dir.path().join("bundle.gz");
        std::fs::write(&src, vec![7u8; 10_000]).unwrap();

        compress_file(&src, &dst).unwrap();

        assert_eq!(decompress(&dst), vec![7u8; 10_000]);
    }

    #[test]
    fn missing_source_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = compress_file(&dir.path().join("nope"), &dir.path().join("out")).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }
}
