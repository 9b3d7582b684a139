//! On-disk format for [`SimilarityIndex`].
//!
//! Layout (all integers little-endian):
//!
//! | Field | Size |
//! |-------|------|
//! | magic `CFIX` | 4 |
//! | format version | u32 |
//! | dimension | u32 |
//! | row count | u64 |
//! | model name length | u16 |
//! | model name (UTF-8) | variable |
//! | vectors, row-major | `count * dim` × f32 |
//!
//! Files are written to a temporary sibling and renamed into place, so readers
//! never observe a half-written index under the final name. The loader still
//! checks the exact byte length, so a truncated or foreign file fails as
//! [`RetrievalError::IndexCorrupt`] instead of yielding wrong vectors.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use ndarray::Array2;

use super::SimilarityIndex;
use crate::error::{RetrievalError, Result};

const MAGIC: &[u8; 4] = b"CFIX";
pub const FORMAT_VERSION: u32 = 1;
const FIXED_HEADER_LEN: usize = 4 + 4 + 4 + 8 + 2;

impl SimilarityIndex {
    /// Persist the index at `path`, replacing any previous file atomically.
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        self.stage(path)?.commit()?;

        tracing::info!(
            path = %path.display(),
            vectors = self.len(),
            dim = self.dim(),
            "index saved"
        );
        Ok(())
    }

    /// Write the index next to `path` without replacing it yet.
    pub fn stage(&self, path: impl AsRef<Path>) -> anyhow::Result<StagedFile> {
        let model = self.model().as_bytes();
        let model_len = u16::try_from(model.len()).context("model name too long")?;
        let dim = u32::try_from(self.dim()).context("dimension too large")?;

        stage_write(path.as_ref(), |w| {
            w.write_all(MAGIC)?;
            w.write_all(&FORMAT_VERSION.to_le_bytes())?;
            w.write_all(&dim.to_le_bytes())?;
            w.write_all(&(self.len() as u64).to_le_bytes())?;
            w.write_all(&model_len.to_le_bytes())?;
            w.write_all(model)?;
            for value in self.vectors().iter() {
                w.write_all(&value.to_le_bytes())?;
            }
            Ok(())
        })
    }

    /// Load an index written by [`SimilarityIndex::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => RetrievalError::IndexNotFound(path.to_path_buf()),
            _ => RetrievalError::corrupt(path, format!("unreadable: {e}")),
        })?;
        let index = decode(&bytes).map_err(|reason| RetrievalError::corrupt(path, reason))?;

        tracing::info!(
            path = %path.display(),
            vectors = index.len(),
            dim = index.dim(),
            model = %index.model(),
            "index loaded"
        );
        Ok(index)
    }
}

fn decode(bytes: &[u8]) -> std::result::Result<SimilarityIndex, String> {
    if bytes.len() < FIXED_HEADER_LEN {
        return Err(format!("file too short for header ({} bytes)", bytes.len()));
    }
    if &bytes[0..4] != MAGIC {
        return Err("bad magic bytes".into());
    }
    let version = u32::from_le_bytes(le_array(&bytes[4..8]));
    if version != FORMAT_VERSION {
        return Err(format!("unsupported format version {version}"));
    }
    let dim = u32::from_le_bytes(le_array(&bytes[8..12])) as usize;
    let count = u64::from_le_bytes(le_array(&bytes[12..20]));
    let model_len = u16::from_le_bytes(le_array(&bytes[20..22])) as usize;

    let count = usize::try_from(count).map_err(|_| format!("row count {count} too large"))?;
    if dim == 0 && count > 0 {
        return Err("zero dimension with non-zero row count".into());
    }
    let data_start = FIXED_HEADER_LEN + model_len;
    let expected_len = count
        .checked_mul(dim)
        .and_then(|n| n.checked_mul(4))
        .and_then(|n| n.checked_add(data_start))
        .ok_or_else(|| "header sizes overflow".to_string())?;
    if bytes.len() != expected_len {
        return Err(format!(
            "expected {expected_len} bytes for {count} x {dim} vectors, found {}",
            bytes.len()
        ));
    }

    let model = std::str::from_utf8(&bytes[FIXED_HEADER_LEN..data_start])
        .map_err(|_| "model name is not valid UTF-8".to_string())?;
    let values: Vec<f32> = bytes[data_start..]
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(le_array(chunk)))
        .collect();
    if let Some(i) = values.iter().position(|x| !x.is_finite()) {
        return Err(format!("non-finite value in vector {}", i / dim));
    }
    let vectors = Array2::from_shape_vec((count, dim), values).map_err(|e| e.to_string())?;

    Ok(SimilarityIndex::from_matrix(vectors, model))
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

/// A fully written and synced temporary file awaiting rename into place.
///
/// Dropping it without calling [`commit`](Self::commit) removes the temporary
/// file and leaves the destination untouched.
#[derive(Debug)]
pub struct StagedFile {
    tmp: PathBuf,
    dest: PathBuf,
    committed: bool,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.dest
    }

    /// Rename the staged file over its destination.
    pub fn commit(mut self) -> anyhow::Result<()> {
        std::fs::rename(&self.tmp, &self.dest)
            .with_context(|| format!("failed to rename temp file to {}", self.dest.display()))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.tmp);
        }
    }
}

/// Write the contents of `path` to a temporary sibling file and fsync it.
pub(crate) fn stage_write(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
) -> anyhow::Result<StagedFile> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let tmp_path = tmp_sibling(path);
    let file = File::create(&tmp_path)
        .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;
    let staged = StagedFile {
        tmp: tmp_path,
        dest: path.to_path_buf(),
        committed: false,
    };
    let mut writer = BufWriter::new(file);
    write_and_sync(&mut writer, write)
        .with_context(|| format!("failed to write {}", staged.tmp.display()))?;
    Ok(staged)
}

fn write_and_sync(
    writer: &mut BufWriter<File>,
    write: impl FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
) -> std::io::Result<()> {
    write(writer)?;
    writer.flush()?;
    writer.get_ref().sync_all()
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::TempDir;

    fn sample() -> SimilarityIndex {
        SimilarityIndex::from_matrix(
            array![[0.6f32, 0.8, 0.0], [0.0, 0.0, 1.0]],
            "text-embedding-3-small",
        )
    }

    #[test]
    fn round_trip_is_bit_exact() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.cfx");
        let index = sample();
        index.save(&path).unwrap();

        let loaded = SimilarityIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.dim(), 3);
        assert_eq!(loaded.model(), "text-embedding-3-small");
        for (a, b) in index.vectors().iter().zip(loaded.vectors().iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
        assert!(!tmp.path().join("index.cfx.tmp").exists());
    }

    #[test]
    fn empty_index_round_trips() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.cfx");
        SimilarityIndex::new(8, "m").save(&path).unwrap();

        let loaded = SimilarityIndex::load(&path).unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.dim(), 8);
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = SimilarityIndex::load(tmp.path().join("nope.cfx")).unwrap_err();
        assert_eq!(err.kind(), "index_not_found");
    }

    #[test]
    fn truncated_file_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.cfx");
        sample().save(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        for cut in [0, 3, FIXED_HEADER_LEN, bytes.len() - 1] {
            std::fs::write(&path, &bytes[..cut]).unwrap();
            let err = SimilarityIndex::load(&path).unwrap_err();
            assert_eq!(err.kind(), "index_corrupt", "cut at {cut}");
        }
    }

    #[test]
    fn trailing_bytes_are_corrupt() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.cfx");
        sample().save(&path).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        std::fs::write(&path, &bytes).unwrap();
        assert_eq!(SimilarityIndex::load(&path).unwrap_err().kind(), "index_corrupt");
    }

    #[test]
    fn wrong_magic_or_version_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.cfx");
        sample().save(&path).unwrap();
        let original = std::fs::read(&path).unwrap();

        let mut bad_magic = original.clone();
        bad_magic[0] = b'X';
        std::fs::write(&path, &bad_magic).unwrap();
        let err = SimilarityIndex::load(&path).unwrap_err();
        assert!(err.to_string().contains("magic"));

        let mut bad_version = original;
        bad_version[4] = 99;
        std::fs::write(&path, &bad_version).unwrap();
        let err = SimilarityIndex::load(&path).unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn non_finite_values_are_corrupt() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.cfx");
        SimilarityIndex::from_matrix(array![[1.0f32, 0.0], [f32::NAN, 0.0]], "m")
            .save(&path)
            .unwrap();

        let err = SimilarityIndex::load(&path).unwrap_err();
        assert_eq!(err.kind(), "index_corrupt");
        assert!(err.to_string().contains("vector 1"));
    }

    #[test]
    fn staged_index_is_invisible_until_commit() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.cfx");
        SimilarityIndex::new(3, "old").save(&path).unwrap();

        let staged = sample().stage(&path).unwrap();
        assert_eq!(SimilarityIndex::load(&path).unwrap().model(), "old");
        staged.commit().unwrap();
        assert_eq!(SimilarityIndex::load(&path).unwrap().len(), 2);
        assert!(!tmp.path().join("index.cfx.tmp").exists());
    }

    #[test]
    fn dropped_stage_leaves_destination_alone() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.cfx");
        drop(sample().stage(&path).unwrap());
        assert!(!path.exists());
        assert!(!tmp.path().join("index.cfx.tmp").exists());
    }

    #[test]
    fn save_creates_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("dir").join("index.cfx");
        sample().save(&path).unwrap();
        assert!(path.exists());
    }
}
