//! Raw embedding matrix export in NumPy `.npy` format (v1.0, `<f4`, C order).
//!
//! The exported matrix holds the embeddings exactly as the provider returned
//! them, before normalization, so it can be inspected with numpy or fed back
//! into [`super::builder::index_from_embeddings`] without re-embedding.
//!
//! NumPy rejects unknown header keys, so the model that produced the matrix
//! is recorded in a plain-text sidecar (`embeddings.model` next to
//! `embeddings.npy`).

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use ndarray::Array2;

use super::persist::{stage_write, StagedFile};

const MAGIC: &[u8] = b"\x93NUMPY";
const PREAMBLE_LEN: usize = MAGIC.len() + 2 + 2;
const ALIGN: usize = 64;

/// Write `matrix` to `path` as a 2-D float32 `.npy` file.
pub fn write_npy(path: impl AsRef<Path>, matrix: &Array2<f32>) -> Result<()> {
    let path = path.as_ref();
    stage_npy(path, matrix)?.commit()?;
    tracing::info!(path = %path.display(), rows = matrix.nrows(), "embedding matrix saved");
    Ok(())
}

/// Write `matrix` next to `path` without replacing it yet.
pub fn stage_npy(path: impl AsRef<Path>, matrix: &Array2<f32>) -> Result<StagedFile> {
    let header = header_for(matrix.nrows(), matrix.ncols());
    let header_len = u16::try_from(header.len()).context("npy header too long")?;

    stage_write(path.as_ref(), |w| {
        w.write_all(MAGIC)?;
        w.write_all(&[1, 0])?;
        w.write_all(&header_len.to_le_bytes())?;
        w.write_all(header.as_bytes())?;
        for value in matrix.iter() {
            w.write_all(&value.to_le_bytes())?;
        }
        Ok(())
    })
}

/// Sidecar file holding the model name for the matrix at `npy_path`.
pub fn model_tag_path(npy_path: impl AsRef<Path>) -> PathBuf {
    npy_path.as_ref().with_extension("model")
}

pub fn stage_model_tag(npy_path: impl AsRef<Path>, model: &str) -> Result<StagedFile> {
    stage_write(&model_tag_path(npy_path), |w| writeln!(w, "{model}"))
}

/// Model recorded for the matrix at `npy_path`, if a sidecar exists.
pub fn read_model_tag(npy_path: impl AsRef<Path>) -> Result<Option<String>> {
    let path = model_tag_path(npy_path);
    match std::fs::read_to_string(&path) {
        Ok(text) => {
            let model = text.trim();
            Ok((!model.is_empty()).then(|| model.to_string()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

/// Read a 2-D float32 C-order `.npy` file.
pub fn read_npy(path: impl AsRef<Path>) -> Result<Array2<f32>> {
    let path = path.as_ref();
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;

    ensure!(
        bytes.len() >= PREAMBLE_LEN && bytes.starts_with(MAGIC),
        "{} is not an .npy file",
        path.display()
    );
    ensure!(
        bytes[MAGIC.len()] == 1,
        "unsupported .npy version {}.{}",
        bytes[MAGIC.len()],
        bytes[MAGIC.len() + 1]
    );
    let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
    let data_start = PREAMBLE_LEN + header_len;
    ensure!(bytes.len() >= data_start, "truncated .npy header");

    let header = std::str::from_utf8(&bytes[PREAMBLE_LEN..data_start])
        .context(".npy header is not valid text")?;
    ensure!(
        header.contains("'descr': '<f4'"),
        "expected little-endian float32 data, header: {header}"
    );
    ensure!(
        header.contains("'fortran_order': False"),
        "fortran-ordered arrays are not supported"
    );
    let (rows, cols) = parse_shape(header)?;

    let data = &bytes[data_start..];
    let Some(expected) = rows.checked_mul(cols).and_then(|n| n.checked_mul(4)) else {
        bail!("shape ({rows}, {cols}) is too large");
    };
    ensure!(
        data.len() == expected,
        "expected {expected} data bytes for shape ({rows}, {cols}), found {}",
        data.len()
    );
    let values: Vec<f32> = data
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    if let Some(i) = values.iter().position(|x| !x.is_finite()) {
        bail!("non-finite value at row {}, column {}", i / cols, i % cols);
    }

    Ok(Array2::from_shape_vec((rows, cols), values)?)
}

fn header_for(rows: usize, cols: usize) -> String {
    let mut header =
        format!("{{'descr': '<f4', 'fortran_order': False, 'shape': ({rows}, {cols}), }}");
    // Pad with spaces so the data section starts on a 64-byte boundary; the header ends in '\n'.
    let unpadded = PREAMBLE_LEN + header.len() + 1;
    let padding = (ALIGN - unpadded % ALIGN) % ALIGN;
    header.push_str(&" ".repeat(padding));
    header.push('\n');
    header
}

fn parse_shape(header: &str) -> Result<(usize, usize)> {
    let start = header
        .find("'shape':")
        .context(".npy header has no shape")?;
    let rest = &header[start..];
    let open = rest.find('(').context("malformed shape")?;
    let close = rest.find(')').context("malformed shape")?;
    let dims: Vec<usize> = rest[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>())
        .collect::<std::result::Result<_, _>>()
        .context("shape dimensions must be integers")?;

    match dims.as_slice() {
        [rows, cols] => Ok((*rows, *cols)),
        other => bail!("expected a 2-D array, found shape {other:?}"),
    }
}
