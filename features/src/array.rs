//! Dense f32 feature arrays and their NPY file encoding.
//!
//! Files follow NPY format 1.0: the `\x93NUMPY` magic, a little-endian
//! header length, a Python-literal header dict padded to a 64-byte boundary,
//! then C-ordered little-endian data. Version 2.0/3.0 headers and `<f8`
//! data are accepted on read.

use std::io::Write;
use std::path::Path;

use crate::error::FeatureError;

const MAGIC: &[u8] = b"\x93NUMPY";
const HEADER_ALIGN: usize = 64;

/// A row-major f32 array, typically `[frames, window, dims]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureArray {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl FeatureArray {
    /// Creates an array, checking that `data` matches `shape`.
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self, FeatureError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(FeatureError::Format(format!(
                "shape {shape:?} needs {expected} values, got {}",
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// Creates a zero-filled array.
    pub fn zeros(shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![0.0; len],
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Returns the leading dimension (0 for a scalar array).
    pub fn frames(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Returns the flattened values of frame `index`.
    pub fn frame(&self, index: usize) -> Option<&[f32]> {
        let frames = self.frames();
        if index >= frames {
            return None;
        }
        let stride = self.data.len() / frames;
        Some(&self.data[index * stride..(index + 1) * stride])
    }

    /// Returns a copy with the last two axes swapped (`[N, A, B]` -> `[N, B, A]`).
    pub fn swap_last_axes(&self) -> Result<Self, FeatureError> {
        if self.ndim() < 2 {
            return Err(FeatureError::Format(format!(
                "cannot swap axes of a {}-d array",
                self.ndim()
            )));
        }
        let n = self.ndim();
        let (a, b) = (self.shape[n - 2], self.shape[n - 1]);
        let outer = self.data.len() / (a * b).max(1);

        let mut data = vec![0.0f32; self.data.len()];
        for o in 0..outer {
            let base = o * a * b;
            for i in 0..a {
                for j in 0..b {
                    data[base + j * a + i] = self.data[base + i * b + j];
                }
            }
        }

        let mut shape = self.shape.clone();
        shape.swap(n - 2, n - 1);
        Ok(Self { shape, data })
    }

    /// Returns the same data viewed with a different shape.
    pub fn reshape(self, shape: Vec<usize>) -> Result<Self, FeatureError> {
        Self::new(shape, self.data)
    }

    /// Encodes the array as NPY 1.0 bytes.
    pub fn to_npy_bytes(&self) -> Vec<u8> {
        let shape = match self.shape.as_slice() {
            [] => "()".to_string(),
            [n] => format!("({n},)"),
            dims => format!(
                "({})",
                dims.iter()
                    .map(|d| d.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };
        let mut header =
            format!("{{'descr': '<f4', 'fortran_order': False, 'shape': {shape}, }}");
        // magic(6) + version(2) + header_len(2) + header + '\n'
        let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
        let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
        header.push_str(&" ".repeat(padding));
        header.push('\n');

        let mut out = Vec::with_capacity(MAGIC.len() + 4 + header.len() + self.data.len() * 4);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&[1, 0]);
        out.extend_from_slice(&(header.len() as u16).to_le_bytes());
        out.extend_from_slice(header.as_bytes());
        for v in &self.data {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    /// Decodes NPY bytes holding a C-ordered `<f4` or `<f8` array.
    pub fn from_npy_bytes(bytes: &[u8]) -> Result<Self, FeatureError> {
        if bytes.len() < MAGIC.len() + 4 || &bytes[..MAGIC.len()] != MAGIC {
            return Err(FeatureError::Format("missing NPY magic".into()));
        }
        let major = bytes[MAGIC.len()];
        let (header_len, header_start) = match major {
            1 => {
                let at = MAGIC.len() + 2;
                (u16::from_le_bytes([bytes[at], bytes[at + 1]]) as usize, at + 2)
            }
            2 | 3 => {
                let at = MAGIC.len() + 2;
                if bytes.len() < at + 4 {
                    return Err(FeatureError::Format("truncated NPY header".into()));
                }
                let len = u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
                (len as usize, at + 4)
            }
            v => return Err(FeatureError::Format(format!("unsupported NPY version {v}"))),
        };

        let data_start = header_start + header_len;
        if bytes.len() < data_start {
            return Err(FeatureError::Format("truncated NPY header".into()));
        }
        let header = std::str::from_utf8(&bytes[header_start..data_start])
            .map_err(|_| FeatureError::Format("NPY header is not text".into()))?;
        let header = Header::parse(header)?;

        if header.fortran_order {
            return Err(FeatureError::Format("fortran-ordered arrays are not supported".into()));
        }

        let body = &bytes[data_start..];
        let data: Vec<f32> = match header.descr.as_str() {
            "<f4" => {
                let expected = header.data_len(4)?;
                if body.len() != expected {
                    return Err(FeatureError::Format(format!(
                        "expected {expected} data bytes, got {}",
                        body.len()
                    )));
                }
                body.chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect()
            }
            "<f8" => {
                let expected = header.data_len(8)?;
                if body.len() != expected {
                    return Err(FeatureError::Format(format!(
                        "expected {expected} data bytes, got {}",
                        body.len()
                    )));
                }
                body.chunks_exact(8)
                    .map(|c| {
                        let mut b = [0u8; 8];
                        b.copy_from_slice(c);
                        f64::from_le_bytes(b) as f32
                    })
                    .collect()
            }
            other => {
                return Err(FeatureError::Format(format!("unsupported dtype {other:?}")));
            }
        };

        Self::new(header.shape, data)
    }

    /// Reads an NPY file.
    pub fn read_npy(path: impl AsRef<Path>) -> Result<Self, FeatureError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FeatureError::InputNotFound(path.to_path_buf())
            } else {
                FeatureError::io(path, e)
            }
        })?;
        Self::from_npy_bytes(&bytes)
    }

    /// Writes an NPY file atomically.
    ///
    /// The bytes go to a temporary file in the destination directory which is
    /// then renamed over `path`, so readers never observe a partial array.
    pub fn write_npy(&self, path: impl AsRef<Path>) -> Result<(), FeatureError> {
        let path = path.as_ref();
        let tmp = self.write_temp(path.parent())?;
        tmp.persist(path).map_err(|e| FeatureError::io(path, e.error))?;
        Ok(())
    }

    /// Writes the encoded array into a temporary file inside `dir`.
    pub(crate) fn write_temp(
        &self,
        dir: Option<&Path>,
    ) -> Result<tempfile::NamedTempFile, FeatureError> {
        let dir = match dir {
            Some(d) if !d.as_os_str().is_empty() => d,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| FeatureError::io(dir, e))?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".features-")
            .suffix(".npy.tmp")
            .tempfile_in(dir)
            .map_err(|e| FeatureError::io(dir, e))?;
        tmp.write_all(&self.to_npy_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| FeatureError::io(tmp.path(), e))?;
        Ok(tmp)
    }
}

/// Parsed NPY header dict.
struct Header {
    descr: String,
    fortran_order: bool,
    shape: Vec<usize>,
}

impl Header {
    fn parse(text: &str) -> Result<Self, FeatureError> {
        let bad = |what: &str| FeatureError::Format(format!("NPY header: {what} in {text:?}"));

        let descr = value_after(text, "'descr'")
            .and_then(|v| {
                let v = v.strip_prefix('\'')?;
                v.split('\'').next()
            })
            .ok_or_else(|| bad("missing descr"))?
            .to_string();

        let fortran_order = match value_after(text, "'fortran_order'") {
            Some(v) if v.starts_with("True") => true,
            Some(v) if v.starts_with("False") => false,
            _ => return Err(bad("missing fortran_order")),
        };

        let shape_text = value_after(text, "'shape'")
            .and_then(|v| v.strip_prefix('('))
            .and_then(|v| v.split(')').next())
            .ok_or_else(|| bad("missing shape"))?;
        let shape = shape_text
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<usize>().map_err(|_| bad("bad shape")))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            descr,
            fortran_order,
            shape,
        })
    }

    /// Byte length of the data section for `item_size`-byte elements.
    fn data_len(&self, item_size: usize) -> Result<usize, FeatureError> {
        self.shape
            .iter()
            .try_fold(item_size, |acc, &dim| acc.checked_mul(dim))
            .ok_or_else(|| FeatureError::Format(format!("NPY shape {:?} is too large", self.shape)))
    }
}

/// Returns the text after `key:` with leading whitespace removed.
fn value_after<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    let at = text.find(key)? + key.len();
    let rest = text[at..].trim_start().strip_prefix(':')?;
    Some(rest.trim_start())
}
