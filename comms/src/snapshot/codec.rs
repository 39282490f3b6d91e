use std::{
    collections::{BTreeSet, HashMap},
    fs,
    path::{Path, PathBuf},
};

use half::{bf16, f16};
use ndarray::{ArrayD, IxDyn};
use safetensors::{Dtype, SafeTensors, tensor::TensorView};

use super::Snapshot;
use crate::{Result, SnapshotErr, Tensor};

/// The `__metadata__` key holding the snapshot's key order as a JSON array.
pub const PARAM_ORDER_KEY: &str = "param_order";

/// Writes `snapshot` to `path` as a safetensors file with `F32` tensors.
///
/// The file is fully serialized in memory, written next to `path` and then
/// renamed over it, so readers never observe a partially written snapshot.
/// Missing parent directories are created.
pub fn save(snapshot: &Snapshot, path: &Path) -> Result<()> {
    let buffers: Vec<(&str, Vec<usize>, Vec<u8>)> = snapshot
        .iter()
        .map(|(name, tensor)| {
            let bytes = tensor.iter().flat_map(|v| v.to_le_bytes()).collect();
            (name, tensor.shape().to_vec(), bytes)
        })
        .collect();

    let views = buffers
        .iter()
        .map(|(name, shape, bytes)| {
            TensorView::new(Dtype::F32, shape.clone(), bytes)
                .map(|view| (*name, view))
                .map_err(|e| SnapshotErr::Shape {
                    name: name.to_string(),
                    msg: e.to_string(),
                })
        })
        .collect::<Result<Vec<_>>>()?;

    let order: Vec<&str> = snapshot.names().collect();
    let order = serde_json::to_string(&order).map_err(|e| format_err(path, e))?;
    let metadata = Some(HashMap::from([(PARAM_ORDER_KEY.to_string(), order)]));

    let bytes = safetensors::serialize(views, &metadata).map_err(|e| format_err(path, e))?;
    write_atomic(path, &bytes)?;

    log::debug!(params = snapshot.len(); "snapshot saved to {}", path.display());
    Ok(())
}

/// Reads a snapshot from a safetensors file.
///
/// Every numeric dtype is cast to `f32`. The key order comes from the
/// `param_order` metadata entry when it names exactly the stored tensors,
/// otherwise names are ordered lexicographically.
pub fn load(path: &Path) -> Result<Snapshot> {
    let buf = read(path)?;
    let tensors = SafeTensors::deserialize(&buf).map_err(|e| format_err(path, e))?;
    let (_, metadata) = SafeTensors::read_metadata(&buf).map_err(|e| format_err(path, e))?;

    let stored: BTreeSet<String> = tensors.names().into_iter().cloned().collect();
    let order = metadata
        .metadata()
        .as_ref()
        .and_then(|meta| meta.get(PARAM_ORDER_KEY))
        .and_then(|raw| serde_json::from_str::<Vec<String>>(raw).ok())
        .filter(|order| {
            let names: BTreeSet<&String> = order.iter().collect();
            order.len() == stored.len() && names == stored.iter().collect::<BTreeSet<_>>()
        });

    let order = match order {
        Some(order) => order,
        None => {
            log::debug!("no usable param order in {}, sorting names", path.display());
            stored.into_iter().collect()
        }
    };

    let mut snapshot = Snapshot::new();
    for name in order {
        let view = tensors.tensor(&name).map_err(|e| format_err(path, e))?;
        let tensor = decode(path, &name, &view)?;
        snapshot.insert(name, tensor)?;
    }

    Ok(snapshot)
}

/// Reads the tensors called `names` from a safetensors file, in that order.
///
/// # Errors
/// `SnapshotErr::MissingTensor` if any of them is absent.
pub fn read_tensors(path: &Path, names: &[&str]) -> Result<Vec<Tensor>> {
    let buf = read(path)?;
    let tensors = SafeTensors::deserialize(&buf).map_err(|e| format_err(path, e))?;

    names
        .iter()
        .map(|&name| {
            let view = tensors
                .tensor(name)
                .map_err(|_| SnapshotErr::MissingTensor {
                    path: path.to_path_buf(),
                    name: name.to_string(),
                })?;
            decode(path, name, &view)
        })
        .collect()
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|source| SnapshotErr::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| SnapshotErr::Io { path, source }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }

    let tmp = tmp_path(path);
    fs::write(&tmp, bytes).map_err(io_err(&tmp))?;
    fs::rename(&tmp, path).map_err(io_err(path))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn format_err<E: ToString>(path: &Path, e: E) -> SnapshotErr {
    SnapshotErr::Format {
        path: path.to_path_buf(),
        msg: e.to_string(),
    }
}

fn decode(path: &Path, name: &str, view: &TensorView<'_>) -> Result<Tensor> {
    let data = view.data();
    let values: Vec<f32> = match view.dtype() {
        Dtype::F32 => le_words(data).map(f32::from_le_bytes).collect(),
        Dtype::F64 => le_words(data).map(|b| f64::from_le_bytes(b) as f32).collect(),
        Dtype::F16 => le_words(data).map(|b| f16::from_le_bytes(b).to_f32()).collect(),
        Dtype::BF16 => le_words(data).map(|b| bf16::from_le_bytes(b).to_f32()).collect(),
        Dtype::I64 => le_words(data).map(|b| i64::from_le_bytes(b) as f32).collect(),
        Dtype::I32 => le_words(data).map(|b| i32::from_le_bytes(b) as f32).collect(),
        Dtype::I16 => le_words(data).map(|b| i16::from_le_bytes(b) as f32).collect(),
        Dtype::I8 => data.iter().map(|&b| b as i8 as f32).collect(),
        Dtype::U8 => data.iter().map(|&b| b as f32).collect(),
        other => {
            return Err(SnapshotErr::UnsupportedDtype {
                path: path.to_path_buf(),
                name: name.to_string(),
                dtype: format!("{other:?}"),
            });
        }
    };

    ArrayD::from_shape_vec(IxDyn(view.shape()), values).map_err(|e| SnapshotErr::Shape {
        name: name.to_string(),
        msg: e.to_string(),
    })
}

/// Splits a little-endian buffer into fixed size words.
fn le_words<const N: usize>(data: &[u8]) -> impl Iterator<Item = [u8; N]> + '_ {
    data.chunks_exact(N).map(|chunk| {
        let mut word = [0; N];
        word.copy_from_slice(chunk);
        word
    })
}

#[cfg(test)]
mod tests {
    use ndarray::{arr1, arr2};
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn save_then_load_keeps_order_and_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("job-1_model.safetensors");

        let snapshot = Snapshot::from_entries([
            ("fc1.weight", arr2(&[[1.0, -2.0], [3.5, 0.25]]).into_dyn()),
            ("fc1.bias", arr1(&[0.5, -0.5]).into_dyn()),
            ("a.scale", ArrayD::from_elem(IxDyn(&[]), 7.0)),
        ])
        .unwrap();

        save(&snapshot, &path).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded, snapshot);
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn load_casts_other_dtypes_and_sorts_without_metadata() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mixed.safetensors");

        let doubles: Vec<u8> = [1.5_f64, -2.0].iter().flat_map(|v| v.to_le_bytes()).collect();
        let ints: Vec<u8> = [3_i64, 4, 5].iter().flat_map(|v| v.to_le_bytes()).collect();
        let views = vec![
            ("z", TensorView::new(Dtype::F64, vec![2], &doubles).unwrap()),
            ("b", TensorView::new(Dtype::I64, vec![3, 1], &ints).unwrap()),
        ];
        fs::write(&path, safetensors::serialize(views, &None).unwrap()).unwrap();

        let loaded = load(&path).unwrap();
        let names: Vec<_> = loaded.names().collect();

        assert_eq!(names, ["b", "z"]);
        assert_eq!(loaded.get("z").unwrap(), &arr1(&[1.5, -2.0]).into_dyn());
        assert_eq!(loaded.get("b").unwrap(), &arr2(&[[3.0], [4.0], [5.0]]).into_dyn());
    }

    #[test]
    fn load_rejects_unsupported_dtype() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flags.safetensors");

        let flags = [1_u8, 0];
        let views = vec![("mask", TensorView::new(Dtype::BOOL, vec![2], &flags).unwrap())];
        fs::write(&path, safetensors::serialize(views, &None).unwrap()).unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(err, SnapshotErr::UnsupportedDtype { name, .. } if name == "mask"));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = load(&dir.path().join("absent.safetensors")).unwrap_err();
        assert!(matches!(err, SnapshotErr::Io { .. }));
    }

    #[test]
    fn read_tensors_reports_missing_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.safetensors");
        let snapshot = Snapshot::from_entries([("x", arr2(&[[1.0], [2.0]]).into_dyn())]).unwrap();
        save(&snapshot, &path).unwrap();

        let err = read_tensors(&path, &["x", "y"]).unwrap_err();
        assert!(matches!(err, SnapshotErr::MissingTensor { name, .. } if name == "y"));
    }
}
