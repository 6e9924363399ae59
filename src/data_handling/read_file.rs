// file: src/data_handling/read_file.rs
// description: loading microscopy image series into memory with scale metadata
// reference: chunked page reading with per-series experiment selection

use crate::data_handling::read_metadata::read_metadata;
use crate::data_handling::{SUPPORTED_FORMATS, extension_of};
use crate::error::{DdmError, Result};
use crate::models::{ImageMetadata, ImageStack};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::ops::Range;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tracing::{debug, info, warn};

/// Reads an image series from `path`.
///
/// `nframes` is the number of frames decoded per chunk (`-1` for the whole file).
/// Chunks only set how pages are grouped for decoding and logging: every frame of
/// the selected experiment ends up in the returned stack, since the DDM matrix
/// needs frame pairs from the whole series.
/// `xscale` (µm/pixel) and `tscale` (ms/frame) override the file metadata when given.
pub fn read_file(
    path: &Path,
    nframes: i64,
    xscale: Option<f64>,
    tscale: Option<f64>,
    experiment: Option<usize>,
) -> Result<ImageStack> {
    let extension = extension_of(path);

    if !SUPPORTED_FORMATS.contains(&extension.as_str()) {
        return Err(DdmError::UnsupportedFormat {
            extension,
            supported: SUPPORTED_FORMATS.iter().map(|s| s.to_string()).collect(),
        });
    }

    if !path.exists() {
        return Err(DdmError::FileNotFound(path.to_path_buf()));
    }

    load_data(path, nframes, xscale, tscale, experiment)
}

pub fn load_data(
    path: &Path,
    nframes: i64,
    xscale: Option<f64>,
    tscale: Option<f64>,
    experiment: Option<usize>,
) -> Result<ImageStack> {
    let metadata = read_metadata(path)?;
    let xscale = xscale.unwrap_or(metadata.xscale);
    let tscale = tscale.unwrap_or(metadata.tscale);

    let experiment = select_experiment(&metadata, experiment)?;
    debug!("Using experiment {} of {}", experiment, path.display());

    let chunks = plan_chunks(metadata.frames, nframes)?;
    let frames = read_tif_frames(path, &metadata, &chunks)?;

    info!(
        "Loaded {} frames of {}x{} from {}",
        metadata.frames,
        metadata.height,
        metadata.width,
        path.display()
    );

    Ok(ImageStack::new(metadata.frames, metadata.height, metadata.width, frames)?
        .with_scales(xscale, tscale)
        .with_source(path))
}

/// Picks the experiment to analyse from a multi-series file.
pub fn select_experiment(metadata: &ImageMetadata, experiment: Option<usize>) -> Result<usize> {
    let experiment = match experiment {
        Some(index) => index,
        None if metadata.n_experiments > 1 => {
            let listing: Vec<String> = metadata
                .experiment_names
                .iter()
                .enumerate()
                .map(|(i, name)| format!("{} : {}", i, name))
                .collect();
            warn!(
                "The datafile contains {} experiments ({}), analysing experiment 0",
                metadata.n_experiments,
                listing.join(", ")
            );
            0
        }
        None => 0,
    };

    if experiment >= metadata.n_experiments {
        return Err(DdmError::IndexOutOfBounds {
            index: experiment,
            count: metadata.n_experiments,
        });
    }
    Ok(experiment)
}

/// Splits `total` frames into chunks of `nframes`; the last chunk holds the remainder.
/// The chunks are read back to back into one buffer.
pub fn plan_chunks(total: usize, nframes: i64) -> Result<Vec<Range<usize>>> {
    if nframes != -1 && nframes <= 0 {
        return Err(DdmError::Validation(
            "`nframes` must be greater than zero.".to_string(),
        ));
    }

    let mut size = if nframes == -1 { total } else { nframes as usize };

    if size > total {
        warn!("`nframes` larger than number of frames in file. Will truncate to number of frames in file.");
        size = total;
    } else if size > 0 && total % size != 0 {
        warn!("`nframes` does not nicely divide number of frames in file. Last chunk will contain the remainder.");
    }

    if total == 0 {
        return Ok(Vec::new());
    }

    Ok((0..total)
        .step_by(size)
        .map(|start| start..(start + size).min(total))
        .collect())
}

/// Decodes the pages of every chunk in order into one contiguous buffer.
fn read_tif_frames(path: &Path, metadata: &ImageMetadata, chunks: &[Range<usize>]) -> Result<Vec<f32>> {
    let file = File::open(path).map_err(|source| DdmError::FileOperation {
        path: path.to_path_buf(),
        source,
    })?;
    let mut decoder = Decoder::new(BufReader::new(file))?;
    let frame_len = metadata.height * metadata.width;
    let mut pixels = Vec::with_capacity(metadata.frames * frame_len);

    for (index, chunk) in chunks.iter().enumerate() {
        for page in chunk.clone() {
            if page > 0 {
                decoder.next_image()?;
            }

            let (width, height) = decoder.dimensions()?;
            if (height as usize, width as usize) != (metadata.height, metadata.width) {
                return Err(DdmError::ShapeMismatch(format!(
                    "page {} is {}x{}, expected {}x{}",
                    page, height, width, metadata.height, metadata.width
                )));
            }

            let frame = decoding_result_to_f32(decoder.read_image()?);
            if frame.len() != frame_len {
                return Err(DdmError::Validation(format!(
                    "page {} has {} samples for {} pixels; only single-channel images are supported",
                    page,
                    frame.len(),
                    frame_len
                )));
            }
            pixels.extend(frame);
        }
        debug!("Read chunk {} (frames {:?})", index, chunk);
    }

    Ok(pixels)
}

fn decoding_result_to_f32(result: DecodingResult) -> Vec<f32> {
    match result {
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
    }
}

/// SHA-256 of the file contents, recorded with exported results.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|source| DdmError::FileOperation {
        path: path.to_path_buf(),
        source,
    })?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_handling::save_stack;
    use std::fs;
    use tempfile::TempDir;
    use tiff::encoder::{TiffEncoder, colortype};

    fn metadata_with(n_experiments: usize) -> ImageMetadata {
        ImageMetadata {
            xscale: 1.0,
            tscale: 1.0,
            n_experiments,
            experiment_names: (0..n_experiments).map(|i| format!("series {}", i)).collect(),
            frames: 1,
            height: 1,
            width: 1,
        }
    }

    fn write_stack(dir: &TempDir, name: &str, frames: usize) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let data: Vec<f32> = (0..frames * 12).map(|i| i as f32).collect();
        let stack = ImageStack::new(frames, 3, 4, data).unwrap().with_scales(0.5, 20.0);
        save_stack(&path, &stack).unwrap();
        path
    }

    #[test]
    fn test_unsupported_filetype() {
        let err = read_file(Path::new("test.abc"), 1, None, None, None).unwrap_err();
        assert!(err.to_string().contains("image format"));
    }

    #[test]
    fn test_load_unknown_file() {
        let err = read_file(Path::new("does-not-exist.tif"), 1, None, None, None).unwrap_err();
        assert!(matches!(err, DdmError::FileNotFound(_)));
    }

    #[test]
    fn test_proprietary_file_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("series.lif");
        fs::write(&path, b"not really a lif").unwrap();
        let err = read_file(&path, 1, None, None, None).unwrap_err();
        assert!(matches!(err, DdmError::ProprietaryFormat(_)));
    }

    #[test]
    fn test_import_tif() {
        let temp = TempDir::new().unwrap();
        let path = write_stack(&temp, "stack.tif", 5);

        let stack = read_file(&path, 2, None, None, None).unwrap();
        assert_eq!((stack.frames, stack.height, stack.width), (5, 3, 4));
        assert_eq!(stack.frame(4)[11], 59.0);
        assert!((stack.xscale - 0.5).abs() < 1e-9);
        assert!((stack.tscale - 20.0).abs() < 1e-9);
        assert_eq!(stack.source.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_chunk_size_does_not_change_frames() {
        let temp = TempDir::new().unwrap();
        let path = write_stack(&temp, "stack.tif", 5);

        let whole = read_file(&path, -1, None, None, None).unwrap();
        for nframes in [1, 2, 3, 10] {
            let chunked = read_file(&path, nframes, None, None, None).unwrap();
            assert_eq!(chunked.frames, 5);
            assert_eq!(chunked.data, whole.data);
        }
        assert_eq!(whole.frame(2)[0], 24.0);
    }

    #[test]
    fn test_custom_scales() {
        let temp = TempDir::new().unwrap();
        let path = write_stack(&temp, "stack.tiff", 2);

        let stack = read_file(&path, -1, Some(5.0), Some(5.0), None).unwrap();
        assert_eq!(stack.xscale, 5.0);
        assert_eq!(stack.tscale, 5.0);
    }

    #[test]
    fn test_import_u16_tif() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("gray16.tif");
        {
            let file = fs::File::create(&path).unwrap();
            let mut encoder = TiffEncoder::new(std::io::BufWriter::new(file)).unwrap();
            for value in [100u16, 200u16] {
                encoder
                    .write_image::<colortype::Gray16>(2, 2, &[value; 4])
                    .unwrap();
            }
        }

        let stack = read_file(&path, 1, None, None, None).unwrap();
        assert_eq!(stack.frames, 2);
        assert_eq!(stack.frame(1), &[200.0; 4]);
        assert_eq!(stack.xscale, 1.0);
        assert_eq!(stack.tscale, 1.0);
    }

    #[test]
    fn test_experiment_selection() {
        assert_eq!(select_experiment(&metadata_with(1), None).unwrap(), 0);
        assert_eq!(select_experiment(&metadata_with(3), None).unwrap(), 0);
        assert_eq!(select_experiment(&metadata_with(3), Some(1)).unwrap(), 1);

        let err = select_experiment(&metadata_with(3), Some(4)).unwrap_err();
        assert!(err.to_string().contains("index out of bounds"));
    }

    #[test]
    fn test_tif_experiment_out_of_bounds() {
        let temp = TempDir::new().unwrap();
        let path = write_stack(&temp, "stack.tif", 2);
        assert!(matches!(
            read_file(&path, 1, None, None, Some(1)),
            Err(DdmError::IndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_plan_chunks() {
        assert_eq!(plan_chunks(5, 2).unwrap(), vec![0..2, 2..4, 4..5]);
        assert_eq!(plan_chunks(5, -1).unwrap(), vec![0..5]);
        assert_eq!(plan_chunks(3, 10).unwrap(), vec![0..3]);
        assert!(plan_chunks(3, 0).is_err());
        assert!(plan_chunks(3, -2).is_err());
    }

    #[test]
    fn test_hash_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.bin");
        fs::write(&path, b"stack").unwrap();
        assert_eq!(
            hash_file(&path).unwrap(),
            "6ee08e6eb3bc6f45bc99fcd39fcc479286a1beb0c04d39f204c61762378075d6"
        );
        fs::write(&path, b"other").unwrap();
        assert_ne!(
            hash_file(&path).unwrap(),
            "6ee08e6eb3bc6f45bc99fcd39fcc479286a1beb0c04d39f204c61762378075d6"
        );
    }
}
