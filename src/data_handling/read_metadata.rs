// file: src/data_handling/read_metadata.rs
// description: extraction of pixel size, frame interval and series layout from image files
// reference: TIFF resolution tags and ImageJ image descriptions

use crate::data_handling::extension_of;
use crate::error::{DdmError, Result};
use crate::models::ImageMetadata;
use lazy_static::lazy_static;
use regex::Regex;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tiff::decoder::Decoder;
use tiff::tags::Tag;
use tracing::debug;

pub const METADATA_FORMATS: [&str; 4] = [".lif", ".nd2", ".tif", ".tiff"];

lazy_static! {
    static ref FINTERVAL: Regex = Regex::new(r"(?m)^finterval=([0-9.eE+-]+)").unwrap();
    static ref UNIT: Regex = Regex::new(r"(?m)^unit=(\S+)").unwrap();
}

/// Reads metadata, dispatching on the file extension.
pub fn read_metadata(path: &Path) -> Result<ImageMetadata> {
    let extension = extension_of(path);

    match extension.as_str() {
        ".tif" | ".tiff" => read_metadata_tif(path),
        ".lif" | ".nd2" => Err(DdmError::ProprietaryFormat(extension)),
        _ => Err(DdmError::NoMetadataReader {
            extension,
            supported: METADATA_FORMATS.iter().map(|s| s.to_string()).collect(),
        }),
    }
}

pub fn read_metadata_tif(path: &Path) -> Result<ImageMetadata> {
    let file = File::open(path).map_err(|source| DdmError::FileOperation {
        path: path.to_path_buf(),
        source,
    })?;
    let mut decoder = Decoder::new(BufReader::new(file))?;

    let (width, height) = decoder.dimensions()?;
    let description = match decoder.find_tag(Tag::ImageDescription)? {
        Some(tiff::decoder::ifd::Value::Ascii(text)) => Some(text),
        _ => None,
    };
    let pixels_per_unit = match decoder.find_tag(Tag::XResolution)? {
        Some(tiff::decoder::ifd::Value::Rational(n, d)) if n > 0 && d > 0 => Some(n as f64 / d as f64),
        _ => None,
    };
    let resolution_unit = match decoder.find_tag(Tag::ResolutionUnit)? {
        Some(value) => value.into_u32().ok(),
        None => None,
    };

    let mut frames = 1;
    while decoder.more_images() {
        decoder.next_image()?;
        frames += 1;
    }

    let xscale = xscale_from_tags(pixels_per_unit, resolution_unit, description.as_deref());
    let tscale = description.as_deref().and_then(frame_interval_ms).unwrap_or(1.0);

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    debug!(
        "TIFF metadata for {}: {} frames of {}x{}, xscale {} um, tscale {} ms",
        path.display(),
        frames,
        width,
        height,
        xscale,
        tscale
    );

    Ok(ImageMetadata {
        xscale,
        tscale,
        n_experiments: 1,
        experiment_names: vec![name],
        frames,
        height: height as usize,
        width: width as usize,
    })
}

/// Microns per pixel. Resolution unit 2 is inch, 3 centimetre; without a unit the
/// ImageJ `unit=` entry decides whether the resolution is per micron.
fn xscale_from_tags(pixels_per_unit: Option<f64>, unit: Option<u32>, description: Option<&str>) -> f64 {
    let Some(ppu) = pixels_per_unit else {
        return 1.0;
    };

    match unit {
        Some(2) => 25_400.0 / ppu,
        Some(3) => 10_000.0 / ppu,
        _ => match description.and_then(|d| UNIT.captures(d)).map(|c| c[1].to_string()) {
            Some(u) if matches!(u.as_str(), "micron" | "um" | "\\u00B5m" | "µm") => 1.0 / ppu,
            _ => 1.0,
        },
    }
}

/// Frame interval from an ImageJ description, converted from seconds to milliseconds.
fn frame_interval_ms(description: &str) -> Option<f64> {
    FINTERVAL
        .captures(description)
        .and_then(|c| c[1].parse::<f64>().ok())
        .filter(|v| *v > 0.0)
        .map(|seconds| seconds * 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_handling::save_stack;
    use crate::models::ImageStack;
    use tempfile::TempDir;

    #[test]
    fn test_unsupported_data_type() {
        let err = read_metadata(Path::new("test.abc")).unwrap_err();
        assert!(err.to_string().contains("metadata reader"));
    }

    #[test]
    fn test_proprietary_formats_are_named() {
        let err = read_metadata(Path::new("sample.nd2")).unwrap_err();
        assert!(matches!(err, DdmError::ProprietaryFormat(ref ext) if ext == ".nd2"));
    }

    #[test]
    fn test_read_metadata_tif_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("stack.tif");
        let stack = ImageStack::new(3, 4, 5, vec![1.0; 60])
            .unwrap()
            .with_scales(0.25, 40.0);
        save_stack(&path, &stack).unwrap();

        let metadata = read_metadata(&path).unwrap();
        assert!((metadata.xscale - 0.25).abs() < 1e-9);
        assert!((metadata.tscale - 40.0).abs() < 1e-9);
        assert_eq!(metadata.n_experiments, 1);
        assert_eq!(metadata.frames, 3);
        assert_eq!((metadata.height, metadata.width), (4, 5));
    }

    #[test]
    fn test_scale_parsing() {
        assert_eq!(xscale_from_tags(None, Some(3), None), 1.0);
        assert!((xscale_from_tags(Some(10_000.0), Some(3), None) - 1.0).abs() < 1e-12);
        assert!((xscale_from_tags(Some(4.0), Some(1), Some("unit=micron\n")) - 0.25).abs() < 1e-12);
        assert_eq!(xscale_from_tags(Some(4.0), Some(1), Some("unit=pixel\n")), 1.0);

        let interval = frame_interval_ms("ImageJ=1.53\nfinterval=0.05\n").unwrap();
        assert!((interval - 50.0).abs() < 1e-9);
        assert_eq!(frame_interval_ms("ImageJ=1.53\n"), None);
    }
}
