// file: src/data_handling/tiff_writer.rs
// description: writing image stacks as multi-page 32-bit float TIFF files
// reference: https://docs.rs/tiff

use crate::error::{DdmError, Result};
use crate::models::ImageStack;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tiff::encoder::{Rational, TiffEncoder, colortype};
use tiff::tags::{ResolutionUnit, Tag};
use tracing::info;

/// Saves `stack` with ImageJ-style scale metadata so it can be read back with its scales.
pub fn save_stack(path: &Path, stack: &ImageStack) -> Result<()> {
    if stack.frames == 0 || stack.frame_len() == 0 {
        return Err(DdmError::Validation("cannot save an empty image stack".to_string()));
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| DdmError::FileOperation {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let file = File::create(path).map_err(|source| DdmError::FileOperation {
        path: path.to_path_buf(),
        source,
    })?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?;

    let description = format!(
        "ImageJ=1.53t\nimages={}\nframes={}\nunit=micron\nfinterval={}\n",
        stack.frames,
        stack.frames,
        stack.tscale / 1000.0
    );
    let resolution = Rational {
        n: 1_000_000,
        d: ((stack.xscale * 1_000_000.0).round() as u32).max(1),
    };

    for (index, frame) in stack.frames_iter().enumerate() {
        let mut image =
            encoder.new_image::<colortype::Gray32Float>(stack.width as u32, stack.height as u32)?;
        if index == 0 {
            image
                .encoder()
                .write_tag(Tag::ImageDescription, description.as_str())?;
        }
        image.resolution(ResolutionUnit::None, resolution.clone());
        image.write_data(frame)?;
    }

    info!("Saved {} frames to {}", stack.frames, path.display());
    Ok(())
}
