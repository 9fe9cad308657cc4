//! # Image saver
//!
//! Saves camera frames as numbered JPEGs, never overwriting an existing file.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use image::ImageResult;
use log::debug;
use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::per::Frame;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ImageSaver {
    dir: PathBuf,

    base_name: String,

    /// Next index to try
    next_index: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ImageSaver {
    /// Create a saver writing `{base_name}{index}.jpg` files into `dir`, which is created if it
    /// does not exist.
    pub fn new<P: AsRef<Path>>(dir: P, base_name: &str) -> io::Result<Self> {
        fs::create_dir_all(&dir)?;

        let next_index = fs::read_dir(&dir)?.count();

        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
            base_name: base_name.into(),
            next_index,
        })
    }

    /// Save a frame, returning the path it was saved to.
    pub fn save(&mut self, frame: &Frame) -> ImageResult<PathBuf> {
        let mut path = self.path_of(self.next_index);
        while path.exists() {
            self.next_index += 1;
            path = self.path_of(self.next_index);
        }

        frame.save(&path)?;
        self.next_index += 1;

        debug!("Saved image to {:?}", path);

        Ok(path)
    }

    fn path_of(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}{}.jpg", self.base_name, index))
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_numbering_skips_existing() {
        let dir = std::env::temp_dir().join(format!("img_saver_test_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);

        let frame = RgbImage::from_pixel(2, 2, Rgb([10, 20, 30]));

        let mut saver = ImageSaver::new(&dir, "image").unwrap();
        assert_eq!(saver.save(&frame).unwrap(), dir.join("image0.jpg"));

        // Something else has taken the next name
        fs::write(dir.join("image1.jpg"), b"").unwrap();
        assert_eq!(saver.save(&frame).unwrap(), dir.join("image2.jpg"));

        // A new saver carries on after the existing files
        let mut saver = ImageSaver::new(&dir, "image").unwrap();
        assert_eq!(saver.save(&frame).unwrap(), dir.join("image3.jpg"));

        fs::remove_dir_all(&dir).unwrap();
    }
}
