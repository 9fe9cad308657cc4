//! # Frame and inference sources
//!
//! The camera and the terrain classifier run outside of the control loop. The loop only sees them
//! through [`FrameSource`] and [`InferenceSource`], which hand out the most recent result along
//! with a flag saying whether it has been seen before.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use image::{DynamicImage, ImageOutputFormat, ImageResult, RgbImage};
use std::sync::{Arc, Mutex};

use comms_if::net::ClassGrid;

// ---------------------------------------------------------------------------
// TYPES
// ---------------------------------------------------------------------------

/// A single colour frame from the camera.
pub type Frame = RgbImage;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Provides camera frames to any number of independent consumers.
pub trait FrameSource {
    /// Get the latest frame for the given stream, with a flag that is true if this stream has not
    /// been given the frame before. `None` if no frame has been captured yet or the stream does
    /// not exist.
    fn capture(&self, stream: usize) -> Option<(bool, Frame)>;

    /// Register a new consumer, returning its stream ID.
    fn new_stream(&self) -> usize;
}

/// Provides the output of the terrain classifier.
pub trait InferenceSource {
    /// Get the latest class grid, with a flag that is true if it has not been read before.
    fn get_inference(&self) -> Option<(bool, ClassGrid)>;

    /// Dimensions of the class grid as (height, width).
    fn output_dims(&self) -> (usize, usize);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Ring buffer of frames with a per-stream record of which frames are new.
#[derive(Debug)]
pub struct FrameBuffer {
    frames: Vec<Option<Frame>>,

    /// `new_flags[stream][slot]`
    new_flags: Vec<Vec<bool>>,

    /// Next slot to be written
    ptr: usize,
}

/// A [`FrameBuffer`] which can be shared between a capture thread and its consumers.
#[derive(Debug, Clone)]
pub struct SharedFrameBuffer {
    inner: Arc<Mutex<FrameBuffer>>,
}

/// Latest result of the classifier.
#[derive(Debug, Clone)]
pub struct InferenceSlot {
    dims: (usize, usize),

    latest: Arc<Mutex<Option<(bool, ClassGrid)>>>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FrameBuffer {
    /// Create a new buffer holding `capacity` frames, with a single stream (ID 0).
    ///
    /// # Panics
    /// - If `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "FrameBuffer capacity must be non-zero");

        Self {
            frames: vec![None; capacity],
            new_flags: vec![vec![false; capacity]],
            ptr: 0,
        }
    }

    pub fn new_stream(&mut self) -> usize {
        self.new_flags.push(vec![false; self.frames.len()]);
        self.new_flags.len() - 1
    }

    /// Insert a frame, overwriting the oldest, and mark it new for every stream.
    pub fn insert(&mut self, frame: Frame) {
        self.frames[self.ptr] = Some(frame);

        for flags in self.new_flags.iter_mut() {
            flags[self.ptr] = true;
        }

        self.ptr = (self.ptr + 1) % self.frames.len();
    }

    /// Latest frame for the stream, clearing its new flag.
    pub fn latest(&mut self, stream: usize) -> Option<(bool, &Frame)> {
        let pos = (self.ptr + self.frames.len() - 1) % self.frames.len();

        let flags = self.new_flags.get_mut(stream)?;
        let frame = self.frames[pos].as_ref()?;

        let is_new = std::mem::replace(&mut flags[pos], false);

        Some((is_new, frame))
    }
}

impl SharedFrameBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FrameBuffer::new(capacity))),
        }
    }

    pub fn insert(&self, frame: Frame) {
        self.inner
            .lock()
            .expect("Frame buffer mutex poisoned")
            .insert(frame);
    }
}

impl FrameSource for SharedFrameBuffer {
    fn capture(&self, stream: usize) -> Option<(bool, Frame)> {
        self.inner
            .lock()
            .expect("Frame buffer mutex poisoned")
            .latest(stream)
            .map(|(is_new, f)| (is_new, f.clone()))
    }

    fn new_stream(&self) -> usize {
        self.inner
            .lock()
            .expect("Frame buffer mutex poisoned")
            .new_stream()
    }
}

impl InferenceSlot {
    /// Create an empty slot for grids of the given (height, width).
    pub fn new(dims: (usize, usize)) -> Self {
        Self {
            dims,
            latest: Arc::new(Mutex::new(None)),
        }
    }

    /// Replace the latest result.
    pub fn publish(&self, grid: ClassGrid) {
        *self.latest.lock().expect("Inference slot mutex poisoned") = Some((true, grid));
    }
}

impl InferenceSource for InferenceSlot {
    fn get_inference(&self) -> Option<(bool, ClassGrid)> {
        let mut latest = self.latest.lock().expect("Inference slot mutex poisoned");

        latest.as_mut().map(|(is_new, grid)| {
            let was_new = std::mem::replace(is_new, false);
            (was_new, grid.clone())
        })
    }

    fn output_dims(&self) -> (usize, usize) {
        self.dims
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Encode a frame as a JPEG of the given quality (1-100).
pub fn encode_jpeg(frame: &Frame, quality: u8) -> ImageResult<Vec<u8>> {
    let mut data = Vec::<u8>::new();

    DynamicImage::ImageRgb8(frame.clone()).write_to(&mut data, ImageOutputFormat::Jpeg(quality))?;

    Ok(data)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use image::{GenericImageView, Rgb};
    use ndarray::Array2;

    fn frame(v: u8) -> Frame {
        RgbImage::from_pixel(4, 4, Rgb([v, v, v]))
    }

    #[test]
    fn test_frame_buffer_streams() {
        let mut buf = FrameBuffer::new(3);
        assert!(buf.latest(0).is_none());

        let other = buf.new_stream();
        assert_eq!(other, 1);
        assert!(buf.latest(7).is_none());

        buf.insert(frame(1));
        let (is_new, f) = buf.latest(0).unwrap();
        assert!(is_new);
        assert_eq!(f.get_pixel(0, 0), &Rgb([1, 1, 1]));

        // Seen by stream 0 but not stream 1
        assert!(!buf.latest(0).unwrap().0);
        assert!(buf.latest(other).unwrap().0);
        assert!(!buf.latest(other).unwrap().0);

        // Wrap around the ring
        for v in 2..=5 {
            buf.insert(frame(v));
        }
        let (is_new, f) = buf.latest(0).unwrap();
        assert!(is_new);
        assert_eq!(f.get_pixel(0, 0), &Rgb([5, 5, 5]));
    }

    #[test]
    fn test_shared_frame_buffer() {
        let cam = SharedFrameBuffer::new(2);
        let stream = cam.new_stream();
        let writer = cam.clone();

        std::thread::spawn(move || writer.insert(frame(9)))
            .join()
            .unwrap();

        let (is_new, f) = cam.capture(stream).unwrap();
        assert!(is_new);
        assert_eq!(f.dimensions(), (4, 4));
        assert!(!cam.capture(stream).unwrap().0);
    }

    #[test]
    fn test_inference_slot() {
        let slot = InferenceSlot::new((2, 3));
        assert_eq!(slot.output_dims(), (2, 3));
        assert!(slot.get_inference().is_none());

        slot.publish(Array2::from_elem((2, 3), 1));
        let (is_new, grid) = slot.get_inference().unwrap();
        assert!(is_new);
        assert_eq!(grid[[1, 2]], 1);

        let (is_new, _) = slot.get_inference().unwrap();
        assert!(!is_new);
    }

    #[test]
    fn test_encode_jpeg() {
        let data = encode_jpeg(&frame(128), 80).unwrap();

        // JPEG start of image marker
        assert_eq!(&data[..2], &[0xff, 0xd8]);

        let decoded = image::load_from_memory(&data).unwrap();
        assert_eq!(decoded.dimensions(), (4, 4));
    }
}
