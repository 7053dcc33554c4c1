//! Input frames and the validated frame stack.

use common::Buffer2;

use crate::error::{Error, Result};

/// One calibrated frame: data, per-pixel error and DQ bitmask (0 = good).
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    data: Buffer2<f64>,
    err: Buffer2<f64>,
    dq: Buffer2<u32>,
}

impl Frame {
    /// Build a frame from three planes of identical dimensions.
    pub fn new(data: Buffer2<f64>, err: Buffer2<f64>, dq: Buffer2<u32>) -> Result<Self> {
        let expected = data.dims();
        if err.dims() != expected {
            return Err(Error::PlaneShapeMismatch {
                plane: "err",
                expected,
                actual: err.dims(),
            });
        }
        if dq.dims() != expected {
            return Err(Error::PlaneShapeMismatch {
                plane: "dq",
                expected,
                actual: dq.dims(),
            });
        }
        Ok(Self { data, err, dq })
    }

    /// Build a frame from flat row-major vectors of `width * height` pixels.
    pub fn from_vecs(
        width: usize,
        height: usize,
        data: Vec<f64>,
        err: Vec<f64>,
        dq: Vec<u32>,
    ) -> Result<Self> {
        Self::new(
            plane("data", width, height, data)?,
            plane("err", width, height, err)?,
            plane("dq", width, height, dq)?,
        )
    }

    /// A frame with uniform error and all-good DQ.
    pub fn with_uniform_error(data: Buffer2<f64>, err: f64) -> Self {
        let (width, height) = data.dims();
        Self {
            err: Buffer2::new_filled(width, height, err),
            dq: Buffer2::new_filled(width, height, 0),
            data,
        }
    }

    pub fn data(&self) -> &Buffer2<f64> {
        &self.data
    }

    pub fn err(&self) -> &Buffer2<f64> {
        &self.err
    }

    pub fn dq(&self) -> &Buffer2<u32> {
        &self.dq
    }

    /// `(width, height)`.
    pub fn dims(&self) -> (usize, usize) {
        self.data.dims()
    }

    pub fn into_planes(self) -> (Buffer2<f64>, Buffer2<f64>, Buffer2<u32>) {
        (self.data, self.err, self.dq)
    }
}

fn plane<T>(array: &'static str, width: usize, height: usize, pixels: Vec<T>) -> Result<Buffer2<T>> {
    let actual = pixels.len();
    Buffer2::from_vec(width, height, pixels).ok_or(Error::ArrayLength {
        array,
        expected: width * height,
        actual,
    })
}

/// An ordered, non-empty sequence of frames sharing one shape.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameStack {
    frames: Vec<Frame>,
}

impl FrameStack {
    pub fn new(frames: Vec<Frame>) -> Result<Self> {
        let Some(first) = frames.first() else {
            return Err(Error::EmptyStack);
        };
        let expected = first.dims();
        for (index, frame) in frames.iter().enumerate().skip(1) {
            if frame.dims() != expected {
                return Err(Error::FrameShapeMismatch {
                    index,
                    expected,
                    actual: frame.dims(),
                });
            }
        }
        Ok(Self { frames })
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Number of frames (always at least one).
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// `(width, height)` shared by every frame.
    pub fn dims(&self) -> (usize, usize) {
        self.frames[0].dims()
    }

    pub fn pixel_count(&self) -> usize {
        let (width, height) = self.dims();
        width * height
    }
}
