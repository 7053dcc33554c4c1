//! Owned row-major 2D buffer.
//!
//! Rows run along the image height, columns along the width, so element
//! `(row, col)` lives at `row * width + col`. This matches the `[H, W]`
//! layout of detector frames.

use std::ops::{Index, IndexMut};

#[derive(Debug, Clone, PartialEq)]
pub struct Buffer2<T> {
    pixels: Vec<T>,
    width: usize,
    height: usize,
}

impl<T> Buffer2<T> {
    /// Wrap `pixels` as a `height x width` buffer.
    ///
    /// Returns `None` when the length does not equal `width * height`.
    pub fn from_vec(width: usize, height: usize, pixels: Vec<T>) -> Option<Self> {
        if pixels.len() != width * height {
            return None;
        }
        Some(Self {
            pixels,
            width,
            height,
        })
    }

    /// Build a buffer by evaluating `f(row, col)` for every element.
    pub fn from_fn<F>(width: usize, height: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> T,
    {
        let mut pixels = Vec::with_capacity(width * height);
        for row in 0..height {
            for col in 0..width {
                pixels.push(f(row, col));
            }
        }
        Self {
            pixels,
            width,
            height,
        }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row < self.height && col < self.width {
            Some(&self.pixels[row * self.width + col])
        } else {
            None
        }
    }

    #[inline]
    pub fn offset(&self, row: usize, col: usize) -> usize {
        debug_assert!(row < self.height && col < self.width);
        row * self.width + col
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// `(width, height)`.
    #[inline]
    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    #[inline]
    pub fn pixels(&self) -> &[T] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [T] {
        &mut self.pixels
    }

    #[inline]
    pub fn into_pixels(self) -> Vec<T> {
        self.pixels
    }

    /// Apply `f` element-wise into a new buffer of the same shape.
    pub fn map<U, F>(&self, f: F) -> Buffer2<U>
    where
        F: FnMut(&T) -> U,
    {
        Buffer2 {
            pixels: self.pixels.iter().map(f).collect(),
            width: self.width,
            height: self.height,
        }
    }
}

impl<T: Clone> Buffer2<T> {
    pub fn new_filled(width: usize, height: usize, value: T) -> Self {
        Self {
            pixels: vec![value; width * height],
            width,
            height,
        }
    }
}

impl<T> Index<(usize, usize)> for Buffer2<T> {
    type Output = T;

    #[inline]
    fn index(&self, (row, col): (usize, usize)) -> &Self::Output {
        &self.pixels[row * self.width + col]
    }
}

impl<T> IndexMut<(usize, usize)> for Buffer2<T> {
    #[inline]
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut Self::Output {
        &mut self.pixels[row * self.width + col]
    }
}

impl<T> Index<usize> for Buffer2<T> {
    type Output = T;

    #[inline]
    fn index(&self, idx: usize) -> &Self::Output {
        &self.pixels[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_rejects_wrong_length() {
        assert!(Buffer2::from_vec(3, 2, vec![0.0f64; 5]).is_none());
        assert!(Buffer2::from_vec(3, 2, vec![0.0f64; 6]).is_some());
    }

    #[test]
    fn test_row_major_layout() {
        let buf = Buffer2::from_fn(3, 2, |row, col| row * 10 + col);
        assert_eq!(buf.pixels(), &[0, 1, 2, 10, 11, 12]);
        assert_eq!(buf[(1, 2)], 12);
        assert_eq!(buf.offset(1, 0), 3);
        assert_eq!(buf.get(2, 0), None);
    }

    #[test]
    fn test_map_keeps_shape() {
        let buf = Buffer2::new_filled(4, 3, 2u32);
        let doubled = buf.map(|&v| v as f64 * 1.5);
        assert_eq!(doubled.dims(), (4, 3));
        assert!(doubled.pixels().iter().all(|&v| (v - 3.0).abs() < f64::EPSILON));
    }
}
