//! Data-parallel helpers for per-pixel kernels.

use rayon::prelude::*;

/// Chunk size for parallel operations to avoid false cache sharing.
/// Each chunk spans many cache lines, so writes at chunk boundaries
/// rarely contend.
const CHUNK_SIZE: usize = 4096;

/// Evaluate `f(scratch, index)` for every index in `0..len` in parallel.
///
/// `init` creates one scratch value per rayon work split so that per-pixel
/// kernels can reuse buffers instead of allocating. Results land in index
/// order; each index is evaluated exactly once, so the output does not
/// depend on the number of threads.
pub fn parallel_map_with<T, S, I, F>(len: usize, init: I, f: F) -> Vec<T>
where
    T: Send + Default + Clone,
    I: Fn() -> S + Sync + Send,
    F: Fn(&mut S, usize) -> T + Sync + Send,
{
    if len == 0 {
        return Vec::new();
    }

    let mut result = vec![T::default(); len];

    result
        .par_chunks_mut(CHUNK_SIZE)
        .enumerate()
        .for_each_init(init, |scratch, (chunk_idx, chunk)| {
            let start_idx = chunk_idx * CHUNK_SIZE;
            for (i, val) in chunk.iter_mut().enumerate() {
                *val = f(scratch, start_idx + i);
            }
        });

    debug_assert_eq!(result.len(), len);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallel_map_with_order() {
        let result = parallel_map_with(10, || (), |_, i| i as f64 * 2.0);
        assert_eq!(result.len(), 10);
        for (i, &v) in result.iter().enumerate() {
            assert!((v - i as f64 * 2.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_parallel_map_with_empty() {
        let result: Vec<u32> = parallel_map_with(0, || (), |_, i| i as u32);
        assert!(result.is_empty());
    }

    #[test]
    fn test_parallel_map_with_reuses_scratch() {
        // Scratch is a growing buffer; the value written must still only
        // depend on the index.
        let len = 3 * CHUNK_SIZE + 17;
        let result = parallel_map_with(len, Vec::<usize>::new, |scratch, i| {
            scratch.clear();
            scratch.extend(0..(i % 5));
            scratch.len() as u32
        });
        assert_eq!(result.len(), len);
        for (i, &v) in result.iter().enumerate() {
            assert_eq!(v, (i % 5) as u32);
        }
    }
}
