//! Parallel Segment Encoding
//!
//! Re-encodes segments on a bounded rayon pool. Each task takes its own
//! thread budget from the [`FFmpegThreadManager`] so concurrent encoders share
//! the machine fairly; results come back in input order.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, error, info};

use crate::core::ffmpeg::{path_arg, EncodeSettings, FFmpegThreadManager, MediaTool};
use crate::core::{CoreError, CoreResult};

/// Splits `segments` into exactly `thread_count` contiguous chunks.
///
/// Chunk sizes differ by at most one; the first `len % thread_count` chunks
/// carry the extra item. A `thread_count` of zero is treated as one.
pub fn split_segments_for_parallel_processing<T: Clone>(
    segments: &[T],
    thread_count: usize,
) -> Vec<Vec<T>> {
    if segments.is_empty() {
        return Vec::new();
    }

    let thread_count = thread_count.max(1);
    let chunk_size = segments.len() / thread_count;
    let remainder = segments.len() % thread_count;

    let mut chunks = Vec::with_capacity(thread_count);
    let mut start = 0;
    for i in 0..thread_count {
        let end = start + chunk_size + usize::from(i < remainder);
        chunks.push(segments[start..end].to_vec());
        start = end;
    }
    chunks
}

/// Worker count leaving one core for the rest of the system
pub fn determine_optimal_thread_count() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

/// Output path of an encoded segment: `encoded_<index>_<file name>` in
/// `output_dir`. The index keeps same-named inputs apart.
pub fn encoded_segment_path(segment: &Path, index: usize, output_dir: &Path) -> PathBuf {
    let name = segment
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "segment.mp4".to_string());
    output_dir.join(format!("encoded_{}_{}", index, name))
}

/// Encodes the segment at position `index` with the fast segment preset.
pub fn encode_segment(
    tool: &dyn MediaTool,
    threads: &FFmpegThreadManager,
    segment: &Path,
    index: usize,
    output_dir: &Path,
) -> CoreResult<PathBuf> {
    let output = encoded_segment_path(segment, index, output_dir);
    let guard = threads.enter();
    debug!(
        segment = %segment.display(),
        threads = guard.threads(),
        "Encoding segment"
    );

    let mut args = vec!["-i".to_string(), path_arg(segment)];
    args.extend(EncodeSettings::segment().to_args());
    args.extend(guard.thread_args());
    args.push(path_arg(&output));

    tool.run_ffmpeg(&args)
        .map_err(|e| CoreError::SegmentEncodeFailed {
            path: segment.display().to_string(),
            reason: e.to_string(),
        })?;

    if !output.exists() {
        return Err(CoreError::SegmentEncodeFailed {
            path: segment.display().to_string(),
            reason: "encoder produced no output".to_string(),
        });
    }
    Ok(output)
}

/// Encodes all segments concurrently, preserving input order.
///
/// `thread_count` defaults to [`determine_optimal_thread_count`]. Segments
/// that fail are logged and left out of the result.
pub fn encode_segments_in_parallel(
    tool: &dyn MediaTool,
    threads: &FFmpegThreadManager,
    segments: &[PathBuf],
    output_dir: &Path,
    thread_count: Option<usize>,
) -> Vec<PathBuf> {
    if segments.is_empty() {
        return Vec::new();
    }
    if let Err(e) = std::fs::create_dir_all(output_dir) {
        error!(dir = %output_dir.display(), error = %e, "Error creating output directory");
        return Vec::new();
    }

    let workers = thread_count
        .unwrap_or_else(determine_optimal_thread_count)
        .max(1);
    let pool = match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "Error building encoder pool");
            return Vec::new();
        }
    };

    info!(segments = segments.len(), workers, "Encoding segments in parallel");

    let mut results: Vec<(usize, Option<PathBuf>)> = pool.install(|| {
        segments
            .par_iter()
            .enumerate()
            .map(|(index, segment)| {
                match encode_segment(tool, threads, segment, index, output_dir) {
                    Ok(path) => (index, Some(path)),
                    Err(e) => {
                        error!(index, error = %e, "Error encoding segment");
                        (index, None)
                    }
                }
            })
            .collect()
    });

    results.sort_by_key(|(index, _)| *index);
    let encoded: Vec<PathBuf> = results.into_iter().filter_map(|(_, path)| path).collect();

    info!(
        encoded = encoded.len(),
        failed = segments.len() - encoded.len(),
        "Parallel encoding finished"
    );
    encoded
}
