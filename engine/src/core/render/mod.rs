//! Render Pipeline Module
//!
//! Turns story lines into segment files and segment files into the finished
//! video.
//!
//! # Modules
//!
//! - `segment`: Still image + narration segments and their captions
//! - `parallel`: Bounded parallel re-encoding of segments
//! - `concat`: Concat demuxer joins
//! - `final_video`: Background music, closing credits and the final rename

mod concat;
mod final_video;
mod parallel;
mod segment;

pub use concat::{concat_manifest, concatenate_encoded_segments, concatenate_segments, ConcatMode};
pub use final_video::{
    add_background_music, append_video_segments, assemble_final_video, generate_closing_credits,
    music_mix_filter, normalized_settings, ClosingCredits, FinalVideoOptions,
    CLOSING_CREDITS_FILE, DEFAULT_MUSIC_VOLUME, FINAL_VIDEO_FILE, INITIAL_CREDITS_FILE,
    MAIN_VIDEO_FILE, MUSIC_VIDEO_FILE,
};
pub use parallel::{
    determine_optimal_thread_count, encode_segment, encode_segments_in_parallel,
    encoded_segment_path, split_segments_for_parallel_processing,
};
pub use segment::{
    build_story_segment, caption_segment, captioned_segment_path, create_video_segment,
    default_segment_path, StoryLine,
};
