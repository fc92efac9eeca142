//! Generative Collaborators
//!
//! Contracts for the external services that feed the pipeline: image, music
//! and speech generation backends, word alignment, and speech synthesis.

mod alignment;
mod engine;
mod providers;

pub use alignment::{
    align_or_distribute, create_word_level_captions, distribute_evenly, AlignmentProvider,
    ChainSynthesizer, EvenAlignment, SpeechSynthesizer,
};
pub use engine::{BackendChain, BackendChainConfig, RetryPolicy};
pub use providers::{
    GenerationBackend, GenerationProgress, GenerationRequest, MockGenerationBackend,
    ProviderCapability,
};
