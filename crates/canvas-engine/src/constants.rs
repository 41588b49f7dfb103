//! Shared constants for the canvas engine

/// Default engine settings
pub mod defaults {
    /// Number of node executions allowed in flight at once
    pub const MAX_CONCURRENCY: usize = 3;

    /// Default backend model for image generators
    pub const IMAGE_MODEL: &str = "gemini-2.5-flash-image";

    /// Default backend model for video generators and video extension
    pub const VIDEO_MODEL: &str = "veo-3.1-generate-preview";

    /// Default backend model for prompt enhancement
    pub const ENHANCER_MODEL: &str = "gemini-2.5-flash";

    /// MIME type assumed for image data with no declared type
    pub const IMAGE_MIME_TYPE: &str = "image/png";
}

/// Handle names used on the canvas
pub mod handles {
    pub const PROMPT: &str = "prompt";
    pub const PROMPT_IN: &str = "prompt-in";
    pub const NEGATIVE: &str = "negative";
    pub const REF_IMAGES: &str = "ref-images";
    pub const FIRST_FRAME: &str = "first-frame";
    pub const LAST_FRAME: &str = "last-frame";
    pub const VIDEO_IN: &str = "video-in";

    pub const TEXT_OUT: &str = "text";
    pub const IMAGE_OUT: &str = "image";
    pub const VIDEO_OUT: &str = "video";
    pub const AUDIO_OUT: &str = "audio";
    pub const DOCUMENT_OUT: &str = "document";
}

/// Connection limits for multi-connection handles
pub mod limits {
    /// Reference images accepted by an image generator
    pub const IMAGE_REFERENCE_IMAGES: usize = 14;

    /// Reference images accepted by a video generator in `images` mode
    pub const VIDEO_REFERENCE_IMAGES: usize = 3;
}

/// Failure reasons surfaced on nodes
pub mod reasons {
    pub const UPSTREAM_FAILED: &str = "upstream dependency failed";
    pub const MISSING_PROMPT: &str = "missing required prompt";
    pub const MISSING_INPUTS: &str = "missing required inputs or prompt";
    pub const CANCELLED: &str = "execution cancelled";
    pub const EXECUTOR_PANICKED: &str = "executor panicked";
}
