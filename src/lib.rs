#![forbid(unsafe_code)]

pub mod assets;
pub mod compositor;
pub mod encode;
pub mod error;
pub mod layout;
pub mod metrics;
pub mod model;
pub mod render;
pub mod scaling;
pub mod session;
pub mod transform;

pub use assets::{MAX_IMAGE_DIM, PreparedImage, decode_image, load_image};
pub use compositor::{CompositeReport, Compositor, stacking_order};
pub use encode::encode_frame;
pub use error::{AquamarkError, AquamarkResult};
pub use layout::{Bounds, resolve_position};
pub use metrics::{TextMeasurer, watermark_dimensions};
pub use model::{
    ImageSettings, OutputFormat, OutputSettings, Position, PositionPreset, TextSettings,
    ValidationReport, ValidationStage, Watermark, WatermarkId, WatermarkKind, WatermarkSettings,
};
pub use render::{FrameRGBA, Surface, WatermarkRenderer};
pub use scaling::{ScalingState, constrain_aspect, rescale_font};
pub use session::EditSession;
pub use transform::{PreviewCanvas, Transform};
