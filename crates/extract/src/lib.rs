pub mod extract;
pub mod gemini;
pub mod model;
pub mod pipeline;
pub mod preprocess;
pub mod prompt;
pub mod types;

pub use extract::{FieldParser, ParsedFields};
pub use gemini::{GeminiConfig, GeminiModel};
pub use model::{MockModel, ModelError, ResponseSchema, VisionModel};
pub use pipeline::{ExtractionError, ReceiptPipeline};
pub use preprocess::{normalize_image, NormalizeOptions, NormalizedImage, PreprocessError, JPEG_MIME};
pub use prompt::build_instruction;
pub use types::ExtractedReceipt;
