pub mod engine;
pub mod extract;
pub mod preprocess;
pub mod setup;

pub use preprocess::crop_rect;
pub use setup::ensure_tesseract;
