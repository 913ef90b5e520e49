pub mod frame_options;
pub mod history;

pub use frame_options::{FrameOptions, RevertableOption, UnknownOption};
pub use history::{OptionsHistory, HISTORY_CAPACITY};
