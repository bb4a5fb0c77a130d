pub mod message;
pub mod summary;

pub const DEFAULT_WIDTH: u16 = 80;
pub const COLUMN_GAP: usize = 2;
pub const END_PADDING: usize = 1;
pub const MESSAGE_PADDING: usize = 3;
pub const LOG_PADDING: usize = 1;
