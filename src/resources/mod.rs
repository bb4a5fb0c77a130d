pub mod terminal;
pub mod vm;
