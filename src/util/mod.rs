//! Scratch maps used while loading and copying graphs

pub mod int_file;
pub mod mapper;
pub mod string_map;

pub use int_file::IntFile;
pub use mapper::{BlankNodeMapper, LongMapper, MemLongMapper};
pub use string_map::StringToLongMap;
