pub mod byte_source;
pub mod hex;
pub mod line_index;
pub mod search;
pub mod selection;
pub mod session;
pub mod window;
