pub mod style;
pub mod fragment;
pub mod tree;
pub mod markup;

pub use style::*;
pub use fragment::*;
pub use tree::*;
pub use markup::*;
