pub mod convert_color;

pub use convert_color::SwapRedBlue;
