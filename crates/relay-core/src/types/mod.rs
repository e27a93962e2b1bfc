//! 릴레이 전반에서 사용되는 공통 타입.

mod bar;
mod interval;
mod symbol;

pub use bar::*;
pub use interval::*;
pub use symbol::*;
