//! 应用运行时

mod surface;

pub use surface::{PumpReport, Surface};
