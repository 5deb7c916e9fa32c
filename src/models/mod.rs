pub mod enums;
pub mod patient;
pub mod practice;
pub mod session;

pub use enums::*;
pub use patient::*;
pub use practice::*;
pub use session::*;
