pub mod gemini;
pub mod image;
pub mod moderation;
pub mod request;
pub mod response;

pub use image::*;
pub use moderation::*;
pub use request::*;
pub use response::*;
