pub mod cloudinary;
pub mod traits;

use chrono::Utc;
use uuid::Uuid;

pub use cloudinary::CloudinaryStore;
pub use traits::ImageStore;

/// Timestamp-prefixed name with a random suffix, so identical prompts in the
/// same millisecond still get distinct ids.
pub fn unique_image_name() -> String {
    format!(
        "img_{}_{}",
        Utc::now().format("%Y%m%d%H%M%S%3f"),
        &Uuid::new_v4().simple().to_string()[..12]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_unique_names_do_not_collide() {
        let names: HashSet<String> = (0..1000).map(|_| unique_image_name()).collect();
        assert_eq!(names.len(), 1000);
    }

    #[test]
    fn test_name_shape() {
        let name = unique_image_name();
        assert!(name.starts_with("img_"));
        assert_eq!(name.split('_').count(), 3);
    }
}
