//! Reference template management
//!
//! Named grayscale patches matched against captured frames. Templates load
//! from PNG files on disk for production use and from in-memory images in
//! tests.

use std::path::Path;

use image::GrayImage;

/// Template loading errors
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("failed to read template directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode template image: {0}")]
    Image(#[from] image::ImageError),
}

/// One named reference patch
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    image: GrayImage,
}

impl Template {
    /// Build a template from an in-memory grayscale image
    pub fn from_image(name: &str, image: GrayImage) -> Self {
        Self {
            name: name.to_string(),
            image,
        }
    }

    /// Load a template from an image file
    pub fn load(name: &str, path: &Path) -> Result<Self, TemplateError> {
        let image = image::open(path)?.to_luma8();
        Ok(Self::from_image(name, image))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Collection of reference templates
#[derive(Debug, Clone, Default)]
pub struct TemplateLibrary {
    templates: Vec<Template>,
}

impl TemplateLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, template: Template) {
        self.templates.push(template);
    }

    /// Load every PNG file in a directory as a template named after its file
    /// stem; returns the number of templates loaded
    pub fn load_from_dir(&mut self, dir: &Path) -> Result<usize, TemplateError> {
        let mut loaded = 0;

        let mut entries: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
            })
            .collect();
        // Stable ordering no matter what the filesystem returns
        entries.sort();

        for path in entries {
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("template")
                .to_string();
            match Template::load(&name, &path) {
                Ok(template) => {
                    self.templates.push(template);
                    loaded += 1;
                }
                Err(e) => {
                    log::warn!("skipping template {}: {}", path.display(), e);
                }
            }
        }

        Ok(loaded)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
