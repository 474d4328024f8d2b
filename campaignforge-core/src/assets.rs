//! Asset Library - Existing and Generated Hero Images
//!
//! One hero image per product, stored as `<root>/<product_id>.<ext>`.

use image::RgbaImage;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::brief::Product;
use crate::error::{PipelineError, PipelineResult};
use crate::observer::{PipelineEvent, SharedObserver};
use crate::raster::{self, OutputFormat};

/// Lookup order for existing assets.
pub const ASSET_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];
pub const MIN_ASSET_SIDE: u32 = 100;
pub const MAX_ASSET_SIDE: u32 = 10_000;

pub struct AssetLibrary {
    root: PathBuf,
    observer: SharedObserver,
}

#[derive(Debug, Default)]
pub struct AssetInventory {
    pub existing: BTreeMap<String, PathBuf>,
    pub missing: Vec<Product>,
}

impl AssetLibrary {
    pub fn new(root: impl Into<PathBuf>, observer: SharedObserver) -> Self {
        Self {
            root: root.into(),
            observer,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// First usable asset for the product, or `None`.
    pub fn find_existing(&self, product_id: &str) -> Option<PathBuf> {
        ASSET_EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{product_id}.{ext}")))
            .filter(|path| path.is_file())
            .find(|path| match validate_asset(path) {
                Ok(()) => true,
                Err(reason) => {
                    self.observer.on_event(&PipelineEvent::AssetRejected {
                        path: path.clone(),
                        reason,
                    });
                    false
                }
            })
    }

    pub fn check_existing(&self, products: &[Product]) -> AssetInventory {
        let mut inventory = AssetInventory::default();
        for product in products {
            match self.find_existing(&product.id) {
                Some(path) => {
                    self.observer.on_event(&PipelineEvent::AssetFound {
                        product_id: product.id.clone(),
                        path: path.clone(),
                    });
                    inventory.existing.insert(product.id.clone(), path);
                }
                None => {
                    self.observer.on_event(&PipelineEvent::AssetMissing {
                        product_id: product.id.clone(),
                    });
                    inventory.missing.push(product.clone());
                }
            }
        }
        inventory
    }

    /// Save a generated hero image; an invalid result is removed again.
    pub fn store_generated(&self, product_id: &str, image: &RgbaImage) -> PipelineResult<PathBuf> {
        std::fs::create_dir_all(&self.root).map_err(|e| PipelineError::write(&self.root, e))?;
        let path = self.root.join(format!("{product_id}.png"));
        raster::write_atomic(image, &path, OutputFormat::Png)?;

        if let Err(reason) = validate_asset(&path) {
            let _ = std::fs::remove_file(&path);
            return Err(PipelineError::generation(format!(
                "generated image for {product_id} is unusable: {reason}"
            )));
        }
        Ok(path)
    }
}

/// Decodable, with both sides within the accepted range.
pub fn validate_asset(path: &Path) -> Result<(), String> {
    let (w, h) = image::image_dimensions(path).map_err(|e| format!("cannot read image: {e}"))?;
    let range = MIN_ASSET_SIDE..=MAX_ASSET_SIDE;
    if !range.contains(&w) || !range.contains(&h) {
        return Err(format!("image size {w}x{h} outside {MIN_ASSET_SIDE}..={MAX_ASSET_SIDE}"));
    }
    image::open(path).map_err(|e| format!("cannot decode image: {e}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::null_observer;
    use image::Rgba;

    fn product(id: &str) -> Product {
        Product {
            id: id.into(),
            name: None,
            description: None,
        }
    }

    fn save(path: &Path, w: u32, h: u32) {
        RgbaImage::from_pixel(w, h, Rgba([9, 9, 9, 255])).save(path).unwrap();
    }

    #[test]
    fn png_wins_over_jpg() {
        let dir = tempfile::tempdir().unwrap();
        save(&dir.path().join("mat.jpg"), 200, 200);
        save(&dir.path().join("mat.png"), 200, 200);
        let lib = AssetLibrary::new(dir.path(), null_observer());
        assert_eq!(lib.find_existing("mat"), Some(dir.path().join("mat.png")));
    }

    #[test]
    fn too_small_asset_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        save(&dir.path().join("mat.png"), 50, 400);
        save(&dir.path().join("mat.jpg"), 400, 400);
        let lib = AssetLibrary::new(dir.path(), null_observer());
        assert_eq!(lib.find_existing("mat"), Some(dir.path().join("mat.jpg")));
    }

    #[test]
    fn corrupt_asset_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mat.png"), b"junk").unwrap();
        let lib = AssetLibrary::new(dir.path(), null_observer());
        assert_eq!(lib.find_existing("mat"), None);
    }

    #[test]
    fn inventory_splits_found_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        save(&dir.path().join("mat.png"), 300, 300);
        let lib = AssetLibrary::new(dir.path(), null_observer());
        let inv = lib.check_existing(&[product("mat"), product("bottle")]);
        assert!(inv.existing.contains_key("mat"));
        assert_eq!(inv.missing.len(), 1);
        assert_eq!(inv.missing[0].id, "bottle");
    }

    #[test]
    fn store_generated_validates_size() {
        let dir = tempfile::tempdir().unwrap();
        let lib = AssetLibrary::new(dir.path().join("assets"), null_observer());
        let ok = lib
            .store_generated("mat", &RgbaImage::from_pixel(320, 180, Rgba([1, 1, 1, 255])))
            .unwrap();
        assert!(ok.ends_with("mat.png"));

        let err = lib
            .store_generated("tiny", &RgbaImage::from_pixel(10, 10, Rgba([1, 1, 1, 255])))
            .unwrap_err();
        assert_eq!(err.kind(), "generation");
        assert!(!dir.path().join("assets/tiny.png").exists());
    }
}
