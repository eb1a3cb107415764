//! Named blend operators.
//!
//! The registry is built once (usually with every built-in mode), then shared
//! read-only behind an `Arc`. Whole-image blends run on the injected pixel
//! processor.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::modes::BUILTIN;
use crate::error::BlendError;
use crate::pixel::PixelProcessor;
use crate::types::{Image, Pixel};

/// A pixel blend operator: `(bottom, top) -> result`.
pub type BlendFn = Arc<dyn Fn(Pixel, Pixel) -> Pixel + Send + Sync>;

/// A registered blend operator.
#[derive(Clone)]
pub struct BlendMode {
    name: String,
    op: BlendFn,
}

impl BlendMode {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Blend a single color.
    pub fn color(&self, bottom: Pixel, top: Pixel) -> Pixel {
        (self.op)(bottom, top)
    }

    /// Blend `top` into `bottom` at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32, bottom: &mut Image, top: &Image) -> Result<(), BlendError> {
        let (width, height) = bottom.dimensions();
        let dst = bottom
            .get_pixel_mut_checked(x, y)
            .ok_or(BlendError::OutOfBounds { x, y, width, height })?;
        let src = crate::types::pixel_or_transparent(top, x, y);
        *dst = self.color(*dst, src);
        Ok(())
    }

    /// Blend `top` over `bottom` into a new image of `bottom`'s size.
    pub fn images(&self, processor: &PixelProcessor, bottom: &Image, top: &Image) -> Image {
        let op = &self.op;
        processor.combine(bottom, top, |b, t| op(b, t))
    }
}

impl fmt::Debug for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlendMode").field("name", &self.name).finish()
    }
}

/// Name-to-operator table plus the processor whole-image blends run on.
pub struct BlendRegistry {
    modes: HashMap<String, BlendMode>,
    processor: Arc<PixelProcessor>,
}

impl BlendRegistry {
    /// An empty registry.
    pub fn new(processor: Arc<PixelProcessor>) -> Self {
        Self {
            modes: HashMap::new(),
            processor,
        }
    }

    /// A registry holding every built-in mode.
    pub fn with_builtin(processor: Arc<PixelProcessor>) -> Self {
        let mut registry = Self::new(processor);
        for (name, op) in BUILTIN {
            registry.modes.insert(
                (*name).to_string(),
                BlendMode {
                    name: (*name).to_string(),
                    op: Arc::new(*op),
                },
            );
        }
        tracing::debug!("Registered {} built-in blend modes", registry.modes.len());
        registry
    }

    /// Register a new operator. Names are unique.
    pub fn register<F>(&mut self, name: impl Into<String>, op: F) -> Result<(), BlendError>
    where
        F: Fn(Pixel, Pixel) -> Pixel + Send + Sync + 'static,
    {
        let name = name.into();
        if self.modes.contains_key(&name) {
            return Err(BlendError::AlreadyRegistered(name));
        }
        self.modes.insert(
            name.clone(),
            BlendMode {
                name,
                op: Arc::new(op),
            },
        );
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&BlendMode, BlendError> {
        self.modes
            .get(name)
            .ok_or_else(|| BlendError::UnknownMode(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modes.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn processor(&self) -> &Arc<PixelProcessor> {
        &self.processor
    }

    pub fn blend_color(&self, name: &str, bottom: Pixel, top: Pixel) -> Result<Pixel, BlendError> {
        Ok(self.lookup(name)?.color(bottom, top))
    }

    /// Blend one pixel of `top` into `bottom` in place.
    pub fn blend_pixel(
        &self,
        name: &str,
        x: u32,
        y: u32,
        bottom: &mut Image,
        top: &Image,
    ) -> Result<(), BlendError> {
        self.lookup(name)?.pixel(x, y, bottom, top)
    }

    /// Blend `top` over `bottom`, returning a new image. Inputs are untouched.
    pub fn blend_images(&self, name: &str, bottom: &Image, top: &Image) -> Result<Image, BlendError> {
        let mode = self.lookup(name)?;
        Ok(mode.images(&self.processor, bottom, top))
    }
}

impl fmt::Debug for BlendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlendRegistry")
            .field("modes", &self.names())
            .field("workers", &self.processor.workers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::solid;
    use image::Rgba;

    fn registry() -> BlendRegistry {
        BlendRegistry::with_builtin(Arc::new(PixelProcessor::new(3).unwrap()))
    }

    #[test]
    fn test_builtin_modes_registered() {
        let registry = registry();
        let names = registry.names();
        assert_eq!(names.len(), 30);
        assert!(names.windows(2).all(|w| w[0] < w[1]));
        assert!(registry.contains("normal"));
        assert!(registry.contains("hard-mix"));
    }

    #[test]
    fn test_unknown_mode_is_an_error() {
        let err = registry().blend_color("no-such-mode", Rgba([0; 4]), Rgba([0; 4]));
        assert_eq!(err, Err(BlendError::UnknownMode("no-such-mode".into())));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = registry();
        let err = registry.register("normal", |b, _| b).unwrap_err();
        assert_eq!(err, BlendError::AlreadyRegistered("normal".into()));

        registry.register("keep-bottom", |b, _| b).unwrap();
        let out = registry
            .blend_color("keep-bottom", Rgba([1, 2, 3, 4]), Rgba([9, 9, 9, 9]))
            .unwrap();
        assert_eq!(out, Rgba([1, 2, 3, 4]));
    }

    #[test]
    fn test_normal_with_opaque_top_is_top() {
        let registry = registry();
        let a = solid(5, 4, Rgba([100, 200, 300, 40000]));
        let b = solid(5, 4, Rgba([65535, 0, 1234, 65535]));
        assert_eq!(registry.blend_images("normal", &a, &b).unwrap(), b);
    }

    #[test]
    fn test_normal_with_transparent_top_is_bottom() {
        let registry = registry();
        let a = solid(5, 4, Rgba([100, 200, 300, 40000]));
        let b = solid(5, 4, Rgba([65535, 0, 1234, 0]));
        assert_eq!(registry.blend_images("normal", &a, &b).unwrap(), a);
    }

    #[test]
    fn test_blend_images_keeps_inputs_and_bottom_size() {
        let registry = registry();
        let a = solid(6, 6, Rgba([10, 20, 30, 65535]));
        let b = solid(3, 3, Rgba([65535, 65535, 65535, 65535]));
        let (a0, b0) = (a.clone(), b.clone());

        let out = registry.blend_images("multiply", &a, &b).unwrap();
        assert_eq!(out.dimensions(), (6, 6));
        assert_eq!(out.get_pixel(1, 1), a.get_pixel(1, 1));
        assert_eq!(out.get_pixel(5, 5), a.get_pixel(5, 5));
        assert_eq!(a, a0);
        assert_eq!(b, b0);
    }

    #[test]
    fn test_blend_pixel_mutates_one_pixel() {
        let registry = registry();
        let mut bottom = solid(3, 3, Rgba([0, 0, 0, 65535]));
        let top = solid(3, 3, Rgba([65535, 65535, 65535, 65535]));
        registry.blend_pixel("normal", 1, 2, &mut bottom, &top).unwrap();
        assert_eq!(bottom.get_pixel(1, 2), &Rgba([65535, 65535, 65535, 65535]));
        assert_eq!(bottom.get_pixel(0, 0), &Rgba([0, 0, 0, 65535]));
    }

    #[test]
    fn test_blend_pixel_out_of_bounds() {
        let registry = registry();
        let mut bottom = solid(3, 3, Rgba([0, 0, 0, 65535]));
        let top = bottom.clone();
        let err = registry
            .blend_pixel("normal", 3, 0, &mut bottom, &top)
            .unwrap_err();
        assert_eq!(
            err,
            BlendError::OutOfBounds {
                x: 3,
                y: 0,
                width: 3,
                height: 3
            }
        );
    }

    #[test]
    fn test_registry_shared_across_threads() {
        let registry = Arc::new(registry());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry
                        .blend_color("average", Rgba([0, 0, 0, 65535]), Rgba([i * 2, 0, 0, 65535]))
                        .unwrap()[0]
                })
            })
            .collect();
        let results: Vec<u16> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results, vec![0, 1, 2, 3]);
    }
}
