//! Thumbnail specs
//!
//! A spec is a named bounding box. Zero on one side means "derive that side
//! from the source aspect ratio"; zero on both sides is rejected when the
//! spec is built, so a registry never holds one.

use stowage_core::config::ThumbnailSpecConfig;
use stowage_core::{StowError, StowResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailSpec {
    name: String,
    width: u32,
    height: u32,
}

impl ThumbnailSpec {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> StowResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(StowError::Config("thumbnail spec needs a name".to_string()));
        }
        if width == 0 && height == 0 {
            return Err(StowError::Config(format!(
                "thumbnail spec {name} must provide a width or a height"
            )));
        }
        Ok(Self {
            name,
            width,
            height,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Thumbnail size for a source image.
    ///
    /// Fits inside the spec's box keeping the aspect ratio, preferring the
    /// width fit on ties. Never larger than the source: if the fit is not
    /// smaller on both axes the source size is returned.
    pub fn target_size(&self, source_width: u32, source_height: u32) -> (u32, u32) {
        if source_width == 0 || source_height == 0 {
            return (source_width, source_height);
        }

        let fit_width = |w: u32| (w, scale(w, source_height, source_width));
        let fit_height = |h: u32| (scale(h, source_width, source_height), h);

        let (width, height) = match (self.width, self.height) {
            (w, 0) => fit_width(w),
            (0, h) => fit_height(h),
            (w, h) => {
                let by_width = fit_width(w);
                if by_width.1 > h {
                    fit_height(h)
                } else {
                    by_width
                }
            }
        };
        let (width, height) = (width.max(1), height.max(1));

        if width >= source_width || height >= source_height {
            return (source_width, source_height);
        }
        (width, height)
    }
}

/// `round(value * numerator / denominator)` in integers
fn scale(value: u32, numerator: u32, denominator: u32) -> u32 {
    let (value, numerator, denominator) = (value as u128, numerator as u128, denominator as u128);
    let scaled = (2 * value * numerator + denominator) / (2 * denominator);
    u32::try_from(scaled).unwrap_or(u32::MAX)
}

/// The static catalog of named specs, read-only after startup
#[derive(Debug, Clone, Default)]
pub struct SpecRegistry {
    specs: Vec<ThumbnailSpec>,
}

impl SpecRegistry {
    pub fn new(specs: Vec<ThumbnailSpec>) -> StowResult<Self> {
        for (i, spec) in specs.iter().enumerate() {
            if specs[..i].iter().any(|s| s.name == spec.name) {
                return Err(StowError::Config(format!(
                    "duplicate thumbnail spec {}",
                    spec.name
                )));
            }
        }
        Ok(Self { specs })
    }

    pub fn from_config(entries: &[ThumbnailSpecConfig]) -> StowResult<Self> {
        let specs = entries
            .iter()
            .map(|e| ThumbnailSpec::new(e.name.clone(), e.width, e.height))
            .collect::<StowResult<Vec<_>>>()?;
        Self::new(specs)
    }

    pub fn get(&self, name: &str) -> Option<&ThumbnailSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ThumbnailSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
