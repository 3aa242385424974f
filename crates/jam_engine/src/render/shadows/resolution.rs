//! Shadow map resolutions

use serde::{Deserialize, Serialize};

/// Edge length class of a shadow map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShadowResolution {
    /// 512 × 512
    Low,
    /// 1024 × 1024
    Medium,
    /// 2048 × 2048
    High,
}

impl ShadowResolution {
    /// Edge length in texels
    pub const fn texels(self) -> u32 {
        match self {
            Self::Low => 512,
            Self::Medium => 1024,
            Self::High => 2048,
        }
    }
}

impl Default for ShadowResolution {
    fn default() -> Self {
        Self::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texel_sizes_double() {
        assert_eq!(ShadowResolution::Low.texels(), 512);
        assert_eq!(ShadowResolution::Medium.texels(), 2 * ShadowResolution::Low.texels());
        assert_eq!(ShadowResolution::High.texels(), 2048);
    }
}
