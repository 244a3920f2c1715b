use serde::{Deserialize, Serialize};

use crate::gaze::Side;

/// Attention class of an image category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttentionClass {
    High,
    Low,
}

/// One stimulus image as listed in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDescriptor {
    pub path: String,
    pub category: String,
    pub attention: AttentionClass,
}

/// The two images of a trial, already assigned to sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StimulusPair {
    pub left: ImageDescriptor,
    pub right: ImageDescriptor,
}

impl StimulusPair {
    pub fn get(&self, side: Side) -> &ImageDescriptor {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    /// Side the high-attention image landed on.
    pub fn high_attention_side(&self) -> Option<Side> {
        if self.left.attention == AttentionClass::High {
            Some(Side::Left)
        } else if self.right.attention == AttentionClass::High {
            Some(Side::Right)
        } else {
            None
        }
    }
}
