use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of pixel transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrambleMethod {
    Phase,
    Block,
    Pixel,
    Rotation,
    Mosaic,
    Edge,
    Color,
    Wavelet,
}

impl ScrambleMethod {
    pub const ALL: [ScrambleMethod; 8] = [
        ScrambleMethod::Phase,
        ScrambleMethod::Block,
        ScrambleMethod::Pixel,
        ScrambleMethod::Rotation,
        ScrambleMethod::Mosaic,
        ScrambleMethod::Edge,
        ScrambleMethod::Color,
        ScrambleMethod::Wavelet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Phase => "phase",
            Self::Block => "block",
            Self::Pixel => "pixel",
            Self::Rotation => "rotation",
            Self::Mosaic => "mosaic",
            Self::Edge => "edge",
            Self::Color => "color",
            Self::Wavelet => "wavelet",
        }
    }
}

impl fmt::Display for ScrambleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown scramble method `{0}`")]
pub struct UnknownMethod(pub String);

impl FromStr for ScrambleMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScrambleMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}

/// Method plus intensity. `level` is kept inside [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrambleSpec {
    pub method: ScrambleMethod,
    pub level: f64,
}

impl ScrambleSpec {
    pub fn new(method: ScrambleMethod, level: f64) -> Self {
        let level = if level.is_nan() { 0.0 } else { level.clamp(0.0, 1.0) };
        Self { method, level }
    }

    pub fn is_identity(&self) -> bool {
        self.level <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for method in ScrambleMethod::ALL {
            assert_eq!(method.as_str().parse::<ScrambleMethod>(), Ok(method));
        }
        assert!("swirl".parse::<ScrambleMethod>().is_err());
    }

    #[test]
    fn level_is_clamped() {
        assert_eq!(ScrambleSpec::new(ScrambleMethod::Block, 1.7).level, 1.0);
        assert_eq!(ScrambleSpec::new(ScrambleMethod::Block, -0.2).level, 0.0);
        assert!(ScrambleSpec::new(ScrambleMethod::Pixel, f64::NAN).is_identity());
    }
}
