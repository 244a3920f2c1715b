use gazex_core::{AttentionClass, ImageDescriptor, ScrambleMethod, ScrambleSpec, StimulusPair, Trial};
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::debug;

use crate::config::ScrambleConfig;
use crate::error::ManifestError;
use crate::manifest::{Category, Manifest};

fn pick_category<'m, R: Rng + ?Sized>(
    manifest: &'m Manifest,
    class: AttentionClass,
    rng: &mut R,
) -> Result<&'m Category, ManifestError> {
    let pool: Vec<&Category> = manifest.of_class(class).collect();
    pool.choose(rng)
        .copied()
        .ok_or(ManifestError::MissingClass(class))
}

fn pick_image<R: Rng + ?Sized>(
    category: &Category,
    rng: &mut R,
) -> Result<ImageDescriptor, ManifestError> {
    let index = if category.images.is_empty() {
        0
    } else {
        rng.random_range(0..category.images.len())
    };
    category
        .descriptor(index)
        .ok_or_else(|| ManifestError::EmptyCategory(category.name.clone()))
}

/// Draws `count` trials, numbered from 1. Categories, images, scramble method and
/// level are drawn uniformly with replacement; sides by a fair coin.
pub fn plan_trials<R: Rng + ?Sized>(
    manifest: &Manifest,
    scramble: &ScrambleConfig,
    count: u32,
    rng: &mut R,
) -> Result<Vec<Trial>, ManifestError> {
    let mut trials = Vec::with_capacity(count as usize);
    for number in 1..=count {
        let high = pick_image(pick_category(manifest, AttentionClass::High, rng)?, rng)?;
        let low = pick_image(pick_category(manifest, AttentionClass::Low, rng)?, rng)?;
        let stimuli = if rng.random_bool(0.5) {
            StimulusPair { left: high, right: low }
        } else {
            StimulusPair { left: low, right: high }
        };
        // empty sets plan untransformed trials
        let method = scramble
            .methods
            .choose(rng)
            .copied()
            .unwrap_or(ScrambleMethod::Mosaic);
        let level = scramble.levels.choose(rng).copied().unwrap_or(0.0);
        let seed = rng.random();
        trials.push(Trial::new(number, stimuli, ScrambleSpec::new(method, level), seed));
    }
    debug!(count, "trials planned");
    Ok(trials)
}

/// Fresh images from the same categories, sides unchanged.
pub fn redraw_pair<R: Rng + ?Sized>(
    manifest: &Manifest,
    pair: &StimulusPair,
    rng: &mut R,
) -> Result<StimulusPair, ManifestError> {
    let redraw = |image: &ImageDescriptor, rng: &mut R| match manifest.category(&image.category) {
        Some(category) => pick_image(category, rng),
        None => Ok(image.clone()),
    };
    Ok(StimulusPair {
        left: redraw(&pair.left, rng)?,
        right: redraw(&pair.right, rng)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn trials_are_numbered_densely_from_one() {
        let mut rng = StdRng::seed_from_u64(1);
        let trials = plan_trials(&Manifest::placeholder(), &ScrambleConfig::default(), 50, &mut rng).unwrap();
        let numbers: Vec<u32> = trials.iter().map(|t| t.number).collect();
        assert_eq!(numbers, (1..=50).collect::<Vec<_>>());
    }

    #[test]
    fn every_pair_mixes_attention_classes() {
        let mut rng = StdRng::seed_from_u64(2);
        let trials = plan_trials(&Manifest::placeholder(), &ScrambleConfig::default(), 200, &mut rng).unwrap();
        let mut high_left = 0;
        for t in &trials {
            assert_ne!(t.stimuli.left.attention, t.stimuli.right.attention);
            if t.stimuli.high_attention_side() == Some(gazex_core::Side::Left) {
                high_left += 1;
            }
        }
        // fair coin over 200 flips
        assert!((60..=140).contains(&high_left), "{high_left}");
    }

    #[test]
    fn scramble_draws_come_from_the_configured_sets() {
        let mut rng = StdRng::seed_from_u64(3);
        let config = ScrambleConfig {
            methods: vec![ScrambleMethod::Edge, ScrambleMethod::Wavelet],
            levels: vec![0.25, 0.75],
        };
        let trials = plan_trials(&Manifest::placeholder(), &config, 100, &mut rng).unwrap();
        for t in &trials {
            assert!(config.methods.contains(&t.scramble.method));
            assert!(config.levels.contains(&t.scramble.level));
        }
        assert!(trials.iter().any(|t| t.scramble.method == ScrambleMethod::Edge));
        assert!(trials.iter().any(|t| t.scramble.method == ScrambleMethod::Wavelet));
    }

    #[test]
    fn same_seed_same_plan() {
        let plan = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            plan_trials(&Manifest::placeholder(), &ScrambleConfig::default(), 20, &mut rng).unwrap()
        };
        assert_eq!(plan(9), plan(9));
    }

    #[test]
    fn redraw_keeps_categories_and_sides() {
        let mut rng = StdRng::seed_from_u64(4);
        let manifest = Manifest::placeholder();
        let trial = plan_trials(&manifest, &ScrambleConfig::default(), 1, &mut rng)
            .unwrap()
            .remove(0);
        let again = redraw_pair(&manifest, &trial.stimuli, &mut rng).unwrap();
        assert_eq!(again.left.category, trial.stimuli.left.category);
        assert_eq!(again.right.category, trial.stimuli.right.category);
        assert_eq!(again.left.attention, trial.stimuli.left.attention);
    }
}
