//! Label noise: binary, class-preserving and paired shuffling

use super::storage::check_positions;
use super::{check_finite, class_positions, LabelShuffle, Operation, PairMap, PairedShuffle, PerturbationEngine};
use crate::dataset::check_binary_labels;
use crate::error::{NirejectError, Result};
use ndarray::Array1;
use rand::seq::index::sample;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

impl PerturbationEngine {
    /// Flip `floor(noise_ratio * n)` labels drawn without replacement.
    ///
    /// With `shuffled_idx` the given positions are flipped instead and no
    /// randomness is used. A ratio of zero without positions is a no-op.
    pub fn binary_label_shuffling(
        &self,
        labels: &Array1<i64>,
        shuffled_idx: Option<&[usize]>,
        noise_ratio: f64,
    ) -> Result<LabelShuffle> {
        check_finite("noise_ratio", noise_ratio)?;
        if noise_ratio <= 0.0 && shuffled_idx.is_none() {
            return Ok(unchanged(labels));
        }
        check_binary_labels(labels.iter(), true)?;

        let positions = match shuffled_idx {
            Some(given) => {
                check_positions(given, labels.len())?;
                given.to_vec()
            }
            None => {
                check_ratio(noise_ratio)?;
                let amount = (noise_ratio * labels.len() as f64) as usize;
                sample(&mut self.rng(Operation::BinaryShuffle), labels.len(), amount).into_vec()
            }
        };

        debug!(
            n_labels = labels.len(),
            n_flipped = positions.len(),
            "binary label shuffling"
        );
        Ok(LabelShuffle {
            labels: flipped(labels, &positions),
            shuffled_idx: Some(positions),
        })
    }

    /// Flip `k = floor(noise_ratio * n_anomalous)` anomalous labels and `k`
    /// normal labels, so both class counts stay the same.
    pub fn preserving_label_shuffling(
        &self,
        labels: &Array1<i64>,
        shuffled_idx: Option<&[usize]>,
        noise_ratio: f64,
    ) -> Result<LabelShuffle> {
        check_finite("noise_ratio", noise_ratio)?;
        if noise_ratio <= 0.0 && shuffled_idx.is_none() {
            return Ok(unchanged(labels));
        }
        check_binary_labels(labels.iter(), true)?;

        let positions = match shuffled_idx {
            Some(given) => {
                check_positions(given, labels.len())?;
                given.to_vec()
            }
            None => {
                check_ratio(noise_ratio)?;
                let anomalous = class_positions(labels, 1);
                let normal = class_positions(labels, 0);
                let amount = (noise_ratio * anomalous.len() as f64) as usize;
                if amount > normal.len() {
                    return Err(NirejectError::invalid_parameter(
                        "noise_ratio",
                        noise_ratio,
                        format!(
                            "flipping {} anomalous labels needs as many normal labels, found {}",
                            amount,
                            normal.len()
                        ),
                    ));
                }

                let mut rng = self.rng(Operation::PreservingShuffle);
                let mut positions = draw(&mut rng, &anomalous, amount, false);
                positions.extend(draw(&mut rng, &normal, amount, false));
                positions
            }
        };

        debug!(
            n_labels = labels.len(),
            n_flipped = positions.len(),
            "class-preserving label shuffling"
        );
        Ok(LabelShuffle {
            labels: flipped(labels, &positions),
            shuffled_idx: Some(positions),
        })
    }

    /// Swap labels along a pair map between the two classes.
    ///
    /// A fresh map takes `floor(noise_ratio * n_c)` keys from each class `c`
    /// and pairs each key with an untouched row of the opposite class. The
    /// swaps run in key order on one working copy, which keeps both class
    /// counts exactly even when a partner is drawn twice. A ratio of zero is
    /// a no-op whether or not a map is supplied.
    pub fn paired_class_shuffling(
        &self,
        labels: &Array1<i64>,
        pairs: Option<&PairMap>,
        noise_ratio: f64,
    ) -> Result<PairedShuffle> {
        check_finite("noise_ratio", noise_ratio)?;
        if noise_ratio <= 0.0 {
            return Ok(PairedShuffle {
                labels: labels.clone(),
                pairs: pairs.cloned(),
            });
        }
        check_binary_labels(labels.iter(), true)?;

        let pairs = match pairs {
            Some(given) => {
                let flat: Vec<usize> = given.iter().flat_map(|(&k, &v)| [k, v]).collect();
                check_positions(&flat, labels.len())?;
                given.clone()
            }
            None => {
                check_ratio(noise_ratio)?;
                self.draw_pairs(labels, noise_ratio)?
            }
        };

        let mut shuffled = labels.clone();
        for (&key, &partner) in &pairs {
            shuffled.swap(key, partner);
        }

        debug!(n_labels = labels.len(), n_pairs = pairs.len(), "paired class shuffling");
        Ok(PairedShuffle {
            labels: shuffled,
            pairs: Some(pairs),
        })
    }

    fn draw_pairs(&self, labels: &Array1<i64>, noise_ratio: f64) -> Result<PairMap> {
        let normal = class_positions(labels, 0);
        let anomalous = class_positions(labels, 1);
        let n_normal_keys = (noise_ratio * normal.len() as f64) as usize;
        let n_anomalous_keys = (noise_ratio * anomalous.len() as f64) as usize;

        let mut rng = self.rng(Operation::PairedShuffle);
        let normal_keys = draw(&mut rng, &normal, n_normal_keys, false);
        let anomalous_keys = draw(&mut rng, &anomalous, n_anomalous_keys, false);

        let spare_normal = without(&normal, &normal_keys);
        let spare_anomalous = without(&anomalous, &anomalous_keys);

        let normal_partners = draw_partners(&mut rng, &spare_anomalous, n_normal_keys)?;
        let anomalous_partners = draw_partners(&mut rng, &spare_normal, n_anomalous_keys)?;

        Ok(normal_keys
            .into_iter()
            .zip(normal_partners)
            .chain(anomalous_keys.into_iter().zip(anomalous_partners))
            .collect())
    }
}

fn unchanged(labels: &Array1<i64>) -> LabelShuffle {
    LabelShuffle {
        labels: labels.clone(),
        shuffled_idx: None,
    }
}

/// Opposite class at `positions`, computed from the input labels
fn flipped(labels: &Array1<i64>, positions: &[usize]) -> Array1<i64> {
    let mut out = labels.clone();
    for &pos in positions {
        out[pos] = 1 - labels[pos];
    }
    out
}

fn check_ratio(noise_ratio: f64) -> Result<()> {
    if noise_ratio > 1.0 {
        return Err(NirejectError::invalid_parameter(
            "noise_ratio",
            noise_ratio,
            "must lie in [0, 1]",
        ));
    }
    Ok(())
}

/// Draw `amount` members of `pool`
pub(super) fn draw(rng: &mut ChaCha8Rng, pool: &[usize], amount: usize, replace: bool) -> Vec<usize> {
    if replace {
        (0..amount).map(|_| pool[rng.gen_range(0..pool.len())]).collect()
    } else {
        sample(rng, pool.len(), amount)
            .into_iter()
            .map(|i| pool[i])
            .collect()
    }
}

fn draw_partners(rng: &mut ChaCha8Rng, pool: &[usize], amount: usize) -> Result<Vec<usize>> {
    if amount == 0 {
        return Ok(Vec::new());
    }
    if pool.is_empty() {
        return Err(NirejectError::Validation(format!(
            "No untouched rows of the opposite class left to pair with {} keys",
            amount
        )));
    }
    let replace = pool.len() < amount;
    if replace {
        warn!(
            pool = pool.len(),
            needed = amount,
            "partner pool smaller than key set, drawing partners with replacement"
        );
    }
    Ok(draw(rng, pool, amount, replace))
}

fn without(pool: &[usize], taken: &[usize]) -> Vec<usize> {
    pool.iter().copied().filter(|p| !taken.contains(p)).collect()
}
