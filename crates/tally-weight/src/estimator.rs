use log::{debug, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tally_core::{CountingParams, Detection, Profile, RefineParams, WeightModel};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::refine::refine_weight;

/// Converts raw detections into un-identified profiles with a weight estimate.
///
/// The area model is evaluated inline. When refinement is enabled, the
/// per-patch pixel classification runs on a fixed-size worker pool; results
/// are always returned in input order.
pub struct WeightEstimator {
    model: WeightModel,
    refine: RefineParams,
    pool: Option<ThreadPool>,
}

impl WeightEstimator {
    /// Create an estimator. A worker pool is started only if refinement is on.
    pub fn new(model: WeightModel, refine: RefineParams) -> Self {
        let pool = if refine.enabled {
            build_pool(default_threads())
        } else {
            None
        };
        Self {
            model,
            refine,
            pool,
        }
    }

    pub fn from_params(params: &CountingParams) -> Self {
        Self::new(params.weight, params.refine.clone())
    }

    /// Replace the worker pool with one of `threads` workers.
    ///
    /// `threads == 0` disables the pool; refinement then runs on the caller.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.pool = if self.refine.enabled && threads > 0 {
            build_pool(threads)
        } else {
            None
        };
        self
    }

    #[inline]
    pub fn model(&self) -> WeightModel {
        self.model
    }

    /// Number of refinement workers, `0` when running sequentially.
    pub fn worker_count(&self) -> usize {
        self.pool.as_ref().map_or(0, ThreadPool::current_num_threads)
    }

    /// Estimate the weight of a single detection.
    ///
    /// Never negative: a large background share or a negative intercept
    /// saturates at zero.
    pub fn estimate(&self, detection: &Detection) -> Profile {
        let mut weight = self.model.eval(detection.area);
        if self.refine.enabled {
            if let Some(patch) = &detection.patch {
                weight = refine_weight(weight, &patch.view(), &self.refine);
            }
        }
        Profile::new(detection.position, detection.area, weight.max(0.0))
    }

    /// Estimate a whole frame, preserving detection order.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(detections = detections.len()))
    )]
    pub fn estimate_all(&self, detections: &[Detection]) -> Vec<Profile> {
        match &self.pool {
            Some(pool) if self.refine.enabled && detections.len() > 1 => {
                pool.install(|| detections.par_iter().map(|d| self.estimate(d)).collect())
            }
            _ => detections.iter().map(|d| self.estimate(d)).collect(),
        }
    }

    /// Release the worker pool. Subsequent estimates run sequentially.
    pub fn stop(&mut self) {
        if self.pool.take().is_some() {
            debug!("refinement pool released");
        }
    }
}

fn default_threads() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

fn build_pool(threads: usize) -> Option<ThreadPool> {
    match ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("tally-refine-{i}"))
        .build()
    {
        Ok(pool) => Some(pool),
        Err(err) => {
            warn!("refinement pool unavailable, running sequentially: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point2;
    use tally_core::{ColorBand, ProfileId, RgbPatch};

    fn refine_on() -> RefineParams {
        RefineParams {
            enabled: true,
            model: WeightModel { m: 1.0, b: 0.0 },
            background: ColorBand::default(),
        }
    }

    #[test]
    fn area_model_only() {
        let est = WeightEstimator::new(WeightModel { m: 0.5, b: 2.0 }, RefineParams::default());
        let p = est.estimate(&Detection::new(Point2::new(3.0, 4.0), 10.0));
        assert_eq!(p.id, ProfileId::Unidentified);
        assert!(!p.matched);
        assert_relative_eq!(p.estimated_weight, 7.0);
        assert_eq!(est.worker_count(), 0);
    }

    #[test]
    fn negative_estimate_saturates_at_zero() {
        let est = WeightEstimator::new(WeightModel { m: 1.0, b: -50.0 }, RefineParams::default());
        let p = est.estimate(&Detection::new(Point2::origin(), 10.0));
        assert_eq!(p.estimated_weight, 0.0);
    }

    #[test]
    fn refinement_without_patch_keeps_area_estimate() {
        let est = WeightEstimator::new(WeightModel { m: 1.0, b: 0.0 }, refine_on()).with_threads(0);
        let p = est.estimate(&Detection::new(Point2::origin(), 30.0));
        assert_relative_eq!(p.estimated_weight, 30.0);
    }

    #[test]
    fn parallel_refinement_preserves_order() {
        let est = WeightEstimator::new(WeightModel { m: 1.0, b: 0.0 }, refine_on()).with_threads(4);
        let belt = RgbPatch::filled(2, 2, [20, 160, 40]);
        let detections: Vec<Detection> = (0..32)
            .map(|i| {
                Detection::new(Point2::new(i as f32, 0.0), 100.0 + i as f32)
                    .with_patch(belt.clone())
            })
            .collect();

        let profiles = est.estimate_all(&detections);
        assert_eq!(profiles.len(), 32);
        for (i, p) in profiles.iter().enumerate() {
            assert_relative_eq!(p.position.x, i as f32);
            assert_relative_eq!(p.estimated_weight, 96.0 + i as f32);
        }
    }

    #[test]
    fn stop_falls_back_to_sequential() {
        let mut est =
            WeightEstimator::new(WeightModel { m: 1.0, b: 0.0 }, refine_on()).with_threads(2);
        assert_eq!(est.worker_count(), 2);
        est.stop();
        assert_eq!(est.worker_count(), 0);

        let detections = vec![Detection::new(Point2::origin(), 5.0); 3];
        assert_eq!(est.estimate_all(&detections).len(), 3);
    }
}
