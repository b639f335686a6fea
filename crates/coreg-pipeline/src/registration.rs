//! Frame-to-frame registration from shared labels.
//!
//! The workflow is: collect correspondences, fit a similarity transform in
//! closed form, refine the off-diagonal coupling terms, then persist. The
//! forward and inverse transforms of a pair are fitted independently, so
//! they are close to but not exactly each other's inverse.

use crate::correspondence::CorrespondenceSet;
use crate::store::{StoreError, TransformStore};
use crate::transform::{mat4_rows, Transform};
use coreg_core::{Frame, FrameId, Mat4, PointSetStore, Real};
use coreg_linear::{
    affine_matrix_from_points, alignment_error, AffineError, AffineOptions, DegenerateGeometry,
};
use coreg_optim::{
    refine_off_diagonal, LmBackend, NllsSolverBackend, RefineError, SolveOptions, SolveReport,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fewest shared labels a registration accepts, whatever the configuration.
pub const MIN_CORRESPONDENCES: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Required number of shared labels; values below
    /// [`MIN_CORRESPONDENCES`] are raised to it.
    pub min_points: usize,
    pub affine: AffineOptions,
    /// Run the off-diagonal refinement after the closed-form fit.
    pub refine: bool,
    pub solver: SolveOptions,
    /// Keep the closed-form matrix when refinement fails to converge
    /// instead of failing the registration.
    pub accept_unrefined: bool,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            min_points: MIN_CORRESPONDENCES,
            affine: AffineOptions::default(),
            refine: true,
            solver: SolveOptions::default(),
            accept_unrefined: false,
        }
    }
}

impl RegistrationConfig {
    pub fn required_points(&self) -> usize {
        self.min_points.max(MIN_CORRESPONDENCES)
    }
}

/// Point error of a matrix over the correspondences.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResidualStats {
    pub rms: Real,
    pub max: Real,
}

impl ResidualStats {
    fn of(matrix: &Mat4, set: &CorrespondenceSet) -> Self {
        let (rms, max) = alignment_error(matrix, &set.source, &set.dest);
        Self { rms, max }
    }
}

/// Result of registering one ordered frame pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Registration {
    pub transform: Transform,
    /// Labels used for the fit.
    pub labels: Vec<String>,
    /// Labels shared by both frames but unreadable in one of them.
    pub dropped: Vec<String>,
    /// Closed-form estimate before refinement.
    #[serde(with = "mat4_rows")]
    pub linear: Mat4,
    pub scale: Real,
    pub reflection_corrected: bool,
    pub degeneracy: Option<DegenerateGeometry>,
    /// Residuals of [`Registration::linear`].
    pub initial_error: ResidualStats,
    /// Residuals of the saved transform.
    pub final_error: ResidualStats,
    /// Solver report, when refinement ran.
    pub refinement: Option<SolveReport>,
    /// Whether `transform.matrix` is the refined matrix.
    pub refined: bool,
}

/// Forward (`a → b`) and inverse (`b → a`) registrations of a frame pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Calibration {
    pub forward: Registration,
    pub inverse: Registration,
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error(
        "need at least {required} points saved in both {source_frame} and {dest_frame}, found {found}"
    )]
    InsufficientCorrespondences {
        source_frame: FrameId,
        dest_frame: FrameId,
        required: usize,
        found: usize,
    },
    #[error(transparent)]
    Affine(#[from] AffineError),
    #[error(transparent)]
    Refine(#[from] RefineError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Fit the transform mapping `source` positions onto `dest` positions.
///
/// Refinement uses [`LmBackend`]; see [`register_with`] for other backends.
///
/// # Errors
///
/// - [`RegistrationError::InsufficientCorrespondences`] when fewer than
///   [`RegistrationConfig::required_points`] labels are readable in both frames.
/// - [`RegistrationError::Refine`] when refinement does not converge and
///   `accept_unrefined` is off.
pub fn register<S: PointSetStore + ?Sized>(
    store: &S,
    source: &Frame,
    dest: &Frame,
    config: &RegistrationConfig,
) -> Result<Registration, RegistrationError> {
    register_with(&LmBackend, store, source, dest, config)
}

/// [`register`] with an explicit refinement backend.
pub fn register_with<B, S>(
    backend: &B,
    store: &S,
    source: &Frame,
    dest: &Frame,
    config: &RegistrationConfig,
) -> Result<Registration, RegistrationError>
where
    B: NllsSolverBackend,
    S: PointSetStore + ?Sized,
{
    let set = CorrespondenceSet::between(store, source, dest);
    let required = config.required_points();
    if set.len() < required {
        return Err(RegistrationError::InsufficientCorrespondences {
            source_frame: source.id.clone(),
            dest_frame: dest.id.clone(),
            required,
            found: set.len(),
        });
    }

    let estimate = affine_matrix_from_points(&set.source, &set.dest, &config.affine)?;
    if let Some(d) = &estimate.degeneracy {
        warn!("{} -> {}: {d}", source.id, dest.id);
    }
    let initial_error = ResidualStats::of(&estimate.matrix, &set);

    let (matrix, refinement, refined) = if config.refine {
        match refine_off_diagonal(
            backend,
            &estimate.matrix,
            &set.source,
            &set.dest,
            &config.solver,
        ) {
            Ok(r) => (r.matrix, Some(r.report), true),
            Err(RefineError::Convergence { report, unrefined }) if config.accept_unrefined => {
                warn!(
                    "{} -> {}: refinement stopped ({}), keeping closed-form matrix",
                    source.id, dest.id, report.termination
                );
                (unrefined, Some(report), false)
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        (estimate.matrix, None, false)
    };

    let final_error = ResidualStats::of(&matrix, &set);
    info!(
        "registered {} -> {} from {} points: rms {:.3e} -> {:.3e}, max {:.3e}",
        source.id,
        dest.id,
        set.len(),
        initial_error.rms,
        final_error.rms,
        final_error.max
    );

    Ok(Registration {
        transform: Transform::new(source.clone(), dest.clone(), matrix),
        labels: set.labels,
        dropped: set.dropped,
        linear: estimate.matrix,
        scale: estimate.scale,
        reflection_corrected: estimate.reflection_corrected,
        degeneracy: estimate.degeneracy,
        initial_error,
        final_error,
        refinement,
        refined,
    })
}

/// Register `a → b` and `b → a` and save both transforms.
///
/// Both directions are registered before anything is written, and the two
/// transforms go to the store in a single [`TransformStore::save_all`]. A
/// registration failure therefore leaves the store untouched; whether a
/// failed write can be partial depends on the store backend.
pub fn calibrate_pair<S, T>(
    store: &S,
    transforms: &mut T,
    a: &Frame,
    b: &Frame,
    config: &RegistrationConfig,
) -> Result<Calibration, RegistrationError>
where
    S: PointSetStore + ?Sized,
    T: TransformStore + ?Sized,
{
    calibrate_pair_with(&LmBackend, store, transforms, a, b, config)
}

/// [`calibrate_pair`] with an explicit refinement backend.
pub fn calibrate_pair_with<B, S, T>(
    backend: &B,
    store: &S,
    transforms: &mut T,
    a: &Frame,
    b: &Frame,
    config: &RegistrationConfig,
) -> Result<Calibration, RegistrationError>
where
    B: NllsSolverBackend,
    S: PointSetStore + ?Sized,
    T: TransformStore + ?Sized,
{
    let forward = register_with(backend, store, a, b, config)?;
    let inverse = register_with(backend, store, b, a, config)?;
    transforms.save_all(vec![forward.transform.clone(), inverse.transform.clone()])?;
    Ok(Calibration { forward, inverse })
}
