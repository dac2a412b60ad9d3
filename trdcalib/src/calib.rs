use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, trace, warn};

use trdbase::calibration::local_gain::LocalGainFactor;
use trdbase::calibration::noise::NoiseStatusMcm;
use trdbase::calibration::reco_param::RecoParam;
use trdbase::constants::RAD2DEG;
use trdbase::data::tracklet::{CalibratedTracklet, Tracklet64};
use trdbase::error::PropagationError;
use trdbase::geometry::{alpha_to_sector, row_size, sector_to_alpha, tilt, McmId, DRIFT_LENGTH, LAYER_X, NLAYER};
use trdbase::histos::angular::AngularResidHistos;
use trdbase::histos::gain::GainCalibHistos;
use trdbase::propagation::propagator::Propagator;
use trdbase::track::trd::TrackTrd;

use crate::config::CalibConfig;
use crate::error::{CalibError, Result};
use crate::input::{InputBundle, TrackSource};

struct AngResSample {
    delta_alpha: f64,
    impact_angle: f64,
    chamber: usize,
}

struct GainSample {
    channel: McmId,
    p: f64,
    charge: f64,
    weight: f64,
}

/// Track based calibration of the TRD.
///
/// # Description
///
/// Walks matched TRD tracks through the six layers and accumulates two
/// calibration objects: angular residuals between tracklets and tracks per
/// chamber and impact angle (drift velocity and Lorentz angle), and
/// normalised tracklet charges per readout channel and momentum bin (gain).
/// Tracks are processed in parallel on a private thread pool; the samples of
/// each track are merged in input order, so the histograms do not depend on
/// the number of threads.
///
/// The input tracks are never modified, every pass works on a copy.
///
pub struct TrackBasedCalib<'a, P: Propagator> {
    config: CalibConfig,
    reco_param: RecoParam,
    propagator: P,
    input: InputBundle<'a>,
    noise_calib: Option<&'a NoiseStatusMcm>,
    local_gain: Option<&'a LocalGainFactor>,
    ang_res_histos: AngularResidHistos,
    n_ang_res_out_of_range: usize,
    gain_calib_histos: GainCalibHistos,
    trd_only_fits: Vec<TrackTrd>,
    pool: ThreadPool,
}

impl<'a, P: Propagator> TrackBasedCalib<'a, P> {
    pub fn new(config: CalibConfig, propagator: P) -> Result<Self> {
        config.validate()?;
        let pool = ThreadPoolBuilder::new().num_threads(config.num_threads).build()?;
        let reco_param = config.reco_param();
        let gain_calib_histos = GainCalibHistos::new(config.momentum_axis.clone());
        Ok(TrackBasedCalib {
            config,
            reco_param,
            propagator,
            input: InputBundle::default(),
            noise_calib: None,
            local_gain: None,
            ang_res_histos: AngularResidHistos::new(),
            n_ang_res_out_of_range: 0,
            gain_calib_histos,
            trd_only_fits: Vec::new(),
            pool,
        })
    }

    pub fn config(&self) -> &CalibConfig {
        &self.config
    }

    /// Binds the input of a new cycle. Histograms are kept, see [`Self::reset`].
    pub fn set_input(&mut self, input: InputBundle<'a>) -> Result<()> {
        if input.tracklets_raw.len() != input.tracklets_calib.len() {
            return Err(CalibError::invalid_input(format!(
                "{} raw tracklets but {} calibrated tracklets",
                input.tracklets_raw.len(),
                input.tracklets_calib.len()
            )));
        }
        let n_tracklets = input.tracklets_raw.len();
        for (name, tracks) in [("ITS-TPC-TRD", input.tracks_its_tpc_trd), ("TPC-TRD", input.tracks_tpc_trd)] {
            for (i, trk) in tracks.iter().enumerate() {
                if let Some(idx) = trk.tracklet_index.iter().flatten().find(|&&idx| idx as usize >= n_tracklets) {
                    return Err(CalibError::invalid_input(format!(
                        "{name} track {i} refers to tracklet {idx}, only {n_tracklets} available"
                    )));
                }
            }
        }
        debug!(
            its_tpc_trd = input.tracks_its_tpc_trd.len(),
            tpc_trd = input.tracks_tpc_trd.len(),
            tracklets = n_tracklets,
            "input bound"
        );
        self.input = input;
        Ok(())
    }

    pub fn set_noise_map_mcm(&mut self, noise: Option<&'a NoiseStatusMcm>) {
        self.noise_calib = noise;
    }

    pub fn set_local_gain_factors(&mut self, gain: Option<&'a LocalGainFactor>) {
        self.local_gain = gain;
    }

    /// Clears both histograms, the out-of-range count and the retained TRD-only fits.
    pub fn reset(&mut self) {
        self.ang_res_histos.reset();
        self.n_ang_res_out_of_range = 0;
        self.gain_calib_histos.reset();
        self.trd_only_fits.clear();
    }

    pub fn ang_res_histos(&self) -> &AngularResidHistos {
        &self.ang_res_histos
    }

    /// Residuals dropped since the last reset because the track impact angle
    /// was outside the histogram range of ±25 degrees.
    pub fn n_ang_res_out_of_range(&self) -> usize {
        self.n_ang_res_out_of_range
    }

    pub fn gain_calib_histos(&self) -> &GainCalibHistos {
        &self.gain_calib_histos
    }

    /// Tracks that survived the last TRD-only refit.
    pub fn trd_only_fits(&self) -> &[TrackTrd] {
        &self.trd_only_fits
    }

    fn tracklet(&self, index: usize) -> std::result::Result<(&Tracklet64, &CalibratedTracklet), PropagationError> {
        match (self.input.tracklets_raw.get(index), self.input.tracklets_calib.get(index)) {
            (Some(raw), Some(calib)) => Ok((raw, calib)),
            _ => Err(PropagationError::UnknownTracklet { index }),
        }
    }

    /// Brings the track to `layer`. Returns the index of the tracklet attached there.
    fn propagate_to_layer(&self, trk: &mut TrackTrd, layer: usize) -> std::result::Result<Option<usize>, PropagationError> {
        if layer >= NLAYER {
            return Err(PropagationError::InvalidLayer { layer });
        }
        let cfg = &self.config;
        let (x, index) = match trk.tracklet_index(layer) {
            Some(index) => {
                let (raw, calib) = self.tracklet(index)?;
                let sector = raw.sector();
                if alpha_to_sector(trk.param.alpha) != sector {
                    trk.param.rotate(sector_to_alpha(sector))?;
                }
                (calib.x, Some(index))
            }
            None => (LAYER_X[layer], None),
        };
        self.propagator
            .propagate_to_x(&mut trk.param, trk.mass, x, cfg.max_snp, cfg.max_step, cfg.mat_corr)?;
        Ok(index)
    }

    fn update_with_tracklet(&self, trk: &mut TrackTrd, layer: usize, index: usize) -> std::result::Result<(), PropagationError> {
        let (_, calib) = self.tracklet(index)?;
        let tilt = tilt(layer);
        let pad_length = row_size(layer);
        let dz = calib.z - trk.param.z();
        // the pad tilt only moves y if the track z is known to better than a pad row
        let tilt_corr = if trk.param.sigma_z2() < pad_length * pad_length / 12.0 && dz.abs() < pad_length {
            tilt * dz
        } else {
            0.0
        };
        let z = if trk.is_crossing_row(layer) {
            calib.z
        } else {
            calib.z + self.reco_param.z_corr_coef_nrc * trk.param.tgl()
        };
        let cov = self.reco_param.tracklet_cov(tilt, trk.param.snp(), pad_length);
        trk.chi2 += trk.param.update([calib.y - tilt_corr, z], cov)?;
        Ok(())
    }

    /// Propagates the track to `layer` and, if `do_update` is set and a tracklet is
    /// attached there, updates it with the tracklet position.
    ///
    /// # Description
    ///
    /// With a tracklet the track is first rotated into the sector of the
    /// tracklet and propagated to the tracklet x; without one it is propagated
    /// to the nominal x of the layer in its current frame. The chi2 of the
    /// update is added to the track. On error the track state is undefined.
    ///
    /// # Arguments
    ///
    /// * `trk` - track to move, modified in place
    /// * `layer` - target layer, `0..NLAYER`
    /// * `do_update` - whether to apply the tracklet of that layer
    ///
    /// # Returns
    ///
    /// * `Err(PropagationError::InvalidLayer)` for a layer outside the detector,
    ///   otherwise the propagation or update error of the track
    ///
    /// # Example
    ///
    /// ```
    /// use trdbase::error::PropagationError;
    /// use trdbase::geometry::{sector_to_alpha, LAYER_X, NLAYER};
    /// use trdbase::propagation::propagator::HelixPropagator;
    /// use trdbase::track::param::TrackParCov;
    /// use trdbase::track::trd::TrackTrd;
    /// use trdcalib::calib::TrackBasedCalib;
    /// use trdcalib::config::CalibConfig;
    ///
    /// let engine = TrackBasedCalib::new(CalibConfig::default().with_bz(0.0), HelixPropagator::uniform(0.0)).unwrap();
    /// let param = TrackParCov::with_diagonal(290.0, sector_to_alpha(0), [0.0, 0.0, 0.0, 0.0, 1.0], [0.01, 0.01, 1e-4, 1e-4, 1e-2]);
    /// let mut trk = TrackTrd::new(param, 0);
    /// engine.propagate_and_update(&mut trk, 1, true).unwrap();
    /// assert!((trk.param.x - LAYER_X[1]).abs() < 1e-4);
    /// assert_eq!(
    ///     engine.propagate_and_update(&mut trk, NLAYER, true),
    ///     Err(PropagationError::InvalidLayer { layer: NLAYER })
    /// );
    /// ```
    pub fn propagate_and_update(&self, trk: &mut TrackTrd, layer: usize, do_update: bool) -> std::result::Result<(), PropagationError> {
        if layer >= NLAYER {
            return Err(PropagationError::InvalidLayer { layer });
        }
        let index = self.propagate_to_layer(trk, layer)?;
        if let (true, Some(index)) = (do_update, index) {
            self.update_with_tracklet(trk, layer, index)?;
        }
        Ok(())
    }

    fn ang_res_samples(&self, trk: &TrackTrd) -> Vec<AngResSample> {
        let mut samples = Vec::new();
        if trk.n_tracklets() < self.config.min_tracklets_ang_res {
            return samples;
        }
        let mut work = trk.clone();
        for layer in 0..NLAYER {
            let index = match self.propagate_to_layer(&mut work, layer) {
                Ok(Some(index)) => index,
                Ok(None) => continue,
                Err(e) => {
                    trace!(layer, error = %e, "angular residual pass stopped");
                    break;
                }
            };
            let Ok((raw, calib)) = self.tracklet(index) else { break };
            let trk_angle = work.param.snp().asin() * RAD2DEG;
            let trklt_angle = (calib.dy / DRIFT_LENGTH).atan() * RAD2DEG;
            let sample = AngResSample {
                delta_alpha: trklt_angle - trk_angle,
                impact_angle: trk_angle,
                chamber: raw.detector(),
            };
            // a residual only counts if the tracklet is also usable for the update
            if let Err(e) = self.update_with_tracklet(&mut work, layer, index) {
                trace!(layer, error = %e, "angular residual pass stopped at update");
                break;
            }
            samples.push(sample);
        }
        samples
    }

    /// Fills the angular residual histograms from all TRD tracks of the input.
    /// Returns the number of residuals added.
    ///
    /// Residuals with a track impact angle outside ±25 degrees have no bin;
    /// they are counted in [`Self::n_ang_res_out_of_range`] instead.
    pub fn calculate_ang_res_histos(&mut self) -> usize {
        let mut n_added = 0;
        let mut n_rejected = 0;
        for source in [TrackSource::ItsTpc, TrackSource::Tpc] {
            let tracks = self.input.tracks(source);
            let samples: Vec<Vec<AngResSample>> =
                self.pool.install(|| tracks.par_iter().map(|trk| self.ang_res_samples(trk)).collect());
            let mut n_source = 0;
            let mut n_source_rejected = 0;
            for s in samples.into_iter().flatten() {
                if self.ang_res_histos.add_entry(s.delta_alpha, s.impact_angle, s.chamber) {
                    n_source += 1;
                } else {
                    trace!(impact_angle = s.impact_angle, chamber = s.chamber, "impact angle out of range");
                    n_source_rejected += 1;
                }
            }
            debug!(?source, tracks = tracks.len(), residuals = n_source, out_of_range = n_source_rejected, "angular residuals");
            n_added += n_source;
            n_rejected += n_source_rejected;
        }
        self.n_ang_res_out_of_range += n_rejected;
        if n_rejected > 0 {
            warn!(out_of_range = n_rejected, "residuals outside the impact angle range were dropped");
        }
        info!(residuals = n_added, total = self.ang_res_histos.n_entries(), "angular residual histograms filled");
        n_added
    }

    fn gain_samples(&self, trk: &TrackTrd, source: TrackSource) -> Vec<GainSample> {
        let mut samples = Vec::new();
        let cfg = &self.config;
        if trk.n_tracklets() < cfg.min_tracklets_gain {
            return samples;
        }
        let dedx = match self.input.reference_dedx(trk, source) {
            Some(dedx) if dedx.is_finite() && dedx > 0.0 && dedx > cfg.tpc_dedx_min => dedx,
            _ => {
                trace!(ref_track = trk.ref_track, "no valid reference dE/dx");
                return samples;
            }
        };
        if cfg.momentum_axis.bin(trk.param.p()).is_none() {
            return samples;
        }

        let mut work = trk.clone();
        for layer in 0..NLAYER {
            let index = match self.propagate_to_layer(&mut work, layer) {
                Ok(Some(index)) => index,
                Ok(None) => continue,
                Err(e) => {
                    trace!(layer, error = %e, "gain pass stopped");
                    break;
                }
            };
            let Ok((raw, _)) = self.tracklet(index) else { break };
            if self.noise_calib.is_some_and(|noise| noise.is_tracklet_from_noisy_mcm(raw)) {
                trace!(detector = raw.detector, rob = raw.rob, mcm = raw.mcm, "tracklet from noisy MCM skipped");
                continue;
            }
            let channel = raw.channel();
            let mut charge = raw.total_charge();
            if let Some(factor) = self.local_gain.and_then(|gain| gain.value(channel)) {
                charge /= factor;
            }
            let snp = work.param.snp();
            let tgl = work.param.tgl();
            let mut path = (1.0 + tgl * tgl).sqrt() / ((1.0 - snp) * (1.0 + snp)).sqrt();
            if work.is_crossing_row(layer) {
                path *= cfg.cross_row_path_scale;
            }
            samples.push(GainSample { channel, p: work.param.p(), charge: charge / path, weight: dedx });
        }
        samples
    }

    fn check_required_corrections(&self) -> Result<()> {
        if self.config.require_noise_map && self.noise_calib.is_none() {
            return Err(CalibError::MissingCorrection("noise map"));
        }
        if self.config.require_local_gain && self.local_gain.is_none() {
            return Err(CalibError::MissingCorrection("local gain factors"));
        }
        Ok(())
    }

    /// Fills the gain histograms from `tracks` seeded by `source`.
    /// Returns the number of charge samples added.
    pub fn fill_dedx(&mut self, tracks: &[TrackTrd], source: TrackSource) -> Result<usize> {
        self.check_required_corrections()?;
        let samples: Vec<Vec<GainSample>> =
            self.pool.install(|| tracks.par_iter().map(|trk| self.gain_samples(trk, source)).collect());
        let mut n_added = 0;
        for s in samples.into_iter().flatten() {
            if self.gain_calib_histos.fill(s.channel, s.p, s.charge, s.weight) {
                n_added += 1;
            }
        }
        debug!(?source, tracks = tracks.len(), samples = n_added, "gain samples");
        Ok(n_added)
    }

    /// Fills the gain histograms from all TRD tracks of the input.
    pub fn calculate_gain_calib_objs(&mut self) -> Result<usize> {
        self.check_required_corrections()?;
        let its_tpc = self.input.tracks_its_tpc_trd;
        let tpc = self.input.tracks_tpc_trd;
        let n_added = self.fill_dedx(its_tpc, TrackSource::ItsTpc)? + self.fill_dedx(tpc, TrackSource::Tpc)?;
        info!(samples = n_added, cells = self.gain_calib_histos.n_filled_cells(), "gain histograms filled");
        Ok(n_added)
    }

    fn refit(&self, trk: &TrackTrd) -> Option<TrackTrd> {
        if trk.n_tracklets() < self.config.min_tracklets_refit {
            return None;
        }
        let mut work = trk.clone();
        work.param.reset_covariance(self.config.refit_cov_scale);
        work.chi2 = 0.0;
        for layer in 0..NLAYER {
            if let Err(e) = self.propagate_and_update(&mut work, layer, true) {
                trace!(layer, error = %e, "TRD-only refit failed");
                return None;
            }
        }
        Some(work)
    }

    /// Refits `tracks` with their TRD tracklets only, starting from a reset covariance.
    ///
    /// Only tracks that pass every layer are kept, see [`Self::trd_only_fits`].
    /// Returns their number.
    pub fn do_trd_only_track_fits(&mut self, tracks: &[TrackTrd]) -> usize {
        let fits: Vec<Option<TrackTrd>> = self.pool.install(|| tracks.par_iter().map(|trk| self.refit(trk)).collect());
        self.trd_only_fits = fits.into_iter().flatten().collect();
        info!(tracks = tracks.len(), fitted = self.trd_only_fits.len(), "TRD-only refits done");
        self.trd_only_fits.len()
    }
}
