use approx::assert_abs_diff_eq;

use trdbase::calibration::local_gain::LocalGainFactor;
use trdbase::calibration::noise::NoiseStatusMcm;
use trdbase::constants::MASS_PION_CHARGED;
use trdbase::data::tracklet::{CalibratedTracklet, Tracklet64};
use trdbase::geometry::{chamber, sector_to_alpha, DRIFT_LENGTH, LAYER_X, NLAYER};
use trdbase::histos::angular::AngularResidHistos;
use trdbase::propagation::propagator::{HelixPropagator, MatCorrType, Propagator};
use trdbase::track::param::TrackParCov;
use trdbase::track::reference::{TrackTpc, TrackTpcIts};
use trdbase::track::trd::TrackTrd;
use trdcalib::calib::TrackBasedCalib;
use trdcalib::config::CalibConfig;
use trdcalib::error::CalibError;
use trdcalib::input::{InputBundle, TrackSource};

/// Tracks with tracklets placed exactly on their trajectory.
#[derive(Clone, Default)]
struct Event {
    tracks: Vec<TrackTrd>,
    raw: Vec<Tracklet64>,
    calib: Vec<CalibratedTracklet>,
    tpc: Vec<TrackTpc>,
}

impl Event {
    fn bundle(&self) -> InputBundle<'_> {
        InputBundle {
            tracks_tpc_trd: &self.tracks,
            tracklets_raw: &self.raw,
            tracklets_calib: &self.calib,
            tracks_tpc: &self.tpc,
            ..Default::default()
        }
    }

    /// Adds a track starting at x = 290 cm in sector 0 with tracklets in `layers`,
    /// read out by ROB `rob`.
    fn add_track(&mut self, bz: f64, snp: f64, q2pt: f64, layers: &[usize], rob: u8) -> usize {
        let param = TrackParCov::with_diagonal(
            290.0,
            sector_to_alpha(0),
            [0.0, 0.0, snp, 0.0, q2pt],
            [0.01, 0.01, 1e-4, 1e-4, 1e-2],
        );
        let truth_prop = HelixPropagator::uniform(bz);
        let mut truth = param.clone();
        self.tpc.push(TrackTpc::new(60.0));
        let mut trk = TrackTrd::new(param, (self.tpc.len() - 1) as u32);
        for &layer in layers {
            truth_prop
                .propagate_to_x(&mut truth, MASS_PION_CHARGED, LAYER_X[layer], 0.0, 2.0, MatCorrType::None)
                .unwrap();
            let dy = DRIFT_LENGTH * truth.snp().asin().tan();
            self.calib.push(CalibratedTracklet::new(truth.x, truth.y(), truth.z(), dy));
            self.raw.push(Tracklet64::new(chamber(0, 0, layer) as u16, rob, layer as u8, 3, [100, 120, 140]));
            trk = trk.with_tracklet(layer, (self.raw.len() - 1) as u32);
        }
        self.tracks.push(trk);
        self.tracks.len() - 1
    }
}

const ALL_LAYERS: [usize; NLAYER] = [0, 1, 2, 3, 4, 5];

fn engine<'a>(config: CalibConfig) -> TrackBasedCalib<'a, HelixPropagator> {
    let bz = config.bz;
    TrackBasedCalib::new(config, HelixPropagator::uniform(bz)).unwrap()
}

#[test]
fn tracks_without_tracklets_record_nothing() {
    let mut ev = Event::default();
    ev.add_track(0.0, 0.0, 1.0, &[], 0);
    ev.add_track(0.0, 0.1, 1.0, &[], 0);
    let mut calib = engine(CalibConfig::default().with_bz(0.0));
    calib.set_input(ev.bundle()).unwrap();
    assert_eq!(calib.calculate_ang_res_histos(), 0);
    assert_eq!(calib.calculate_gain_calib_objs().unwrap(), 0);
    assert_eq!(calib.ang_res_histos().n_entries(), 0);
    assert_eq!(calib.gain_calib_histos().n_entries(), 0);
}

#[test]
fn straight_track_gives_one_zero_residual_per_layer() {
    let mut ev = Event::default();
    ev.add_track(0.0, 0.0, 1.0, &ALL_LAYERS, 0);
    let mut calib = engine(CalibConfig::default().with_bz(0.0));
    calib.set_input(ev.bundle()).unwrap();

    assert_eq!(calib.calculate_ang_res_histos(), NLAYER);
    let histos = calib.ang_res_histos();
    let bin = AngularResidHistos::angle_bin(0.0).unwrap();
    for layer in 0..NLAYER {
        assert_eq!(histos.layer_entries(layer), 1);
        let det = chamber(0, 0, layer);
        assert_eq!(histos.bin_entries(det, bin), 1);
        assert_abs_diff_eq!(histos.mean_residual(det, bin).unwrap(), 0.0, epsilon = 1e-6);
    }
}

#[test]
fn bent_track_residuals_vanish_in_field() {
    let mut ev = Event::default();
    ev.add_track(5.0, 0.1, 0.8, &ALL_LAYERS, 0);
    let mut calib = engine(CalibConfig::default());
    calib.set_input(ev.bundle()).unwrap();

    assert_eq!(calib.calculate_ang_res_histos(), NLAYER);
    let histos = calib.ang_res_histos();
    let mean_abs: f64 = (0..NLAYER)
        .map(|layer| {
            let det = chamber(0, 0, layer);
            let (sum, n) = (0..trdbase::histos::angular::NBINSANGLEDIFF)
                .fold((0.0, 0), |(s, n), bin| (s + histos.bin_content(det, bin), n + histos.bin_entries(det, bin)));
            assert_eq!(n, 1);
            sum.abs()
        })
        .sum::<f64>()
        / NLAYER as f64;
    assert!(mean_abs < 1e-3, "mean |residual| = {mean_abs} deg");
}

#[test]
fn snp_limit_keeps_samples_of_earlier_layers() {
    let bz = 5.0;
    let mut ev = Event::default();
    ev.add_track(bz, 0.2, -1.5, &ALL_LAYERS, 0);

    // snp of the trajectory at the first three layers
    let snp: Vec<f64> = ev.calib.iter().take(3).map(|c| (c.dy / DRIFT_LENGTH).atan().sin()).collect();
    assert!(snp[0] < snp[1] && snp[1] < snp[2]);
    let max_snp = 0.5 * (snp[1] + snp[2]);

    let mut calib = engine(CalibConfig::default().with_bz(bz).with_max_snp(max_snp));
    calib.set_input(ev.bundle()).unwrap();
    assert_eq!(calib.calculate_ang_res_histos(), 2);
    let histos = calib.ang_res_histos();
    assert_eq!(histos.layer_entries(0), 1);
    assert_eq!(histos.layer_entries(1), 1);
    for layer in 2..NLAYER {
        assert_eq!(histos.layer_entries(layer), 0);
    }

    // the gain pass stops at the same layer
    assert_eq!(calib.calculate_gain_calib_objs().unwrap(), 2);
}

#[test]
fn steep_tracks_are_counted_not_histogrammed() {
    let mut ev = Event::default();
    // 30 degrees, beyond the impact angle axis
    let steep = ev.add_track(0.0, 0.5, 1.0, &ALL_LAYERS, 0);
    let mut calib = engine(CalibConfig::default().with_bz(0.0));
    calib.set_input(ev.bundle()).unwrap();

    assert_eq!(calib.calculate_ang_res_histos(), 0);
    assert_eq!(calib.ang_res_histos().n_entries(), 0);
    assert_eq!(calib.n_ang_res_out_of_range(), NLAYER);
    // the track itself is fine for the other passes
    assert_eq!(calib.calculate_gain_calib_objs().unwrap(), NLAYER);
    let tracks = ev.tracks.clone();
    assert_eq!(calib.do_trd_only_track_fits(&tracks), 1);
    assert_eq!(calib.trd_only_fits()[0].ref_track, ev.tracks[steep].ref_track);

    // an inclined track inside the range fills normally
    let mut ev = ev.clone();
    ev.add_track(0.0, 0.3, 1.0, &ALL_LAYERS, 1);
    calib.reset();
    assert_eq!(calib.n_ang_res_out_of_range(), 0);
    calib.set_input(ev.bundle()).unwrap();
    assert_eq!(calib.calculate_ang_res_histos(), NLAYER);
    assert_eq!(calib.n_ang_res_out_of_range(), NLAYER);
    let bin = AngularResidHistos::angle_bin(0.3_f64.asin().to_degrees()).unwrap();
    assert_eq!(calib.ang_res_histos().bin_entries(chamber(0, 0, 0), bin), 1);
}

#[test]
fn failed_update_records_no_residual() {
    let mut ev = Event::default();
    ev.add_track(0.0, 0.0, 1.0, &ALL_LAYERS, 0);
    // a tracklet far off the trajectory pushes the updated snp out of range
    ev.calib[0].y = 1.0e4;
    let mut calib = engine(CalibConfig::default().with_bz(0.0));
    calib.set_input(ev.bundle()).unwrap();

    assert_eq!(calib.calculate_ang_res_histos(), 0);
    assert_eq!(calib.ang_res_histos().layer_entries(0), 0);
    // the gain pass only propagates and keeps every layer
    assert_eq!(calib.calculate_gain_calib_objs().unwrap(), NLAYER);
    let tracks = ev.tracks.clone();
    assert_eq!(calib.do_trd_only_track_fits(&tracks), 0);
}

#[test]
fn too_few_tracklets_are_skipped() {
    let mut ev = Event::default();
    ev.add_track(0.0, 0.0, 1.0, &[0, 3], 0);
    let mut calib = engine(CalibConfig::default().with_bz(0.0));
    calib.set_input(ev.bundle()).unwrap();
    assert_eq!(calib.calculate_ang_res_histos(), 0);
    assert_eq!(calib.calculate_gain_calib_objs().unwrap(), 0);
}

#[test]
fn reset_then_reprocessing_is_idempotent() {
    let mut ev = Event::default();
    for i in 0..8 {
        ev.add_track(5.0, -0.2 + 0.05 * i as f64, if i % 2 == 0 { 1.5 } else { -1.5 }, &ALL_LAYERS, i as u8 % 4);
    }
    let mut calib = engine(CalibConfig::default());
    calib.set_input(ev.bundle()).unwrap();
    calib.calculate_ang_res_histos();
    calib.calculate_gain_calib_objs().unwrap();
    let ang = calib.ang_res_histos().clone();
    let gain = calib.gain_calib_histos().clone();
    assert!(ang.n_entries() > 0);
    assert!(gain.n_entries() > 0);

    calib.reset();
    assert_eq!(calib.ang_res_histos().n_entries(), 0);
    assert_eq!(calib.gain_calib_histos().n_entries(), 0);

    calib.calculate_ang_res_histos();
    calib.calculate_gain_calib_objs().unwrap();
    assert_eq!(calib.ang_res_histos(), &ang);
    assert_eq!(calib.gain_calib_histos(), &gain);
}

#[test]
fn cross_row_tracklets_have_lower_normalised_charge() {
    let mut ev = Event::default();
    ev.add_track(0.0, 0.0, 1.0, &ALL_LAYERS, 0);
    let crossing = ev.add_track(0.0, 0.0, 1.0, &ALL_LAYERS, 1);
    for layer in 0..NLAYER {
        ev.tracks[crossing].set_crossing_row(layer, true);
    }
    let mut calib = engine(CalibConfig::default().with_bz(0.0));
    calib.set_input(ev.bundle()).unwrap();
    assert_eq!(calib.calculate_gain_calib_objs().unwrap(), 2 * NLAYER);

    let histos = calib.gain_calib_histos();
    let bin = histos.axis().bin(1.0).unwrap();
    for layer in 0..NLAYER {
        let normal = ev.raw[ev.tracks[0].tracklet_index(layer).unwrap()].channel();
        let cross = ev.raw[ev.tracks[crossing].tracklet_index(layer).unwrap()].channel();
        let q_normal = histos.profile(normal, bin).unwrap().mean().unwrap();
        let q_cross = histos.profile(cross, bin).unwrap().mean().unwrap();
        assert!(q_cross < q_normal);
        assert_abs_diff_eq!(q_normal, 360.0, epsilon = 1e-6);
    }
}

#[test]
fn gain_factors_rescale_the_charge() {
    let mut ev = Event::default();
    ev.add_track(0.0, 0.0, 1.0, &ALL_LAYERS, 0);
    let mut gain = LocalGainFactor::new();
    let channel = ev.raw[0].channel();
    gain.set_value(channel, 2.0);

    let mut calib = engine(CalibConfig::default().with_bz(0.0));
    calib.set_input(ev.bundle()).unwrap();
    calib.set_local_gain_factors(Some(&gain));
    calib.calculate_gain_calib_objs().unwrap();
    let histos = calib.gain_calib_histos();
    let bin = histos.axis().bin(1.0).unwrap();
    assert_abs_diff_eq!(histos.profile(channel, bin).unwrap().mean().unwrap(), 180.0, epsilon = 1e-6);
    let other = ev.raw[1].channel();
    assert_abs_diff_eq!(histos.profile(other, bin).unwrap().mean().unwrap(), 360.0, epsilon = 1e-6);
}

#[test]
fn noisy_channels_contribute_no_gain_samples() {
    let mut ev = Event::default();
    ev.add_track(0.0, 0.0, 1.0, &ALL_LAYERS, 0);
    let noisy = ev.raw[2].channel();
    let noise = NoiseStatusMcm::from_noisy([noisy]);

    let mut calib = engine(CalibConfig::default().with_bz(0.0));
    calib.set_input(ev.bundle()).unwrap();
    calib.set_noise_map_mcm(Some(&noise));
    assert_eq!(calib.calculate_gain_calib_objs().unwrap(), NLAYER - 1);
    assert_eq!(calib.gain_calib_histos().channel_entries(noisy), 0);
    // the angular residuals do not consult the noise map
    assert_eq!(calib.calculate_ang_res_histos(), NLAYER);
}

#[test]
fn invalid_reference_dedx_skips_the_track() {
    let mut ev = Event::default();
    ev.add_track(0.0, 0.0, 1.0, &ALL_LAYERS, 0);
    ev.tpc[0].dedx_tot = f64::NAN;
    let mut calib = engine(CalibConfig::default().with_bz(0.0));
    calib.set_input(ev.bundle()).unwrap();
    assert_eq!(calib.calculate_gain_calib_objs().unwrap(), 0);
}

#[test]
fn its_tpc_tracks_find_dedx_through_their_tpc_reference() {
    let mut ev = Event::default();
    ev.add_track(0.0, 0.0, 1.0, &ALL_LAYERS, 0);
    let its_tpc = vec![TrackTpcIts::new(0)];
    let mut tracks = ev.tracks.clone();
    tracks[0].ref_track = 0;
    let bundle = InputBundle {
        tracks_its_tpc_trd: &tracks,
        tracklets_raw: &ev.raw,
        tracklets_calib: &ev.calib,
        tracks_tpc: &ev.tpc,
        tracks_its_tpc: &its_tpc,
        ..Default::default()
    };
    let mut calib = engine(CalibConfig::default().with_bz(0.0));
    calib.set_input(bundle).unwrap();
    assert_eq!(calib.fill_dedx(&tracks, TrackSource::ItsTpc).unwrap(), NLAYER);
    // read as TPC-TRD tracks the same reference points to the TPC track directly
    assert_eq!(calib.fill_dedx(&tracks, TrackSource::Tpc).unwrap(), NLAYER);
    // without the ITS-TPC table the reference chain is broken
    let no_its = InputBundle { tracks_its_tpc: &[], ..bundle };
    calib.set_input(no_its).unwrap();
    assert_eq!(calib.fill_dedx(&tracks, TrackSource::ItsTpc).unwrap(), 0);
}

#[test]
fn missing_required_correction_fails_before_accumulating() {
    let mut ev = Event::default();
    ev.add_track(0.0, 0.0, 1.0, &ALL_LAYERS, 0);
    let mut config = CalibConfig::default().with_bz(0.0);
    config.require_local_gain = true;
    let mut calib = engine(config);
    calib.set_input(ev.bundle()).unwrap();
    let err = calib.calculate_gain_calib_objs().unwrap_err();
    assert!(matches!(err, CalibError::MissingCorrection(_)));
    assert_eq!(calib.gain_calib_histos().n_entries(), 0);
}

#[test]
fn trd_only_refit_skips_tracks_without_tracklets() {
    let mut ev = Event::default();
    for i in 0..10 {
        let layers: &[usize] = if i % 3 == 0 && i < 9 { &[] } else { &ALL_LAYERS };
        ev.add_track(0.0, 0.02 * i as f64, 1.0, layers, 0);
    }
    assert_eq!(ev.tracks.iter().filter(|t| t.n_tracklets() == 0).count(), 3);

    let mut calib = engine(CalibConfig::default().with_bz(0.0));
    calib.set_input(ev.bundle()).unwrap();
    let tracks = ev.tracks.clone();
    let n_fitted = calib.do_trd_only_track_fits(&tracks);
    assert!(n_fitted <= 7);
    assert_eq!(n_fitted, 7);
    assert_eq!(calib.trd_only_fits().len(), n_fitted);
    for fit in calib.trd_only_fits() {
        assert_abs_diff_eq!(fit.param.x, LAYER_X[5], epsilon = 1e-4);
        assert!(fit.chi2 >= 0.0);
    }
    // the input tracks are untouched
    assert_eq!(tracks, ev.tracks);

    calib.reset();
    assert!(calib.trd_only_fits().is_empty());
}

#[test]
fn trd_only_refit_discards_tracks_failing_mid_detector() {
    let bz = 5.0;
    let mut ev = Event::default();
    let bending: Vec<usize> = (0..3).map(|_| ev.add_track(bz, 0.2, -1.5, &ALL_LAYERS, 0)).collect();
    let good: Vec<usize> = (0..2).map(|i| ev.add_track(bz, -0.05 * i as f64, 1.5, &ALL_LAYERS, 1)).collect();

    // the bending tracks pass layers 0 and 1, then hit the snp limit
    let snp: Vec<f64> = ev.calib.iter().take(3).map(|c| (c.dy / DRIFT_LENGTH).atan().sin()).collect();
    let max_snp = 0.5 * (snp[1] + snp[2]);
    for trk in &good {
        let first = ev.tracks[*trk].tracklet_index(0).unwrap();
        let last = ev.tracks[*trk].tracklet_index(NLAYER - 1).unwrap();
        for c in [&ev.calib[first], &ev.calib[last]] {
            assert!((c.dy / DRIFT_LENGTH).atan().sin().abs() < max_snp);
        }
    }

    let mut calib = engine(CalibConfig::default().with_bz(bz).with_max_snp(max_snp));
    calib.set_input(ev.bundle()).unwrap();
    let tracks = ev.tracks.clone();
    let n_fitted = calib.do_trd_only_track_fits(&tracks);
    assert_eq!(n_fitted, good.len());
    assert_eq!(calib.trd_only_fits().len(), good.len());
    let fitted: Vec<u32> = calib.trd_only_fits().iter().map(|t| t.ref_track).collect();
    let expected: Vec<u32> = good.iter().map(|&i| ev.tracks[i].ref_track).collect();
    assert_eq!(fitted, expected);
    for i in bending {
        assert!(!fitted.contains(&ev.tracks[i].ref_track));
    }
    for fit in calib.trd_only_fits() {
        assert_abs_diff_eq!(fit.param.x, LAYER_X[NLAYER - 1], epsilon = 1e-4);
    }

    // the same tracks still leave their first two residuals
    assert_eq!(calib.calculate_ang_res_histos(), 3 * 2 + 2 * NLAYER);
}

#[test]
fn results_do_not_depend_on_thread_count() {
    let mut ev = Event::default();
    for i in 0..40 {
        let snp = -0.3 + 0.015 * i as f64;
        let q2pt = if i % 2 == 0 { 0.5 + 0.05 * i as f64 } else { -0.5 - 0.05 * i as f64 };
        ev.add_track(5.0, snp, q2pt, &ALL_LAYERS, (i % 8) as u8);
    }
    let mut results = Vec::new();
    for threads in [1, 4] {
        let mut calib = engine(CalibConfig::default().with_num_threads(threads));
        calib.set_input(ev.bundle()).unwrap();
        calib.calculate_ang_res_histos();
        calib.calculate_gain_calib_objs().unwrap();
        results.push((calib.ang_res_histos().clone(), calib.gain_calib_histos().clone()));
    }
    assert!(results[0].0.n_entries() > 0);
    assert_eq!(results[0], results[1]);
}
