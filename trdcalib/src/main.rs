use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use trdbase::calibration::local_gain::LocalGainFactor;
use trdbase::calibration::noise::NoiseStatusMcm;
use trdbase::histos::angular::AngularResidHistos;
use trdbase::histos::gain::GainCalibHistos;
use trdbase::propagation::field::UniformField;
use trdbase::propagation::material::UniformMaterial;
use trdbase::propagation::propagator::{HelixPropagator, MatCorrType};
use trdbase::track::trd::TrackTrd;
use trdcalib::calib::TrackBasedCalib;
use trdcalib::config::CalibConfig;
use trdcalib::input::InputData;

#[derive(Parser, Debug)]
#[command(name = "trdcalib")]
#[command(about = "Fill TRD angular residual and gain calibration histograms from matched tracks")]
struct Args {
    /// Input bundle (JSON) with tracks and tracklets
    #[arg(long, short = 'i')]
    input: PathBuf,

    /// Calibration configuration (JSON); flags below override it
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Noise map (JSON)
    #[arg(long)]
    noise: Option<PathBuf>,

    /// Local gain factors (JSON)
    #[arg(long)]
    gain: Option<PathBuf>,

    /// Magnetic field in kG
    #[arg(long)]
    bz: Option<f64>,

    /// Material correction: none, lut or full
    #[arg(long)]
    mat_corr: Option<MatCorrType>,

    #[arg(long)]
    max_snp: Option<f64>,

    #[arg(long)]
    max_step: Option<f64>,

    /// Density (g/cm^3) of a homogeneous material filling the volume
    #[arg(long, default_value_t = 0.0)]
    rho: f64,

    /// Radiation length (cm) of that material
    #[arg(long, default_value_t = 1e9)]
    x0: f64,

    #[arg(long, short = 't')]
    threads: Option<usize>,

    /// Also refit all tracks with their TRD tracklets only
    #[arg(long)]
    refit: bool,

    /// Output file (JSON) for the histograms
    #[arg(long, short = 'o', default_value = "trdcalib.json")]
    output: PathBuf,

    /// Additionally write the histograms bincode encoded to this file
    #[arg(long)]
    binary: Option<PathBuf>,
}

#[derive(Serialize)]
struct CalibOutput<'a> {
    ang_res_histos: &'a AngularResidHistos,
    gain_calib_histos: &'a GainCalibHistos,
    trd_only_fits: &'a [TrackTrd],
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("trdcalib=info".parse()?))
        .init();

    let args = Args::parse();

    let mut config: CalibConfig = match &args.config {
        Some(path) => read_json(path)?,
        None => CalibConfig::default(),
    };
    if let Some(bz) = args.bz {
        config = config.with_bz(bz);
    }
    if let Some(mat_corr) = args.mat_corr {
        config = config.with_mat_corr(mat_corr);
    }
    if let Some(max_snp) = args.max_snp {
        config = config.with_max_snp(max_snp);
    }
    if let Some(max_step) = args.max_step {
        config = config.with_max_step(max_step);
    }
    if let Some(threads) = args.threads {
        config = config.with_num_threads(threads);
    }

    let data: InputData = read_json(&args.input)?;
    let noise: Option<NoiseStatusMcm> = args.noise.as_deref().map(read_json::<NoiseStatusMcm>).transpose()?;
    let gain: Option<LocalGainFactor> = args.gain.as_deref().map(read_json::<LocalGainFactor>).transpose()?;

    let propagator = HelixPropagator::new(UniformField::new(config.bz), UniformMaterial { rho: args.rho, x0: args.x0 });
    let mut calib = TrackBasedCalib::new(config, propagator)?;
    calib.set_input(data.bundle())?;
    calib.set_noise_map_mcm(noise.as_ref());
    calib.set_local_gain_factors(gain.as_ref());

    let n_ang = calib.calculate_ang_res_histos();
    let n_gain = calib.calculate_gain_calib_objs()?;
    if args.refit {
        let tracks: Vec<TrackTrd> = data.tracks_its_tpc_trd.iter().chain(&data.tracks_tpc_trd).cloned().collect();
        calib.do_trd_only_track_fits(&tracks);
    }
    info!(
        residuals = n_ang,
        out_of_range = calib.n_ang_res_out_of_range(),
        gain_samples = n_gain,
        fits = calib.trd_only_fits().len(),
        "calibration cycle done"
    );

    let output = CalibOutput {
        ang_res_histos: calib.ang_res_histos(),
        gain_calib_histos: calib.gain_calib_histos(),
        trd_only_fits: calib.trd_only_fits(),
    };
    let mut writer = BufWriter::new(File::create(&args.output)?);
    serde_json::to_writer_pretty(&mut writer, &output)?;
    writer.flush()?;
    info!(path = %args.output.display(), "histograms written");

    if let Some(path) = &args.binary {
        let bytes = bincode::encode_to_vec(
            (calib.ang_res_histos(), calib.gain_calib_histos()),
            bincode::config::standard(),
        )?;
        info!(path = %path.display(), bytes = bytes.len(), "writing binary histograms");
        std::fs::write(path, bytes)?;
    }
    Ok(())
}
