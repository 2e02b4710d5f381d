use std::path::{Path, PathBuf};

use fluxgrid::{
    Backend, CpuBackend, ImageExporter, MetricsHistory, SimConfig, Simulation, SourceField,
};

const STREAM_SPEED: f32 = 2.0;
const BOUNDARY_SPEED: f32 = 0.1;
const DT: f32 = 1.0 / 60.0;

struct Options {
    config: Option<PathBuf>,
    frames: u64,
    width: u32,
    height: u32,
    output_dir: PathBuf,
    gpu: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            config: None,
            frames: 120,
            width: 256,
            height: 256,
            output_dir: PathBuf::from("frames"),
            gpu: false,
        }
    }
}

fn parse_args() -> Result<Options, Box<dyn std::error::Error>> {
    let mut options = Options::default();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--frames" => {
                options.frames = args.next().ok_or("--frames needs a value")?.parse()?;
            }
            "--size" => {
                let size = args.next().ok_or("--size needs WxH")?;
                let (w, h) = size.split_once('x').ok_or("--size expects WxH")?;
                options.width = w.parse()?;
                options.height = h.parse()?;
            }
            "--out" => {
                options.output_dir = PathBuf::from(args.next().ok_or("--out needs a directory")?);
            }
            "--gpu" => options.gpu = true,
            other if !other.starts_with("--") && options.config.is_none() => {
                options.config = Some(PathBuf::from(other));
            }
            other => return Err(format!("unknown argument `{other}`").into()),
        }
    }

    Ok(options)
}

fn run<B: Backend>(backend: B, config: SimConfig, options: &Options) -> Result<(), Box<dyn std::error::Error>> {
    let mut simulation = Simulation::with_config(backend, options.width, options.height, config)?;
    let sources = SourceField::reference_layout(options.width, options.height, BOUNDARY_SPEED, STREAM_SPEED)?;
    let source = simulation.create_source(&sources)?;

    std::fs::create_dir_all(&options.output_dir)?;
    let exporter = ImageExporter::new(options.width, options.height);
    let mut history = MetricsHistory::new();

    log::info!(
        "running {} frames on a {}x{} grid with {} pinned cells",
        options.frames,
        options.width,
        options.height,
        sources.pinned_count()
    );

    for _ in 0..options.frames {
        simulation.step(&source, DT)?;
        let frame = simulation.frame();
        let snapshot = simulation.read_back()?;

        let metrics = history.record_frame(snapshot, frame);
        if frame % 10 == 0 {
            metrics.log_summary();
        }
        exporter.export_frame(snapshot, &options.output_dir, "velocity", frame)?;
    }

    history.log_trends();
    log::info!("wrote {} frames to {}", options.frames, options.output_dir.display());
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<SimConfig, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = parse_args()?;
    let config = load_config(options.config.as_deref())?;

    if options.gpu {
        #[cfg(feature = "gpu")]
        {
            let backend = pollster::block_on(fluxgrid::WgpuBackend::new())?;
            return run(backend, config, &options);
        }
        #[cfg(not(feature = "gpu"))]
        log::warn!("built without the `gpu` feature, falling back to the CPU backend");
    }

    run(CpuBackend::new(), config, &options)
}
