//! lens_demo - synthetic end-to-end run of the detection or teaching loop
//!
//! Detection mode:
//! 1. Warms up the stub detector
//! 2. Attaches a synthetic source and ticks at display rate
//! 3. Prints mapped boxes and the observed inference rate
//!
//! Teaching mode (`--teach`) first captures examples of two synthetic scenes,
//! then predicts against the chosen source.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use teachable_lens::session::{IntervalTicker, Ticker};
use teachable_lens::{
    ClipConfig, ClipSource, DetectionSession, ExecMode, HistogramEmbedder, InputSource, LensConfig,
    LiveConfig, LiveSource, OverlayItem, Prediction, ResultsSink, Size, StillImage, StubDetector,
    TeachingSession,
};

#[path = "../ui.rs"]
mod ui;

/// Layout size the overlay is mapped into.
const CONTAINER: Size = Size::new(800.0, 450.0);
const EXAMPLES_PER_CLASS: usize = 3;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SourceArg {
    Live,
    Clip,
    Image,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Run the inference loop against synthetic sources")]
struct Args {
    /// How long to run, in seconds.
    #[arg(long, default_value_t = 5)]
    seconds: u64,

    /// Maximum inferences per second (overrides config).
    #[arg(long)]
    fps_cap: Option<f32>,

    /// Synthetic source to attach.
    #[arg(long, value_enum, default_value_t = SourceArg::Live)]
    source: SourceArg,

    /// Teach two classes, then run live prediction instead of detection.
    #[arg(long)]
    teach: bool,

    /// Run model calls on the ticking thread instead of a worker.
    #[arg(long)]
    inline: bool,

    /// UI mode: auto, plain, or pretty.
    #[arg(long, default_value = "auto")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let mut config = {
        let _stage = ui.stage("Load configuration");
        LensConfig::load()?
    };
    if let Some(hz) = args.fps_cap {
        config.frame_cap_hz = hz;
        config.validate()?;
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("failed to install Ctrl-C handler")?;

    let mode = if args.inline {
        ExecMode::Inline
    } else {
        ExecMode::Background
    };
    let run = RunOptions {
        deadline: Duration::from_secs(args.seconds),
        mode,
        shutdown,
    };

    if args.teach {
        run_teaching(&args, &config, &ui, &run)
    } else {
        run_detection(&args, &config, &ui, &run)
    }
}

struct RunOptions {
    deadline: Duration,
    mode: ExecMode,
    shutdown: Arc<AtomicBool>,
}

fn run_detection(args: &Args, config: &LensConfig, ui: &ui::Ui, run: &RunOptions) -> Result<()> {
    let mut session = DetectionSession::new(StubDetector::new(), config, run.mode)?;
    {
        let _stage = ui.stage("Warm up detector");
        session.start()?;
    }
    session.set_container(CONTAINER);
    {
        let _stage = ui.stage("Attach source");
        session.attach(build_source(args.source, config)?);
    }

    let mut sink = TerminalSink::new(ui.status_line("detect"));
    let mut ticker = IntervalTicker::display();
    let mut ticks = 0u64;
    loop {
        let now = ticker.next_tick();
        if now >= run.deadline || run.shutdown.load(Ordering::SeqCst) {
            break;
        }
        session.tick(now, &mut sink);
        ticks += 1;
    }
    session.shutdown();
    log::info!(
        "detection finished: {} ticks, {} applied cycles",
        ticks,
        sink.updates
    );
    sink.finish();
    Ok(())
}

fn run_teaching(args: &Args, config: &LensConfig, ui: &ui::Ui, run: &RunOptions) -> Result<()> {
    let embedder = HistogramEmbedder::new();
    let tracker = embedder.tracker();
    let mut session = TeachingSession::new(embedder, config, run.mode)?;
    {
        let _stage = ui.stage("Warm up embedder");
        session.start()?;
    }

    {
        let _stage = ui.stage("Teach classes");
        let (width, height) = (config.source.width, config.source.height);
        for (label, scene) in [("scene-a", 0u8), ("scene-b", 1u8)] {
            let class_id = session.declare_class(label)?;
            session.attach(InputSource::image(StillImage::synthetic(width, height, scene)));
            for _ in 0..EXAMPLES_PER_CLASS {
                session.capture_example(class_id)?;
            }
        }
        for summary in session.class_counts()? {
            log::info!("{} '{}': {} examples", summary.id, summary.label, summary.examples);
        }
    }

    session.attach(build_source(args.source, config)?);
    let mut sink = TerminalSink::new(ui.status_line("predict"));
    let mut ticker = IntervalTicker::display();
    loop {
        let now = ticker.next_tick();
        if now >= run.deadline || run.shutdown.load(Ordering::SeqCst) {
            break;
        }
        session.tick(now, &mut sink);
    }
    session.shutdown();
    log::info!(
        "teaching finished: {} applied predictions, {} live vectors",
        sink.updates,
        tracker.live()
    );
    sink.finish();
    Ok(())
}

fn build_source(kind: SourceArg, config: &LensConfig) -> Result<InputSource> {
    let (width, height) = (config.source.width, config.source.height);
    let source = match kind {
        SourceArg::Live => {
            let mut live = LiveSource::new(LiveConfig {
                url: config.source.url.clone(),
                width,
                height,
            })?;
            live.connect()?;
            InputSource::live(live)
        }
        SourceArg::Clip => {
            let clip = ClipSource::new(ClipConfig {
                width,
                height,
                ..ClipConfig::default()
            })?;
            let mut source = InputSource::video(clip);
            source.set_playing(true);
            source
        }
        SourceArg::Image => InputSource::image(StillImage::synthetic(width, height, 0)),
    };
    if source.natural_size().is_none() {
        return Err(anyhow!("source {} has no dimensions", source.name()));
    }
    Ok(source)
}

struct TerminalSink {
    line: ui::StatusLine,
    rate: Option<u32>,
    updates: u64,
}

impl TerminalSink {
    fn new(line: ui::StatusLine) -> Self {
        Self {
            line,
            rate: None,
            updates: 0,
        }
    }

    fn show(&mut self, message: String) {
        let rate = self
            .rate
            .map(|r| format!("{r}/s"))
            .unwrap_or_else(|| "-".to_string());
        self.line.update(&format!("[{rate}] {message}"));
    }

    fn finish(self) {
        let rate = self
            .rate
            .map(|r| format!("last rate {r}/s"))
            .unwrap_or_else(|| "no full window".to_string());
        self.line.finish(&format!("done ({} updates, {})", self.updates, rate));
    }
}

impl ResultsSink for TerminalSink {
    fn detections(&mut self, items: &[OverlayItem]) {
        self.updates += 1;
        let message = if items.is_empty() {
            "no detections".to_string()
        } else {
            items
                .iter()
                .map(|i| format!("{} @ {:.0},{:.0}", i.caption, i.display.left, i.display.top))
                .collect::<Vec<_>>()
                .join(" | ")
        };
        self.show(message);
    }

    fn prediction(&mut self, prediction: &Prediction) {
        self.updates += 1;
        let message = match prediction.top() {
            Some(top) => format!("{} {:.0}%", top.label, top.confidence * 100.0),
            None => "nothing taught".to_string(),
        };
        self.show(message);
    }

    fn throughput(&mut self, per_second: u32) {
        self.rate = Some(per_second);
    }
}
