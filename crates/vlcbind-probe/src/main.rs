mod cli;

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use vlcbind_core::{BindingConfig, EventRecord, LogLevel, MediaPlayerFactory};
use vlcbind_native::sim::SimulatedNative;

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vlcbind_probe=info,vlcbind_core=info,vlcbind_native=warn"));
    if args.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = BindingConfig::load(&args.config)?;
    // Still single threaded: no factory exists yet.
    config.library.export_plugin_path();
    let (factory, sim) = open_factory(&args, &config)?;
    info!(version = %factory.version(), simulated = sim.is_some(), "vlcbind-probe starting");

    let log = factory.native_log(parse_log_level(&args.native_log)?)?;
    let _log_sub = log.subscribe(|event| {
        if let EventRecord::Log(line) = &event.record {
            let module = line.module.as_deref().unwrap_or("-");
            match line.level {
                LogLevel::Error => error!(target: "libvlc", module, "{}", line.message),
                LogLevel::Warning => warn!(target: "libvlc", module, "{}", line.message),
                LogLevel::Notice => info!(target: "libvlc", module, "{}", line.message),
                LogLevel::Debug => debug!(target: "libvlc", module, "{}", line.message),
            }
        }
    });

    if let Some(mrl) = &args.mrl {
        play(&factory, sim.as_deref(), mrl, &args)?;
    }
    if let Some(service) = &args.renderers {
        browse_renderers(&factory, service, &args)?;
    }
    if args.mrl.is_none() && args.renderers.is_none() {
        info!("nothing to do; pass --mrl or --renderers");
    }

    let stats = factory.dispatch_stats();
    info!(
        enqueued = stats.enqueued,
        delivered = stats.delivered,
        listener_failures = stats.listener_failures,
        "dispatch totals"
    );
    factory.release();
    Ok(())
}

fn open_factory(
    args: &cli::Args,
    config: &BindingConfig,
) -> anyhow::Result<(MediaPlayerFactory, Option<Arc<SimulatedNative>>)> {
    if args.simulate {
        let sim = Arc::new(SimulatedNative::new());
        let factory = MediaPlayerFactory::new(sim.clone(), config).context("simulated instance")?;
        return Ok((factory, Some(sim)));
    }
    load_libvlc(config).map(|factory| (factory, None))
}

#[cfg(feature = "libvlc")]
fn load_libvlc(config: &BindingConfig) -> anyhow::Result<MediaPlayerFactory> {
    MediaPlayerFactory::load(config).context("failed to load LibVLC")
}

#[cfg(not(feature = "libvlc"))]
fn load_libvlc(_config: &BindingConfig) -> anyhow::Result<MediaPlayerFactory> {
    bail!("built without the `libvlc` feature; run with --simulate")
}

fn parse_log_level(raw: &str) -> anyhow::Result<LogLevel> {
    Ok(match raw.to_ascii_lowercase().as_str() {
        "debug" => LogLevel::Debug,
        "notice" | "info" => LogLevel::Notice,
        "warning" | "warn" => LogLevel::Warning,
        "error" => LogLevel::Error,
        other => bail!("unknown native log level {other:?}"),
    })
}

fn play(
    factory: &MediaPlayerFactory,
    sim: Option<&SimulatedNative>,
    mrl: &str,
    args: &cli::Args,
) -> anyhow::Result<()> {
    let media = factory.new_media(mrl)?;
    let player = factory.new_player()?;
    player.set_media(Some(&media))?;

    let _events = player.subscribe(|event| match &event.record {
        EventRecord::TimeChanged(_) | EventRecord::PositionChanged(_) => {
            debug!(seq = event.seq, record = ?event.record, "player event");
        }
        record => info!(seq = event.seq, event = record.name(), "player event"),
    })?;
    let finished = player.latch(|record| {
        matches!(record, EventRecord::MediaEnded | EventRecord::EncounteredError)
    })?;

    player.play()?;
    info!(mrl, "playback started");
    if let Some(sim) = sim {
        let raw = player.handle().with_ptr(|p| p)?;
        sim.finish_playback(raw);
    }

    match finished.wait(args.timeout()) {
        Some(event) if matches!(event.record, EventRecord::EncounteredError) => {
            error!(mrl, "playback failed");
        }
        Some(_) => info!(mrl, "playback finished"),
        None => {
            warn!(mrl, timeout_secs = args.timeout, "timed out waiting for end of media; stopping");
            player.stop()?;
        }
    }

    player.release();
    media.release();
    Ok(())
}

fn browse_renderers(factory: &MediaPlayerFactory, service: &str, args: &cli::Args) -> anyhow::Result<()> {
    let discoverer = factory.new_renderer_discoverer(service)?;
    let _events = discoverer.subscribe(|event| match &event.record {
        EventRecord::RendererItemAdded(item) => info!(
            name = item.snapshot().name().unwrap_or("?"),
            held = item.is_held(),
            "renderer found"
        ),
        EventRecord::RendererItemDeleted(item) => {
            info!(name = item.snapshot().name().unwrap_or("?"), "renderer gone")
        }
        _ => {}
    })?;
    discoverer.start()?;
    info!(service, timeout_secs = args.timeout, "browsing renderers");
    std::thread::sleep(args.timeout());
    discoverer.stop()?;
    discoverer.release();
    Ok(())
}
