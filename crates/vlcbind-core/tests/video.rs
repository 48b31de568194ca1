use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use parking_lot::Mutex;
use vlcbind_core::frame::BufferFormatCallback;
use vlcbind_core::{
    BindError, BindingConfig, BufferFormat, Chroma, FrameLease, MediaPlayer, MediaPlayerFactory,
    NegotiatedFormat, VideoFrame, VideoSurface,
};
use vlcbind_native::sim::{RenderOutcome, SimulatedNative};
use vlcbind_native::RawPtr;

fn player_with_media() -> anyhow::Result<(Arc<SimulatedNative>, MediaPlayerFactory, MediaPlayer, RawPtr)> {
    let sim = Arc::new(SimulatedNative::new());
    let factory = MediaPlayerFactory::new(sim.clone(), &BindingConfig::default())?;
    let player = factory.new_player()?;
    let media = factory.new_media("file:///clips/video.mkv")?;
    player.set_media(Some(&media))?;
    let raw = player.handle().with_ptr(|p| p)?;
    Ok((sim, factory, player, raw))
}

#[derive(Default)]
struct Captured {
    planes: Vec<Vec<u8>>,
    numbers: Vec<u64>,
    lease: Option<FrameLease>,
}

#[test]
fn planar_frames_reach_the_render_callback() -> anyhow::Result<()> {
    let (sim, _factory, player, raw) = player_with_media()?;
    let captured = Arc::new(Mutex::new(Captured::default()));
    let sink = captured.clone();
    let surface = VideoSurface::new(
        |w, h| BufferFormat::new(Chroma::I420, w, h),
        move |frame: &VideoFrame<'_>| {
            let mut c = sink.lock();
            c.planes = (0..3).filter_map(|i| frame.plane(i).map(<[u8]>::to_vec)).collect();
            c.numbers.push(frame.number());
            c.lease = Some(frame.lease());
        },
    );
    player.set_video_surface(Some(surface.clone()))?;

    assert_eq!(sim.render_frame(raw, 64, 32, 0x80), RenderOutcome::Displayed);
    assert_eq!(sim.render_frame(raw, 64, 32, 0x10), RenderOutcome::Displayed);

    let format = surface.current_format().expect("negotiated");
    assert_eq!(format.chroma, Chroma::I420);
    assert_eq!((format.width, format.height), (64, 32));
    assert_eq!(surface.frames_displayed(), 2);

    let c = captured.lock();
    assert_eq!(c.numbers, [1, 2]);
    assert_eq!(c.planes.len(), 3);
    assert_eq!(c.planes[0].len(), 64 * 32);
    assert!(c.planes.iter().all(|p| p.iter().all(|b| *b == 0x10)));

    let lease = c.lease.as_ref().expect("lease kept");
    assert!(!lease.is_valid());
    assert!(matches!(lease.with_planes(|_| ()), Err(BindError::ItemExpired { .. })));
    Ok(())
}

#[derive(Default)]
struct Counts {
    allocated: AtomicUsize,
    cleaned: AtomicUsize,
}

/// Format callback that counts allocations and cleanups.
struct Counting(Arc<Counts>);

impl BufferFormatCallback for Counting {
    fn buffer_format(&self, width: u32, height: u32) -> BufferFormat {
        BufferFormat::rv32(width, height)
    }

    fn allocated(&self, _format: &NegotiatedFormat) {
        self.0.allocated.fetch_add(1, Ordering::SeqCst);
    }

    fn cleanup(&self) {
        self.0.cleaned.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn resize_and_stop_release_the_buffer() -> anyhow::Result<()> {
    let (sim, _factory, player, raw) = player_with_media()?;
    let counting = Arc::new(Counts::default());
    let surface = VideoSurface::new(Counting(counting.clone()), |_: &VideoFrame<'_>| {});
    player.set_video_surface(Some(surface.clone()))?;
    player.play()?;

    sim.render_frame(raw, 320, 240, 0);
    sim.render_frame(raw, 640, 480, 0);
    assert_eq!(counting.allocated.load(Ordering::SeqCst), 2);
    assert_eq!(counting.cleaned.load(Ordering::SeqCst), 1);
    assert_eq!(surface.current_format().map(|f| f.width), Some(640));

    player.stop()?;
    assert_eq!(counting.cleaned.load(Ordering::SeqCst), 2);
    assert!(surface.current_format().is_none());
    Ok(())
}

#[test]
fn rejected_format_is_reported_not_rendered() -> anyhow::Result<()> {
    let (sim, _factory, player, raw) = player_with_media()?;
    let surface = VideoSurface::new(
        |w, h| {
            let mut format = BufferFormat::new(Chroma::I420, w, h);
            format.pitches.truncate(1);
            format
        },
        |_: &VideoFrame<'_>| panic!("no frame may be displayed"),
    );
    player.set_video_surface(Some(surface.clone()))?;

    assert_eq!(sim.render_frame(raw, 64, 64, 0), RenderOutcome::FormatRejected);
    assert!(matches!(surface.negotiation_error(), Some(BindError::FormatNegotiation(_))));
    assert_eq!(surface.frames_displayed(), 0);
    Ok(())
}

#[test]
fn player_release_removes_the_surface() -> anyhow::Result<()> {
    let (sim, _factory, player, raw) = player_with_media()?;
    let surface = player.set_video_renderer(|_: &VideoFrame<'_>| {})?;
    assert!(sim.has_video_callbacks(raw));
    sim.render_frame(raw, 16, 16, 0);
    assert_eq!(surface.current_format().map(|f| f.chroma), Some(Chroma::Rv32));

    player.release();
    assert!(player.video_surface().is_none());
    assert!(surface.current_format().is_none());
    assert!(sim.is_freed(raw));
    assert!(sim.violations().is_empty());
    Ok(())
}

#[test]
fn replaced_surface_stays_alive_until_stop() -> anyhow::Result<()> {
    let (sim, _factory, player, raw) = player_with_media()?;
    let counting = Arc::new(Counts::default());
    let frames = Arc::new(AtomicUsize::new(0));
    let seen = frames.clone();
    player.set_video_surface(Some(VideoSurface::new(
        Counting(counting.clone()),
        move |_: &VideoFrame<'_>| {
            seen.fetch_add(1, Ordering::SeqCst);
        },
    )))?;
    player.play()?;
    assert_eq!(sim.render_frame(raw, 64, 32, 0), RenderOutcome::Displayed);

    player.set_video_renderer(|_: &VideoFrame<'_>| {})?;
    player.set_video_surface(None)?;
    assert!(!sim.has_video_callbacks(raw));
    assert!(sim.has_video_output(raw));
    assert_eq!(player.retired_surfaces(), 2);

    // The running output still draws into the first surface.
    assert_eq!(sim.render_frame(raw, 64, 32, 0), RenderOutcome::Displayed);
    assert_eq!(frames.load(Ordering::SeqCst), 2);
    assert_eq!(counting.cleaned.load(Ordering::SeqCst), 0);

    player.stop()?;
    assert_eq!(counting.cleaned.load(Ordering::SeqCst), 1);
    assert_eq!(player.retired_surfaces(), 0);
    assert!(!sim.has_video_output(raw));
    assert!(sim.violations().is_empty());
    Ok(())
}

#[test]
fn render_callback_can_remove_its_own_surface() -> anyhow::Result<()> {
    let (sim, _factory, player, raw) = player_with_media()?;
    let player = Arc::new(player);
    let counting = Arc::new(Counts::default());
    let owner = Arc::new(Mutex::new(Some(player.clone())));
    let hook = owner.clone();
    let surface = VideoSurface::new(Counting(counting.clone()), move |_: &VideoFrame<'_>| {
        if let Some(player) = hook.lock().take() {
            player.set_video_surface(None).expect("remove surface");
        }
    });
    player.set_video_surface(Some(surface.clone()))?;

    let raw_addr = raw.as_ptr() as usize;
    let (done_tx, done_rx) = mpsc::channel();
    let renderer = {
        let sim = sim.clone();
        thread::spawn(move || {
            let raw = RawPtr::new(raw_addr as *mut _).expect("non-null");
            done_tx.send(sim.render_frame(raw, 32, 16, 0)).ok();
        })
    };
    let outcome = done_rx
        .recv_timeout(Duration::from_secs(5))
        .context("render_frame never returned")?;
    renderer.join().expect("render thread");

    assert_eq!(outcome, RenderOutcome::Displayed);
    assert!(owner.lock().is_none());
    assert!(player.video_surface().is_none());
    assert!(surface.current_format().is_none());
    assert_eq!(counting.cleaned.load(Ordering::SeqCst), 1);
    Ok(())
}
