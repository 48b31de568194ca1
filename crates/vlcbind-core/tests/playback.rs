use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use parking_lot::{Condvar, Mutex};
use vlcbind_core::{
    BindingConfig, BridgeState, EventBridge, EventCategory, EventRecord, EventSink, HandleKind,
    HoldPolicy, MediaPlayer, MediaPlayerFactory, NativeHandle, ReleaseOutcome, SourceId,
};
use vlcbind_native::ffi::event_type as ev;
use vlcbind_native::sim::{Payload, SimulatedNative};
use vlcbind_native::{NativeApi, RawPtr};

const WAIT: Duration = Duration::from_secs(5);

struct Fixture {
    sim: Arc<SimulatedNative>,
    factory: MediaPlayerFactory,
}

impl Fixture {
    fn new() -> anyhow::Result<Self> {
        let sim = Arc::new(SimulatedNative::new());
        let factory = MediaPlayerFactory::new(sim.clone(), &BindingConfig::default())?;
        Ok(Self { sim, factory })
    }

    fn playing(&self, mrl: &str) -> anyhow::Result<(MediaPlayer, RawPtr)> {
        let media = self.factory.new_media(mrl)?;
        let player = self.factory.new_player()?;
        player.set_media(Some(&media))?;
        let raw = player.handle().with_ptr(|p| p)?;
        Ok((player, raw))
    }
}

#[test]
fn end_of_media_is_delivered_once_and_release_silences_the_player() -> anyhow::Result<()> {
    let fx = Fixture::new()?;
    let (player, raw) = fx.playing("file:///clips/short.mkv")?;
    // Second native reference keeps the object alive after the wrapper goes.
    let extra = player.handle().share()?;

    let ended = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::channel();
    let counter = ended.clone();
    let _sub = player.subscribe(move |event| {
        if matches!(event.record, EventRecord::MediaEnded) {
            counter.fetch_add(1, Ordering::SeqCst);
            tx.send(event.seq).ok();
        }
    })?;

    player.play()?;
    fx.sim.finish_playback(raw);
    rx.recv_timeout(WAIT).context("no end-of-media event")?;

    assert_eq!(player.release(), ReleaseOutcome::Released);
    assert!(!fx.sim.is_freed(raw));
    assert_eq!(fx.sim.registered_callbacks(raw), 0);

    fx.sim.fire_raw(raw, ev::MEDIA_PLAYER_END_REACHED, Payload::None);
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    assert_eq!(ended.load(Ordering::SeqCst), 1);

    extra.release();
    assert!(fx.sim.is_freed(raw));
    assert!(fx.sim.violations().is_empty());
    Ok(())
}

#[test]
fn events_of_one_source_arrive_in_order() -> anyhow::Result<()> {
    let fx = Fixture::new()?;
    let (player, raw) = fx.playing("file:///clips/long.mkv")?;
    let (tx, rx) = mpsc::channel();
    let _sub = player.subscribe(move |event| {
        if let EventRecord::TimeChanged(t) = event.record {
            tx.send((event.seq, t)).ok();
        }
    })?;

    let emitter = {
        let sim = fx.sim.clone();
        let raw_addr = raw.as_ptr() as usize;
        thread::spawn(move || {
            let raw = RawPtr::new(raw_addr as *mut _).expect("non-null");
            for t in 1..=300 {
                sim.fire_raw(raw, ev::MEDIA_PLAYER_TIME_CHANGED, Payload::Time(t));
            }
        })
    };
    emitter.join().expect("emitter thread");

    let mut last = (0, 0);
    for expected in 1..=300 {
        let (seq, t) = rx.recv_timeout(WAIT).context("missing time event")?;
        assert_eq!(t, expected);
        assert!(expected == 1 || seq > last.0);
        last = (seq, t);
    }
    Ok(())
}

#[test]
fn late_subscriber_sees_only_later_events() -> anyhow::Result<()> {
    let fx = Fixture::new()?;
    let (player, raw) = fx.playing("file:///clips/a.ogg")?;

    let (early_tx, early_rx) = mpsc::channel();
    let _early = player.subscribe(move |e| {
        early_tx.send(e.record.name()).ok();
    })?;
    fx.sim.fire_raw(raw, ev::MEDIA_PLAYER_BUFFERING, Payload::Float(50.0));

    let (late_tx, late_rx) = mpsc::channel();
    let _late = player.subscribe(move |e| {
        late_tx.send(e.record.name()).ok();
    })?;
    fx.sim.fire_raw(raw, ev::MEDIA_PLAYER_PLAYING, Payload::None);

    assert_eq!(early_rx.recv_timeout(WAIT)?, "buffering");
    assert_eq!(early_rx.recv_timeout(WAIT)?, "playing");
    assert_eq!(late_rx.recv_timeout(WAIT)?, "playing");
    assert!(late_rx.recv_timeout(Duration::from_millis(100)).is_err());
    Ok(())
}

#[test]
fn panicking_listener_does_not_stop_delivery() -> anyhow::Result<()> {
    let fx = Fixture::new()?;
    let (player, raw) = fx.playing("file:///clips/b.ogg")?;
    let _bad = player.subscribe(|e| {
        if matches!(e.record, EventRecord::Paused) {
            panic!("listener bug");
        }
    })?;
    let (tx, rx) = mpsc::channel();
    let _good = player.subscribe(move |e| {
        tx.send(e.record.name()).ok();
    })?;

    fx.sim.fire_raw(raw, ev::MEDIA_PLAYER_PAUSED, Payload::None);
    fx.sim.fire_raw(raw, ev::MEDIA_PLAYER_STOPPED, Payload::None);
    assert_eq!(rx.recv_timeout(WAIT)?, "paused");
    assert_eq!(rx.recv_timeout(WAIT)?, "stopped");
    assert!(fx.factory.dispatch_stats().listener_failures >= 1);
    Ok(())
}

#[test]
fn every_object_releases_exactly_once() -> anyhow::Result<()> {
    let fx = Fixture::new()?;
    let media = fx.factory.new_media("file:///clips/c.wav")?;
    let player = fx.factory.new_player()?;
    let list = fx.factory.new_media_list()?;
    let raws = [
        media.handle().with_ptr(|p| p)?,
        player.handle().with_ptr(|p| p)?,
        list.handle().with_ptr(|p| p)?,
    ];

    for _ in 0..2 {
        media.release();
        player.release();
        list.release();
    }
    drop((media, player, list));

    for raw in raws {
        assert!(fx.sim.is_freed(raw));
        assert_eq!(fx.sim.release_calls(raw), 1);
    }
    assert_eq!(fx.factory.release(), ReleaseOutcome::Released);
    assert_eq!(fx.factory.release(), ReleaseOutcome::AlreadyReleased);
    assert!(fx.sim.violations().is_empty());
    Ok(())
}

/// Sink that parks the native thread inside the callback until opened.
#[derive(Default)]
struct Gate {
    /// (callback entered, gate open)
    state: Mutex<(bool, bool)>,
    changed: Condvar,
}

impl Gate {
    fn wait_entered(&self) {
        let mut state = self.state.lock();
        while !state.0 {
            self.changed.wait(&mut state);
        }
    }

    fn open(&self) {
        self.state.lock().1 = true;
        self.changed.notify_all();
    }
}

impl EventSink for Gate {
    fn enqueue(&self, _source: SourceId, _record: EventRecord) {
        let mut state = self.state.lock();
        state.0 = true;
        self.changed.notify_all();
        while !state.1 {
            self.changed.wait(&mut state);
        }
    }
}

#[test]
fn detach_waits_for_in_flight_callback() -> anyhow::Result<()> {
    let sim = Arc::new(SimulatedNative::new());
    let api: Arc<dyn NativeApi> = sim.clone();
    let instance = api.new_instance(&[]).context("instance")?;
    let raw = unsafe { api.player_new(instance) };
    let handle = Arc::new(NativeHandle::adopt(api, HandleKind::Player, raw, "libvlc_media_player_new")?);
    let raw = handle.with_ptr(|p| p)?;

    let gate = Arc::new(Gate::default());
    let bridge = Arc::new(EventBridge::new(
        handle,
        EventCategory::Player,
        gate.clone(),
        HoldPolicy::Transient,
    )?);
    bridge.attach()?;

    let raw_addr = raw.as_ptr() as usize;
    let native = {
        let sim = sim.clone();
        thread::spawn(move || {
            let raw = RawPtr::new(raw_addr as *mut _).expect("non-null");
            sim.fire_raw(raw, ev::MEDIA_PLAYER_PLAYING, Payload::None);
        })
    };
    gate.wait_entered();
    assert_eq!(bridge.in_flight(), 1);

    let (done_tx, done_rx) = mpsc::channel();
    let detacher = {
        let bridge = bridge.clone();
        thread::spawn(move || {
            let outcome = bridge.detach();
            done_tx.send(()).ok();
            outcome
        })
    };
    assert!(done_rx.recv_timeout(Duration::from_millis(200)).is_err());

    gate.open();
    done_rx.recv_timeout(WAIT).context("detach never returned")?;
    detacher.join().expect("detacher thread")?;
    native.join().expect("native thread");

    assert_eq!(bridge.state(), BridgeState::Detached);
    assert_eq!(bridge.in_flight(), 0);
    assert_eq!(sim.registered_callbacks(raw), 0);
    Ok(())
}
