//! Integration tests for Yskra Core

use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use yskra_core::{
    AdapterConfig, Error, FrameHost, MediaControls, MemoryDom, MemoryFrameHost, MessageEnvelope,
    NodeId, OutboundMessage, PlayerJsFrame, TimeRange, WindowId,
};
use url::Url;

const SOURCE: &str = "https://player.example/embed/42?autoplay=1";

struct Harness {
    dom: Arc<MemoryDom>,
    host: Arc<MemoryFrameHost>,
    player: PlayerJsFrame<Arc<MemoryFrameHost>>,
    container: NodeId,
    siblings: (NodeId, NodeId),
    video: NodeId,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(AdapterConfig::default())
    }

    fn with_config(config: AdapterConfig) -> Self {
        let dom = Arc::new(MemoryDom::new());
        let container = dom.create_element(dom.root(), "div");
        let before = dom.create_element(container, "span");
        let video = dom.create_element(container, "video");
        let after = dom.create_element(container, "span");

        let host = Arc::new(MemoryFrameHost::new(Arc::clone(&dom), video));
        let player = PlayerJsFrame::new(Arc::clone(&host), config);

        Self {
            dom,
            host,
            player,
            container,
            siblings: (before, after),
            video,
        }
    }

    fn window(&self) -> WindowId {
        self.host.frame_window().expect("frame mounted")
    }

    /// Deliver a message from the frame's own window
    fn peer(&self, payload: Value) {
        self.player
            .handle_message(MessageEnvelope::new(self.window(), payload));
    }

    /// Wire messages posted since the last call
    fn sent(&self) -> Vec<Value> {
        self.host
            .take_sent()
            .iter()
            .map(|m| serde_json::to_value(m).unwrap())
            .collect()
    }

    /// Load the source and fire both readiness signals, answering nothing
    async fn ready(&self) {
        let (loaded, _) = tokio::join!(self.player.load(SOURCE), async {
            settle().await;
            self.player.notify_frame_loaded();
            self.peer(json!({"event": "inited"}));
        });
        loaded.unwrap();
        settle().await;
    }

    /// Ready, with the initial handshake answered and cleared
    async fn ready_with_qualities(&self, names: &[&str]) {
        self.ready().await;
        self.peer(json!({"event": "qualities", "answer": names}));
        settle().await;
        self.sent();
    }

    fn original_layout(&self) -> Vec<NodeId> {
        vec![self.siblings.0, self.video, self.siblings.1]
    }
}

/// Let spawned tasks run
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

// =============================================================================
// Construction & Teardown Tests
// =============================================================================

#[tokio::test]
async fn test_construction_swaps_element_for_frame() {
    let h = Harness::new();
    let frame = h.host.frame().unwrap();

    assert_eq!(
        h.dom.children(h.container),
        vec![h.siblings.0, frame, h.siblings.1]
    );
    assert!(!h.dom.is_attached(h.video));
    assert!(h.player.capability_error().is_none());
    assert!(!h.player.is_ready());
}

#[tokio::test]
async fn test_missing_messaging_degrades_without_failing() {
    let dom = Arc::new(MemoryDom::new());
    let video = dom.create_element(dom.root(), "video");
    let host = MemoryFrameHost::without_messaging(Arc::clone(&dom), video);
    let player = PlayerJsFrame::new(host, AdapterConfig::default());

    assert!(matches!(
        player.capability_error(),
        Some(Error::MessagingUnsupported)
    ));
    assert!(player.host().frame().is_some());
}

#[tokio::test]
async fn test_destroy_without_load_restores_position() {
    let h = Harness::new();
    let frame = h.host.frame().unwrap();

    h.player.destroy();

    assert_eq!(h.dom.children(h.container), h.original_layout());
    assert!(!h.dom.contains(frame));
    assert!(h.player.is_destroyed());
}

#[tokio::test]
async fn test_destroy_after_load_restores_position() {
    let h = Harness::new();
    h.ready().await;
    let frame = h.host.frame().unwrap();

    h.player.destroy();
    h.player.destroy();

    assert_eq!(h.dom.children(h.container), h.original_layout());
    assert!(!h.dom.contains(frame));
}

#[tokio::test]
async fn test_drop_restores_position() {
    let h = Harness::new();
    let Harness {
        dom,
        player,
        container,
        siblings,
        video,
        ..
    } = h;

    drop(player);
    assert_eq!(dom.children(container), vec![siblings.0, video, siblings.1]);
}

#[tokio::test]
async fn test_messages_ignored_after_destroy() {
    let h = Harness::new();
    h.ready().await;
    let window = h.window();

    h.player.destroy();
    h.player
        .handle_message(MessageEnvelope::new(window, json!({"event": "play"})));
    h.player.set_volume(0.2);

    assert!(!h.player.controls().playing);
    assert!(h.sent().iter().all(|m| m["api"] != "volume"));
}

// =============================================================================
// Load & Readiness Tests
// =============================================================================

#[tokio::test]
async fn test_load_configures_frame() {
    let h = Harness::new();
    h.ready().await;
    let frame = h.host.frame().unwrap();

    assert_eq!(h.dom.attribute(frame, "src").as_deref(), Some(SOURCE));
    assert_eq!(h.dom.attribute(frame, "frameborder").as_deref(), Some("0"));
    assert_eq!(
        h.dom.attribute(frame, "allow").as_deref(),
        Some("accelerometer; clipboard-write; encrypted-media; gyroscope; picture-in-picture; web-share")
    );
    assert!(h.player.is_ready());
}

#[tokio::test]
async fn test_load_rejects_malformed_url() {
    let h = Harness::new();

    let err = h.player.load("not a url").await.unwrap_err();
    assert!(matches!(err, Error::InvalidSource { .. }));

    let err = h.player.load("/embed/42").await.unwrap_err();
    assert_eq!(err.error_code(), "INVALID_SOURCE");

    let frame = h.host.frame().unwrap();
    assert_eq!(h.dom.attribute(frame, "src"), None);
}

#[tokio::test(start_paused = true)]
async fn test_load_waits_for_both_signals() {
    let h = Harness::new();
    let load = h.player.load(SOURCE);
    tokio::pin!(load);

    assert!(tokio::time::timeout(Duration::from_secs(60), &mut load).await.is_err());

    h.player.notify_frame_loaded();
    assert!(tokio::time::timeout(Duration::from_secs(60), &mut load).await.is_err());

    h.peer(json!({"event": "inited"}));
    load.await.unwrap();
}

#[tokio::test]
async fn test_signals_latch_before_load() {
    let h = Harness::new();
    h.player.notify_frame_loaded();
    h.peer(json!({"event": "inited"}));

    h.player.load(SOURCE).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_destroy_interrupts_load() {
    let h = Harness::new();
    let load = h.player.load(SOURCE);
    tokio::pin!(load);
    assert!(tokio::time::timeout(Duration::from_secs(1), &mut load).await.is_err());

    h.player.destroy();
    assert!(matches!(load.await, Err(Error::Destroyed)));
    assert!(matches!(h.player.load(SOURCE).await, Err(Error::Destroyed)));
}

#[tokio::test]
async fn test_handshake_hides_peer_ui_and_fetches_qualities() {
    let h = Harness::new();
    h.ready().await;

    assert_eq!(
        h.sent(),
        vec![
            json!({"api": "ui", "set": 0}),
            json!({"api": "showplaylist", "set": 0}),
            json!({"api": "qualities"}),
        ]
    );

    h.peer(json!({"event": "qualities", "answer": ["360p", "720p"]}));
    settle().await;

    let names: Vec<_> = h
        .player
        .controls()
        .qualities
        .into_iter()
        .map(|q| q.name)
        .collect();
    assert_eq!(names, vec!["360p", "720p"]);
}

#[tokio::test]
async fn test_handshake_can_leave_peer_ui_visible() {
    let h = Harness::with_config(AdapterConfig {
        hide_peer_ui: false,
        ..Default::default()
    });
    h.ready().await;

    assert_eq!(h.sent(), vec![json!({"api": "qualities"})]);
}

#[tokio::test]
async fn test_repeated_readiness_signals_are_ignored() {
    let h = Harness::new();
    h.ready_with_qualities(&["480p"]).await;

    h.player.notify_frame_loaded();
    h.peer(json!({"event": "inited"}));
    settle().await;

    assert!(h.sent().is_empty());
    assert_eq!(h.player.controls().qualities.len(), 1);
}

#[tokio::test]
async fn test_writes_before_ready_are_queued_and_coalesced() {
    let h = Harness::new();

    h.player.set_current_time(10.0);
    h.player.set_playing(true);
    h.player.set_current_time(20.0);
    h.player.set_volume(0.5);
    assert!(h.sent().is_empty());

    h.ready().await;

    assert_eq!(
        h.sent(),
        vec![
            json!({"api": "seek", "set": 20.0}),
            json!({"api": "play"}),
            json!({"api": "volume", "set": 0.5}),
            json!({"api": "ui", "set": 0}),
            json!({"api": "showplaylist", "set": 0}),
            json!({"api": "qualities"}),
        ]
    );
    let controls = h.player.controls();
    assert_eq!(controls.current_time, 20.0);
    assert!(controls.playing);
}

#[tokio::test]
async fn test_opposite_writes_before_ready_keep_latest() {
    let h = Harness::new();

    h.player.set_muted(true);
    h.player.set_playing(true);
    h.player.set_muted(false);
    h.player.set_playing(false);
    h.player.set_playing(true);

    h.player.notify_frame_loaded();
    h.peer(json!({"event": "inited"}));
    settle().await;

    let sent = h.sent();
    assert_eq!(sent[0], json!({"api": "unmute"}));
    assert_eq!(sent[1], json!({"api": "play"}));
}

// =============================================================================
// No-Echo Tests
// =============================================================================

struct EchoCase {
    name: &'static str,
    local: fn(&PlayerJsFrame<Arc<MemoryFrameHost>>),
    command: Value,
    echo: Value,
    remote: Value,
    check: fn(&MediaControls) -> bool,
}

fn echo_cases() -> Vec<EchoCase> {
    vec![
        EchoCase {
            name: "current_time",
            local: |p| p.set_current_time(42.0),
            command: json!({"api": "seek", "set": 42.0}),
            echo: json!({"event": "time", "data": 42.0}),
            remote: json!({"event": "time", "data": 50.5}),
            check: |c| c.current_time == 50.5,
        },
        EchoCase {
            name: "playing",
            local: |p| p.set_playing(true),
            command: json!({"api": "play"}),
            echo: json!({"event": "play"}),
            remote: json!({"event": "paused"}),
            check: |c| !c.playing,
        },
        EchoCase {
            name: "rate",
            local: |p| p.set_rate(1.5),
            command: json!({"api": "speed", "set": 1.5}),
            echo: json!({"event": "speed", "data": 1.5}),
            remote: json!({"event": "speed", "data": 2}),
            check: |c| c.rate == 2.0,
        },
        EchoCase {
            name: "volume",
            local: |p| p.set_volume(0.3),
            command: json!({"api": "volume", "set": 0.3}),
            echo: json!({"event": "volume", "data": "0.3"}),
            remote: json!({"event": "volume", "data": "0.8"}),
            check: |c| c.volume == 0.8,
        },
        EchoCase {
            name: "muted",
            local: |p| p.set_muted(true),
            command: json!({"api": "mute"}),
            echo: json!({"event": "mute"}),
            remote: json!({"event": "unmute"}),
            check: |c| !c.muted,
        },
        EchoCase {
            name: "loop",
            local: |p| p.set_looping(true),
            command: json!({"api": "loop", "set": 1}),
            echo: json!({"event": "loop", "data": 1}),
            remote: json!({"event": "loop", "data": 0}),
            check: |c| !c.looping,
        },
        EchoCase {
            name: "quality",
            local: |p| p.set_quality(Some(2)),
            command: json!({"api": "quality", "set": "1080p"}),
            echo: json!({"event": "quality", "data": "1080p"}),
            remote: json!({"event": "quality", "data": "360p"}),
            check: |c| c.quality == Some(0),
        },
    ]
}

#[tokio::test]
async fn test_no_echo_for_every_mirrored_field() {
    for case in echo_cases() {
        let h = Harness::new();
        h.ready_with_qualities(&["360p", "720p", "1080p"]).await;
        let mut changes = h.player.subscribe();
        changes.borrow_and_update();

        // local write: one command, one change
        (case.local)(&h.player);
        assert_eq!(h.sent(), vec![case.command.clone()], "{}: local write", case.name);
        assert!(changes.has_changed().unwrap(), "{}: local change", case.name);
        changes.borrow_and_update();

        // peer echoes the same state: nothing sent, nothing changed
        h.peer(case.echo.clone());
        assert!(h.sent().is_empty(), "{}: echo re-sent", case.name);
        assert!(!changes.has_changed().unwrap(), "{}: echo changed state", case.name);

        // peer changes the field: mirrored, never sent back
        h.peer(case.remote.clone());
        assert!(h.sent().is_empty(), "{}: remote write sent", case.name);
        assert!((case.check)(&h.player.controls()), "{}: remote value", case.name);
    }
}

#[tokio::test]
async fn test_unchanged_local_write_sends_nothing() {
    let h = Harness::new();
    h.ready_with_qualities(&[]).await;

    h.player.set_volume(1.0);
    h.player.set_rate(1.0);
    h.player.set_playing(false);

    assert!(h.sent().is_empty());
}

#[tokio::test]
async fn test_toggles_send_commands() {
    let h = Harness::new();
    h.ready_with_qualities(&[]).await;

    h.player.toggle_play();
    h.player.toggle_mute();
    h.player.toggle_play();

    assert_eq!(
        h.sent(),
        vec![json!({"api": "play"}), json!({"api": "mute"}), json!({"api": "pause"})]
    );
}

#[tokio::test]
async fn test_volume_is_clamped() {
    let h = Harness::new();
    h.ready_with_qualities(&[]).await;

    h.player.set_volume(0.0);
    h.player.set_volume(3.0);

    assert_eq!(
        h.sent(),
        vec![json!({"api": "volume", "set": 0.0}), json!({"api": "volume", "set": 1.0})]
    );
}

#[tokio::test]
async fn test_non_finite_local_writes_are_ignored() {
    let h = Harness::new();
    h.ready_with_qualities(&[]).await;
    let before = h.player.controls();

    h.player.set_volume(f64::NAN);
    h.player.set_volume(f64::NAN);
    h.player.set_current_time(f64::INFINITY);
    h.player.set_rate(f64::NEG_INFINITY);

    assert!(h.sent().is_empty());
    assert_eq!(h.player.controls(), before);

    h.peer(json!({"event": "volume", "data": "NaN"}));
    assert_eq!(h.player.controls().volume, 1.0);
}

#[tokio::test]
async fn test_quality_without_known_rendition_is_not_sent() {
    let h = Harness::new();
    h.ready_with_qualities(&["720p"]).await;

    h.player.set_quality(Some(4));
    assert!(h.sent().is_empty());
    assert_eq!(h.player.controls().quality, Some(4));

    h.peer(json!({"event": "quality", "data": "4K"}));
    assert_eq!(h.player.controls().quality, None);
    assert!(h.sent().is_empty());
}

// =============================================================================
// Loop Encoding Tests
// =============================================================================

#[tokio::test]
async fn test_loop_flag_encoding() {
    let h = Harness::new();
    h.ready_with_qualities(&[]).await;

    h.player.set_looping(true);
    h.player.set_looping(false);
    assert_eq!(
        h.sent(),
        vec![json!({"api": "loop", "set": 1}), json!({"api": "loop", "set": 0})]
    );

    h.peer(json!({"event": "loop", "data": 1}));
    assert!(h.player.controls().looping);
    h.peer(json!({"event": "loop", "data": 0}));
    assert!(!h.player.controls().looping);
    assert!(h.sent().is_empty());
}

// =============================================================================
// Event Ordering Tests
// =============================================================================

#[tokio::test]
async fn test_play_waiting_buffered_converge_in_any_order() {
    let orders = [
        ["play", "waiting", "buffered"],
        ["play", "buffered", "waiting"],
        ["waiting", "play", "buffered"],
        ["waiting", "buffered", "play"],
        ["buffered", "play", "waiting"],
        ["buffered", "waiting", "play"],
    ];

    for order in orders {
        let h = Harness::new();
        h.ready_with_qualities(&[]).await;
        h.peer(json!({"event": "end"}));
        assert!(h.player.controls().ended);

        for event in order {
            h.peer(json!({"event": event}));
        }

        let controls = h.player.controls();
        assert!(controls.playing, "{order:?}");
        assert!(!controls.ended, "{order:?}");
        assert_eq!(controls.waiting, order[2] == "waiting", "{order:?}");
        assert!(h.sent().is_empty(), "{order:?}");
    }
}

#[tokio::test]
async fn test_waiting_does_not_pause() {
    let h = Harness::new();
    h.ready_with_qualities(&[]).await;

    h.peer(json!({"event": "play"}));
    h.peer(json!({"event": "waiting"}));

    let controls = h.player.controls();
    assert!(controls.playing);
    assert!(controls.waiting);
}

#[tokio::test]
async fn test_duration_and_end_events() {
    let h = Harness::new();
    h.ready_with_qualities(&[]).await;

    h.peer(json!({"event": "duration", "data": 5400.25}));
    h.peer(json!({"event": "end"}));

    let controls = h.player.controls();
    assert_eq!(controls.duration, 5400.25);
    assert!(controls.ended);
}

// =============================================================================
// Filtering Tests
// =============================================================================

#[tokio::test]
async fn test_foreign_window_messages_are_ignored() {
    let h = Harness::new();
    h.ready_with_qualities(&[]).await;
    let foreign = WindowId(h.window().0 + 1000);

    h.player
        .handle_message(MessageEnvelope::new(foreign, json!({"event": "play"})));
    h.player.handle_message(MessageEnvelope {
        source: None,
        payload: Some(json!({"event": "time", "data": 99})),
    });

    assert_eq!(h.player.controls(), MediaControls::default());
}

#[tokio::test]
async fn test_foreign_reply_does_not_resolve_commands() {
    let h = Harness::with_config(AdapterConfig {
        command_timeout_ms: Some(50),
        ..Default::default()
    });
    h.ready_with_qualities(&[]).await;
    let foreign = WindowId(h.window().0 + 1000);

    let (answer, _) = tokio::join!(h.player.command_with_answer("buffered", None), async {
        settle().await;
        h.player.handle_message(MessageEnvelope::new(
            foreign,
            json!({"event": "buffered", "answer": 12}),
        ));
    });

    assert!(matches!(answer, Err(Error::CommandTimeout { .. })));
}

#[tokio::test]
async fn test_empty_and_unknown_messages_are_dropped() {
    let h = Harness::new();
    h.ready_with_qualities(&[]).await;
    let before = h.player.controls();

    h.player.handle_message(MessageEnvelope {
        source: Some(h.window()),
        payload: None,
    });
    h.peer(Value::Null);
    h.peer(json!("play"));
    h.peer(json!({"event": "fullscreen", "data": 1}));
    h.peer(json!({"event": "time"}));
    h.peer(json!({"event": "time", "data": "soon"}));
    h.peer(json!({"event": "audiotrack", "data": 1}));

    assert_eq!(h.player.controls(), before);
    assert!(h.sent().is_empty());
}

// =============================================================================
// Request/Response Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_replies_resolve_only_matching_command() {
    let h = Harness::new();
    h.ready_with_qualities(&[]).await;

    let qualities = h.player.command_with_answer("qualities", None);
    let buffered = h.player.command_with_answer("buffered", None);
    tokio::pin!(qualities, buffered);

    let wait = Duration::from_millis(100);
    assert!(tokio::time::timeout(wait, &mut qualities).await.is_err());
    assert!(tokio::time::timeout(wait, &mut buffered).await.is_err());
    assert_eq!(
        h.sent(),
        vec![json!({"api": "qualities"}), json!({"api": "buffered"})]
    );

    h.peer(json!({"event": "buffered", "answer": 33.5}));
    assert_eq!(buffered.await.unwrap(), json!(33.5));
    assert!(tokio::time::timeout(wait, &mut qualities).await.is_err());

    h.peer(json!({"event": "qualities", "answer": ["720p"]}));
    assert_eq!(qualities.await.unwrap(), json!(["720p"]));
}

#[tokio::test]
async fn test_pushed_event_without_answer_does_not_resolve() {
    let h = Harness::with_config(AdapterConfig {
        command_timeout_ms: Some(50),
        ..Default::default()
    });
    h.ready_with_qualities(&[]).await;

    let (answer, _) = tokio::join!(h.player.command_with_answer("buffered", None), async {
        settle().await;
        h.peer(json!({"event": "buffered"}));
    });

    assert!(matches!(answer, Err(Error::CommandTimeout { .. })));
}

#[tokio::test]
async fn test_raw_command_passthrough() {
    let h = Harness::new();
    h.ready_with_qualities(&[]).await;

    h.player.command("file", Some(json!("https://cdn.example/next.m3u8")));
    let (answer, _) = tokio::join!(
        h.player.command_with_answer("getplaylist", Some(json!(0))),
        async {
            settle().await;
            h.peer(json!({"event": "getplaylist", "answer": {"id": 7}}));
        }
    );

    assert_eq!(answer.unwrap(), json!({"id": 7}));
    assert_eq!(
        h.sent(),
        vec![
            json!({"api": "file", "set": "https://cdn.example/next.m3u8"}),
            json!({"api": "getplaylist", "set": 0}),
        ]
    );
}

#[tokio::test]
async fn test_raw_arguments_sent_unchanged() {
    let h = Harness::new();
    h.ready_with_qualities(&[]).await;

    h.player.command("loop", Some(json!("1")));
    h.player.command("ui", Some(json!(true)));
    h.player.command("seek", Some(json!("12")));
    h.player.command("play", Some(json!({"from": 3})));

    assert_eq!(
        h.sent(),
        vec![
            json!({"api": "loop", "set": "1"}),
            json!({"api": "ui", "set": true}),
            json!({"api": "seek", "set": "12"}),
            json!({"api": "play", "set": {"from": 3}}),
        ]
    );
    assert!(!h.player.controls().looping);
}

#[tokio::test(start_paused = true)]
async fn test_null_answer_resolves() {
    let h = Harness::new();
    h.ready_with_qualities(&[]).await;

    let answer = h.player.command_with_answer("getplaylist", None);
    tokio::pin!(answer);
    assert!(tokio::time::timeout(Duration::from_millis(100), &mut answer).await.is_err());

    h.peer(json!({"event": "getplaylist", "answer": null}));
    let answer = tokio::time::timeout(Duration::from_secs(60), answer)
        .await
        .expect("null answer resolves the command");
    assert_eq!(answer.unwrap(), Value::Null);
}

#[tokio::test(start_paused = true)]
async fn test_destroy_cancels_pending_commands() {
    let h = Harness::new();
    h.ready_with_qualities(&[]).await;

    let pending = h.player.command_with_answer("buffered", None);
    tokio::pin!(pending);
    assert!(tokio::time::timeout(Duration::from_secs(1), &mut pending).await.is_err());

    h.player.destroy();
    assert!(matches!(
        pending.await,
        Err(Error::CommandCancelled { ref command }) if command == "buffered"
    ));
    assert!(matches!(
        h.player.command_with_answer("buffered", None).await,
        Err(Error::Destroyed)
    ));
}

// =============================================================================
// Buffered Polling Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_buffered_polled_after_position_settles() {
    let h = Harness::new();
    h.ready_with_qualities(&[]).await;

    h.peer(json!({"event": "time", "data": 1.0}));
    tokio::time::sleep(Duration::from_millis(400)).await;
    h.peer(json!({"event": "time", "data": 2.0}));
    tokio::time::sleep(Duration::from_millis(400)).await;
    h.peer(json!({"event": "time", "data": 3.0}));
    tokio::time::sleep(Duration::from_millis(900)).await;
    assert!(h.sent().is_empty());

    tokio::time::sleep(Duration::from_millis(200)).await;
    settle().await;
    assert_eq!(h.sent(), vec![json!({"api": "buffered"})]);

    h.peer(json!({"event": "buffered", "answer": 48.0}));
    settle().await;

    let controls = h.player.controls();
    assert_eq!(controls.buffered, vec![TimeRange::new(0.0, 48.0)]);
    assert_eq!(h.player.end_buffer(), 48.0);
}

#[tokio::test(start_paused = true)]
async fn test_local_seek_also_polls_buffered() {
    let h = Harness::new();
    h.ready_with_qualities(&[]).await;

    h.player.set_current_time(120.0);
    assert_eq!(h.sent(), vec![json!({"api": "seek", "set": 120.0})]);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    settle().await;
    assert_eq!(h.sent(), vec![json!({"api": "buffered"})]);
}

// =============================================================================
// Error Hook Tests
// =============================================================================

#[tokio::test]
async fn test_playback_error_hook() {
    let h = Harness::new();
    h.ready_with_qualities(&[]).await;
    let messages = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&messages);
    let handle = h.player.on_playback_error(move |err| {
        sink.lock().unwrap().push(err.message.clone());
    });

    h.peer(json!({"event": "error", "data": "manifest 404"}));
    handle.off();
    h.peer(json!({"event": "error", "data": "again"}));

    assert_eq!(*messages.lock().unwrap(), vec!["manifest 404".to_string()]);
}

#[tokio::test]
async fn test_source_error_hook_carries_url() {
    let h = Harness::new();
    let urls = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(AtomicUsize::new(0));

    let sink = Arc::clone(&urls);
    let counter = Arc::clone(&calls);
    let _handle = h.player.on_source_error(move |err| {
        counter.fetch_add(1, Ordering::SeqCst);
        sink.lock().unwrap().push(err.url.as_ref().map(|u| u.to_string()));
    });

    h.ready().await;
    h.player.notify_source_error("frame failed to load");

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(*urls.lock().unwrap(), vec![Some(SOURCE.to_string())]);
}

// =============================================================================
// Synchronous Host Tests
// =============================================================================

type PeerFn = Box<dyn Fn(&OutboundMessage) + Send + Sync>;

/// Host whose peer reacts from inside `post_to_frame`
struct AnsweringHost {
    frame: MemoryFrameHost,
    peer: OnceLock<PeerFn>,
}

impl FrameHost for AnsweringHost {
    fn supports_messaging(&self) -> bool {
        self.frame.supports_messaging()
    }

    fn mount_frame(&self) -> yskra_core::Result<()> {
        self.frame.mount_frame()
    }

    fn set_frame_attribute(&self, name: &str, value: &str) -> yskra_core::Result<()> {
        self.frame.set_frame_attribute(name, value)
    }

    fn navigate_frame(&self, url: &Url) -> yskra_core::Result<()> {
        self.frame.navigate_frame(url)
    }

    fn post_to_frame(&self, message: &OutboundMessage) -> yskra_core::Result<()> {
        self.frame.post_to_frame(message)?;
        if let Some(peer) = self.peer.get() {
            peer(message);
        }
        Ok(())
    }

    fn frame_window(&self) -> Option<WindowId> {
        self.frame.frame_window()
    }

    fn unmount_frame(&self) -> yskra_core::Result<()> {
        self.frame.unmount_frame()
    }
}

#[tokio::test]
async fn test_host_may_answer_inside_post() {
    let dom = Arc::new(MemoryDom::new());
    let video = dom.create_element(dom.root(), "video");
    let host = Arc::new(AnsweringHost {
        frame: MemoryFrameHost::new(dom, video),
        peer: OnceLock::new(),
    });
    let player = Arc::new(PlayerJsFrame::new(Arc::clone(&host), AdapterConfig::default()));
    let window = host.frame_window().unwrap();

    // a failed seek is reported synchronously and the UI toggles playback
    let weak = Arc::downgrade(&player);
    let _ = host.peer.set(Box::new(move |message| {
        if message.api != "seek" {
            return;
        }
        if let Some(player) = weak.upgrade() {
            player.handle_message(MessageEnvelope::new(
                window,
                json!({"event": "error", "data": "seek failed"}),
            ));
        }
    }));
    let weak = Arc::downgrade(&player);
    let _handle = player.on_playback_error(move |_| {
        if let Some(player) = weak.upgrade() {
            player.toggle_play();
        }
    });

    // queued before readiness, so the seek goes out during the flush
    player.set_playing(true);
    player.set_current_time(5.0);
    player.notify_frame_loaded();
    player.handle_message(MessageEnvelope::new(window, json!({"event": "inited"})));
    settle().await;

    player.set_current_time(9.0);
    settle().await;

    let apis: Vec<String> = host.frame.take_sent().into_iter().map(|m| m.api).collect();
    assert_eq!(
        apis,
        vec!["play", "seek", "ui", "showplaylist", "pause", "qualities", "seek", "play"]
    );
    assert!(player.controls().playing);
}

// =============================================================================
// Unsupported Feature Tests
// =============================================================================

#[tokio::test]
async fn test_unsupported_features_are_inert() {
    let h = Harness::new();
    h.ready_with_qualities(&[]).await;
    let before = h.player.controls();

    assert!(!h.player.supports_picture_in_picture());
    h.player.toggle_picture_in_picture().await.unwrap();
    h.player.enable_track(0);
    h.player.disable_track(None);

    let after = h.player.controls();
    assert_eq!(after, before);
    assert!(!after.is_picture_in_picture);
    assert!(after.tracks.is_empty());
    assert!(h.sent().is_empty());
}
