//! Integration tests for the playback state machine
//!
//! Every test drives the controller synchronously against a passive
//! simulated engine: callbacks are injected by hand, so each test controls
//! exactly which engine events happen and in what order.

mod helpers;

use cadence_common::events::{IcyHeaders, IcyInfo, PlayerEvent, ProcessingState};
use cadence_player::effects::{EffectDescriptor, EffectKind};
use cadence_player::engine::simulated::EngineCall;
use cadence_player::engine::{
    AudioAttributes, DiscontinuityReason, EngineError, EngineEvent, EngineState, MetadataEntry,
};
use cadence_player::error::ERROR_ABORT;
use cadence_player::playback::{CommandResponse, PlayerCommand};
use cadence_player::PlayerError;
use helpers::{load, progressive, settled, silence, Harness, SESSION_ID};
use tokio::sync::mpsc::error::TryRecvError;

// ============================================================================
// Load
// ============================================================================

#[test]
fn test_load_resolves_with_duration_in_ms_on_ready() {
    let mut h = Harness::new();
    h.engine.set_duration_us(Some(5_000_000));

    let mut result = h.command(load(vec![progressive("a")], Some(0)));
    assert!(settled(&mut result).is_none());
    assert_eq!(h.controller.processing_state(), ProcessingState::Loading);
    assert_eq!(h.controller.current_index(), Some(0));

    h.engine_state(EngineState::Ready);

    assert_eq!(
        settled(&mut result).unwrap().unwrap(),
        CommandResponse::Loaded { duration_ms: Some(5000) }
    );
    let snapshot = h.last_snapshot().unwrap();
    assert_eq!(snapshot.processing_state, ProcessingState::Ready);
    assert_eq!(snapshot.duration_us, Some(5_000_000));
    assert_eq!(snapshot.current_index, Some(0));
}

#[test]
fn test_load_reports_unset_duration_as_none() {
    let mut h = Harness::new();
    h.engine.set_duration_us(None);

    let result = h.load_ready(vec![progressive("live")]).unwrap();
    assert_eq!(result, CommandResponse::Loaded { duration_ms: None });
}

#[test]
fn test_load_issues_sources_order_and_prepare() {
    let mut h = Harness::new();
    let _pending = h.command(PlayerCommand::Load {
        audio_source: serde_json::json!({
            "id": "root",
            "type": "concatenating",
            "children": [progressive("a"), progressive("b"), progressive("c")],
            "shuffleOrder": [2, 0, 1]
        }),
        initial_position_us: Some(1_500_000),
        initial_index: Some(1),
    });

    assert_eq!(
        h.engine.calls(),
        vec![
            EngineCall::Configure,
            EngineCall::SetMediaSources {
                ids: vec!["a".to_string(), "b".to_string(), "c".to_string()],
                start_index: 1,
                start_position_us: Some(1_500_000),
                lazy_preparation: true,
            },
            EngineCall::SetShuffleOrder(vec![2, 0, 1]),
            EngineCall::Prepare,
        ]
    );
    assert_eq!(h.controller.current_index(), Some(1));
}

#[test]
fn test_playlist_lazy_preparation_reaches_the_engine() {
    let mut h = Harness::new();
    let lazy_flags = |h: &Harness| -> Vec<bool> {
        h.engine
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::SetMediaSources { lazy_preparation, .. } => Some(lazy_preparation),
                _ => None,
            })
            .collect()
    };

    let _eager = h.command(PlayerCommand::Load {
        audio_source: serde_json::json!({
            "id": "root",
            "type": "concatenating",
            "useLazyPreparation": false,
            "children": [progressive("a")]
        }),
        initial_position_us: None,
        initial_index: None,
    });
    // Unset falls back to the configured default
    let _default = h.command(load(vec![progressive("b")], None));
    assert_eq!(lazy_flags(&h), vec![false, true]);

    let result = h.run(PlayerCommand::Load {
        audio_source: serde_json::json!({
            "id": "root",
            "type": "concatenating",
            "useLazyPreparation": "yes",
            "children": []
        }),
        initial_position_us: None,
        initial_index: None,
    });
    assert!(matches!(result, Err(PlayerError::InvalidCommandArgument(_))));
}

#[test]
fn test_newer_load_aborts_pending_one() {
    let mut h = Harness::new();

    let mut first = h.command(load(vec![progressive("a")], None));
    let mut second = h.command(load(vec![progressive("b")], None));

    assert_eq!(settled(&mut first).unwrap(), Err(PlayerError::AbortedConnection));
    assert!(settled(&mut second).is_none());
    assert_eq!(h.engine.count_calls(|c| matches!(c, EngineCall::Stop)), 1);

    let events = h.drain();
    assert!(events
        .iter()
        .any(|e| matches!(e, PlayerEvent::PlaybackError { code, .. } if *code == ERROR_ABORT)));

    h.engine_state(EngineState::Ready);
    assert!(matches!(settled(&mut second).unwrap(), Ok(CommandResponse::Loaded { .. })));
    // The abort is not latched past the newer load
    assert_eq!(h.last_snapshot().unwrap().error_code, None);
}

#[test]
fn test_load_after_ready_stops_without_abort() {
    let mut h = Harness::new();
    h.load_ready(vec![progressive("a")]).unwrap();
    h.drain();

    let _second = h.command(load(vec![progressive("b")], None));

    assert_eq!(h.engine.count_calls(|c| matches!(c, EngineCall::Stop)), 1);
    assert!(!h.drain().iter().any(|e| matches!(e, PlayerEvent::PlaybackError { .. })));
    assert_eq!(h.controller.processing_state(), ProcessingState::Loading);
}

#[test]
fn test_invalid_load_leaves_state_untouched() {
    let mut h = Harness::new();
    h.load_ready(vec![progressive("a")]).unwrap();
    h.engine.clear_calls();

    let err = h
        .run(load(vec![serde_json::json!({"id": "x", "type": "midi", "uri": "x.mid"})], None))
        .unwrap_err();
    assert_eq!(err, PlayerError::UnsupportedSourceType("midi".to_string()));

    let err = h.run(load(vec![progressive("a")], Some(4))).unwrap_err();
    assert!(matches!(err, PlayerError::InvalidCommandArgument(_)));

    assert_eq!(h.controller.processing_state(), ProcessingState::Ready);
    assert!(h.engine.calls().is_empty());
}

#[test]
fn test_empty_playlist_completes_and_settles_load() {
    let mut h = Harness::new();
    let mut result = h.command(load(vec![], None));

    h.engine_state(EngineState::Ended);

    assert!(matches!(settled(&mut result).unwrap(), Ok(CommandResponse::Loaded { .. })));
    assert_eq!(h.controller.processing_state(), ProcessingState::Completed);
}

// ============================================================================
// Play / pause
// ============================================================================

#[test]
fn test_play_settles_on_pause() {
    let mut h = Harness::new();
    h.load_ready(vec![progressive("a")]).unwrap();

    let mut play = h.command(PlayerCommand::Play);
    assert!(settled(&mut play).is_none());

    h.run(PlayerCommand::Pause).unwrap();
    assert_eq!(settled(&mut play).unwrap(), Ok(CommandResponse::empty()));
}

#[test]
fn test_pause_play_pause_leaves_one_pending_play_at_most() {
    let mut h = Harness::new();
    h.load_ready(vec![progressive("a")]).unwrap();

    h.run(PlayerCommand::Pause).unwrap();
    let mut first = h.command(PlayerCommand::Play);
    // Already playing: settles at once and does not replace the pending one
    let mut second = h.command(PlayerCommand::Play);
    assert_eq!(settled(&mut second).unwrap(), Ok(CommandResponse::empty()));
    assert!(settled(&mut first).is_none());

    h.run(PlayerCommand::Pause).unwrap();
    assert_eq!(settled(&mut first).unwrap(), Ok(CommandResponse::empty()));
    assert_eq!(h.engine.count_calls(|c| *c == EngineCall::SetPlayWhenReady(true)), 1);
}

#[test]
fn test_pause_when_paused_is_a_noop() {
    let mut h = Harness::new();
    h.load_ready(vec![progressive("a")]).unwrap();
    h.drain();

    h.run(PlayerCommand::Pause).unwrap();

    assert_eq!(h.engine.count_calls(|c| matches!(c, EngineCall::SetPlayWhenReady(_))), 0);
    assert!(h.drain().is_empty());
}

#[test]
fn test_play_at_end_of_media_settles_immediately() {
    let mut h = Harness::new();
    let _load = h.command(load(vec![], None));
    h.engine_state(EngineState::Ended);

    let mut play = h.command(PlayerCommand::Play);
    assert_eq!(settled(&mut play).unwrap(), Ok(CommandResponse::empty()));
}

#[test]
fn test_ended_settles_pending_play() {
    let mut h = Harness::new();
    h.load_ready(vec![progressive("a")]).unwrap();
    let mut play = h.command(PlayerCommand::Play);

    h.engine_state(EngineState::Ended);

    assert_eq!(settled(&mut play).unwrap(), Ok(CommandResponse::empty()));
    assert_eq!(h.controller.processing_state(), ProcessingState::Completed);
}

#[test]
fn test_repeated_ended_broadcasts_once() {
    let mut h = Harness::new();
    h.load_ready(vec![progressive("a")]).unwrap();
    h.engine_state(EngineState::Ended);
    h.drain();

    h.engine_state(EngineState::Ended);
    assert!(h.drain().is_empty());
}

// ============================================================================
// Seek
// ============================================================================

#[test]
fn test_second_seek_supersedes_first_as_success() {
    let mut h = Harness::new();
    h.load_ready(vec![progressive("a")]).unwrap();

    let mut first = h.command(PlayerCommand::Seek { position_us: Some(1_000_000), index: None });
    let mut second = h.command(PlayerCommand::Seek { position_us: Some(3_000_000), index: None });

    assert_eq!(settled(&mut first).unwrap(), Ok(CommandResponse::empty()));
    assert!(settled(&mut second).is_none());

    h.engine_event(EngineEvent::PositionDiscontinuity { reason: DiscontinuityReason::Seek });
    h.engine_state(EngineState::Buffering);
    h.engine_state(EngineState::Ready);

    assert_eq!(settled(&mut second).unwrap(), Ok(CommandResponse::empty()));
    assert_eq!(h.last_snapshot().unwrap().update_position_us, 3_000_000);
    assert_eq!(
        h.engine.count_calls(|c| matches!(c, EngineCall::SeekTo { index: 0, .. })),
        2
    );
}

#[test]
fn test_seek_while_idle_is_immediate_success() {
    let mut h = Harness::new();
    let result = h.run(PlayerCommand::Seek { position_us: Some(1), index: None });

    assert_eq!(result, Ok(CommandResponse::empty()));
    assert_eq!(h.engine.count_calls(|c| matches!(c, EngineCall::SeekTo { .. })), 0);
}

#[test]
fn test_rejected_seek_fails_the_caller() {
    let mut h = Harness::new();
    h.load_ready(vec![progressive("a")]).unwrap();
    h.engine.reject_seeks(true);

    let err = h.run(PlayerCommand::Seek { position_us: Some(0), index: Some(9) }).unwrap_err();

    assert!(matches!(err, PlayerError::IllegalState(_)));
    assert_eq!(h.controller.processing_state(), ProcessingState::Ready);
}

#[test]
fn test_seek_to_other_item_updates_index_on_discontinuity() {
    let mut h = Harness::new();
    h.load_ready(vec![progressive("a"), progressive("b")]).unwrap();

    let _seek = h.command(PlayerCommand::Seek { position_us: None, index: Some(1) });
    h.engine_event(EngineEvent::PositionDiscontinuity { reason: DiscontinuityReason::Seek });

    assert_eq!(h.controller.current_index(), Some(1));
}

#[test]
fn test_only_transition_and_seek_discontinuities_move_index() {
    let mut h = Harness::new();
    h.load_ready(vec![progressive("a"), progressive("b")]).unwrap();

    h.engine.set_current_index(1);
    h.engine_event(EngineEvent::PositionDiscontinuity { reason: DiscontinuityReason::SeekAdjustment });
    assert_eq!(h.controller.current_index(), Some(0));

    h.engine_event(EngineEvent::PositionDiscontinuity { reason: DiscontinuityReason::AutoTransition });
    assert_eq!(h.controller.current_index(), Some(1));
}

// ============================================================================
// Snapshots and position
// ============================================================================

#[test]
fn test_buffered_position_never_below_update_position() {
    let mut h = Harness::new();
    h.load_ready(vec![progressive("a")]).unwrap();

    h.engine.set_position_us(10_000_000);
    h.engine.set_buffered_position_us(2_000_000);
    h.engine_event(EngineEvent::PositionDiscontinuity { reason: DiscontinuityReason::Internal });

    h.engine.set_buffered_position_us(30_000_000);
    h.controller.poll_buffered_position();

    let snapshots = h.snapshots();
    assert!(!snapshots.is_empty());
    for snapshot in &snapshots {
        assert!(snapshot.buffered_position_us >= snapshot.update_position_us);
    }
    assert_eq!(snapshots.last().unwrap().buffered_position_us, 30_000_000);
}

#[test]
fn test_buffer_poll_broadcasts_only_on_change() {
    let mut h = Harness::new();
    h.load_ready(vec![progressive("a")]).unwrap();
    assert!(h.controller.take_buffer_watch_request());
    h.drain();

    let delay = h.controller.poll_buffered_position();
    assert_eq!(delay, Some(std::time::Duration::from_millis(1000)));
    assert!(h.drain().is_empty());

    h.engine.set_buffered_position_us(4_000_000);
    h.controller.poll_buffered_position();
    assert_eq!(h.snapshots().len(), 1);
}

#[test]
fn test_buffering_while_ready_broadcasts_once() {
    let mut h = Harness::new();
    h.load_ready(vec![progressive("a")]).unwrap();
    h.drain();

    h.engine_state(EngineState::Buffering);
    h.engine_state(EngineState::Buffering);

    let snapshots = h.snapshots();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].processing_state, ProcessingState::Buffering);
}

#[test]
fn test_stall_detector_resamples_stuck_render_clock() {
    let mut h = Harness::new();
    h.load_ready(vec![progressive("a")]).unwrap();
    h.run(PlayerCommand::Pause).unwrap();
    let _play = h.command(PlayerCommand::Play);
    assert!(h.controller.stall_observing());

    h.engine.set_render_position_us(Some(700_000));
    h.engine.set_position_us(700_000);
    h.drain();

    // First sample primes the detector, the next three are unchanged
    for _ in 0..4 {
        h.controller.stall_tick();
    }

    let snapshots = h.snapshots();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].update_position_us, 700_000);
}

#[test]
fn test_set_speed_same_value_is_idempotent() {
    let mut h = Harness::new();
    h.load_ready(vec![progressive("a")]).unwrap();

    h.run(PlayerCommand::SetSpeed(1.5)).unwrap();
    h.drain();
    h.run(PlayerCommand::SetSpeed(1.5)).unwrap();

    assert_eq!(h.engine.count_calls(|c| matches!(c, EngineCall::SetPlaybackParameters(_))), 1);
    assert!(h.drain().is_empty());

    h.run(PlayerCommand::SetPitch(1.0)).unwrap();
    assert_eq!(h.engine.count_calls(|c| matches!(c, EngineCall::SetPlaybackParameters(_))), 1);
}

#[test]
fn test_direct_engine_setters() {
    let mut h = Harness::new();

    h.run(PlayerCommand::SetVolume(0.5)).unwrap();
    h.run(PlayerCommand::SetSkipSilence(true)).unwrap();
    h.run(PlayerCommand::SetShuffleModeEnabled(true)).unwrap();

    let calls = h.engine.calls();
    assert!(calls.contains(&EngineCall::SetVolume(0.5)));
    assert!(calls.contains(&EngineCall::SetSkipSilence(true)));
    assert!(calls.contains(&EngineCall::SetShuffleMode(true)));
}

#[test]
fn test_accepted_noop_commands() {
    let mut h = Harness::new();
    h.engine.clear_calls();

    for command in [
        PlayerCommand::SetAutomaticallyWaitsToMinimizeStalling(true),
        PlayerCommand::SetCanUseNetworkResourcesForLiveStreamingWhilePaused(false),
        PlayerCommand::SetPreferredPeakBitRate(320_000.0),
    ] {
        assert_eq!(h.run(command), Ok(CommandResponse::empty()));
    }
    assert!(h.engine.calls().is_empty());
    assert!(h.drain().is_empty());
}

// ============================================================================
// Audio attributes
// ============================================================================

#[test]
fn test_attributes_deferred_while_loading_and_applied_once() {
    let mut h = Harness::new();
    let attributes = AudioAttributes { content_type: 2, flags: 0, usage: 1 };

    let _load = h.command(load(vec![progressive("a")], None));
    h.run(PlayerCommand::SetAudioAttributes(attributes)).unwrap();
    assert_eq!(h.engine.count_calls(|c| matches!(c, EngineCall::SetAudioAttributes(_))), 0);

    h.engine_state(EngineState::Ready);
    h.engine_state(EngineState::Buffering);
    h.engine_state(EngineState::Ready);

    assert_eq!(
        h.engine.count_calls(|c| *c == EngineCall::SetAudioAttributes(attributes)),
        1
    );
}

#[test]
fn test_attributes_applied_immediately_when_not_loading() {
    let mut h = Harness::new();
    h.run(PlayerCommand::SetAudioAttributes(AudioAttributes::default())).unwrap();
    assert_eq!(h.engine.count_calls(|c| matches!(c, EngineCall::SetAudioAttributes(_))), 1);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_engine_error_fails_pending_load_and_latches() {
    let mut h = Harness::new();
    let mut result = h.command(load(vec![progressive("a")], Some(0)));
    h.drain();

    h.engine_event(EngineEvent::PlayerError(EngineError::source("404 Not Found")));

    assert_eq!(
        settled(&mut result).unwrap(),
        Err(PlayerError::EngineSource { message: "404 Not Found".to_string(), index: Some(0) })
    );

    let events = h.drain();
    assert_eq!(
        events[0],
        PlayerEvent::PlaybackError { code: 0, message: "404 Not Found".to_string(), index: Some(0) }
    );
    let snapshot = events.iter().rev().find_map(PlayerEvent::snapshot).unwrap();
    assert_eq!(snapshot.processing_state, ProcessingState::Idle);
    assert_eq!(snapshot.error_code, Some(0));
    assert_eq!(snapshot.error_message.as_deref(), Some("404 Not Found"));
}

#[test]
fn test_error_cleared_by_next_transition() {
    let mut h = Harness::new();
    h.load_ready(vec![progressive("a")]).unwrap();
    h.engine_event(EngineEvent::PlayerError(EngineError::source("timeout")));
    assert_eq!(h.last_snapshot().unwrap().error_code, Some(0));

    h.engine_state(EngineState::Buffering);

    let snapshot = h.last_snapshot().unwrap();
    assert_eq!(snapshot.processing_state, ProcessingState::Buffering);
    assert_eq!(snapshot.error_code, None);
    assert_eq!(snapshot.error_message, None);
}

// ============================================================================
// End-of-playlist recovery
// ============================================================================

#[test]
fn test_refilled_playlist_restarts_at_first_item() {
    let mut h = Harness::new();
    let _load = h.command(load(vec![], None));
    h.engine_state(EngineState::Ended);
    h.run(PlayerCommand::Play).unwrap();

    h.run(PlayerCommand::InsertAll {
        id: String::new(),
        index: 0,
        children: vec![progressive("a"), progressive("b")],
        shuffle_order: vec![],
    })
    .unwrap();
    h.engine_event(EngineEvent::TimelineChanged);

    assert!(h.engine.calls().contains(&EngineCall::SeekTo { index: 0, position_us: Some(0) }));
}

#[test]
fn test_parked_past_end_wraps_to_first_item() {
    let mut h = Harness::new();
    h.load_ready(vec![progressive("a"), progressive("b")]).unwrap();
    h.engine_event(EngineEvent::TimelineChanged);
    let _play = h.command(PlayerCommand::Play);
    h.engine.set_current_index(1);
    h.engine_event(EngineEvent::PositionDiscontinuity { reason: DiscontinuityReason::AutoTransition });
    h.engine_state(EngineState::Ended);
    h.engine.clear_calls();

    h.engine.set_current_index(2);
    h.engine_event(EngineEvent::TimelineChanged);

    assert_eq!(h.engine.calls(), vec![EngineCall::SeekTo { index: 0, position_us: Some(0) }]);
}

#[test]
fn test_grown_playlist_advances_to_next_item() {
    let mut h = Harness::new();
    h.load_ready(vec![progressive("a")]).unwrap();
    h.engine_event(EngineEvent::TimelineChanged);
    let _play = h.command(PlayerCommand::Play);
    h.engine_state(EngineState::Ended);

    h.run(PlayerCommand::InsertAll {
        id: String::new(),
        index: 1,
        children: vec![progressive("b")],
        shuffle_order: vec![],
    })
    .unwrap();
    h.engine_event(EngineEvent::TimelineChanged);

    assert!(h.engine.calls().contains(&EngineCall::SeekToNext));
}

#[test]
fn test_paused_end_clamps_into_range() {
    let mut h = Harness::new();
    h.load_ready(vec![progressive("a"), progressive("b")]).unwrap();
    h.engine_state(EngineState::Ended);
    h.engine.clear_calls();

    h.engine_event(EngineEvent::TimelineChanged);

    assert_eq!(h.engine.calls(), vec![EngineCall::SeekTo { index: 0, position_us: Some(0) }]);
}

#[test]
fn test_rejected_recovery_seek_is_swallowed() {
    let mut h = Harness::new();
    h.load_ready(vec![progressive("a")]).unwrap();
    h.engine_state(EngineState::Ended);
    h.engine.reject_seeks(true);
    h.drain();

    h.engine_event(EngineEvent::TimelineChanged);

    assert!(!h.drain().iter().any(|e| matches!(e, PlayerEvent::PlaybackError { .. })));
    assert_eq!(h.controller.processing_state(), ProcessingState::Completed);
}

// ============================================================================
// Metadata and audio session
// ============================================================================

#[test]
fn test_icy_metadata_is_broadcast_immediately() {
    let mut h = Harness::new();
    h.load_ready(vec![progressive("radio")]).unwrap();
    h.drain();

    h.engine_event(EngineEvent::TracksChanged(vec![MetadataEntry::IcyHeaders(IcyHeaders {
        bitrate: Some(128_000),
        name: Some("Cadence FM".to_string()),
        ..Default::default()
    })]));
    h.engine_event(EngineEvent::Metadata(vec![
        MetadataEntry::Other("id3".to_string()),
        MetadataEntry::IcyInfo(IcyInfo { title: Some("Artist - Song".to_string()), url: None }),
    ]));

    let snapshots = h.snapshots();
    assert_eq!(snapshots.len(), 2);
    let icy = &snapshots[1].icy_metadata;
    assert_eq!(icy.headers.as_ref().unwrap().name.as_deref(), Some("Cadence FM"));
    assert_eq!(icy.info.as_ref().unwrap().title.as_deref(), Some("Artist - Song"));
}

#[test]
fn test_session_change_rebuilds_effects() {
    let mut h = Harness::with_effects(vec![EffectDescriptor::LoudnessEnhancer { enabled: true, target_gain: 2.5 }]);
    assert_eq!(h.effects.created(), vec![(EffectKind::LoudnessEnhancer, SESSION_ID)]);
    assert_eq!(h.effects.target_gain_mb(), Some(250));
    assert_eq!(h.effects.enabled(EffectKind::LoudnessEnhancer), Some(true));

    h.engine_event(EngineEvent::AudioSessionIdChanged(Some(77)));

    assert_eq!(h.effects.released(), 1);
    assert_eq!(h.effects.created().last(), Some(&(EffectKind::LoudnessEnhancer, 77)));
    assert_eq!(h.last_snapshot().unwrap().audio_session_id, Some(77));

    h.engine_event(EngineEvent::AudioSessionIdChanged(None));
    assert_eq!(h.effects.released(), 2);
    assert_eq!(
        h.run(PlayerCommand::LoudnessEnhancerSetTargetGain(1.0)),
        Err(PlayerError::EffectNotConfigured("LoudnessEnhancer".to_string()))
    );
}

#[test]
fn test_effect_commands() {
    let mut h = Harness::with_effects(vec![
        EffectDescriptor::LoudnessEnhancer { enabled: false, target_gain: 0.0 },
        EffectDescriptor::Equalizer { enabled: true, band_gains: Some(vec![1.0, -2.0]) },
    ]);

    h.run(PlayerCommand::AudioEffectSetEnabled { type_name: "AndroidLoudnessEnhancer".to_string(), enabled: true })
        .unwrap();
    assert_eq!(h.effects.enabled(EffectKind::LoudnessEnhancer), Some(true));

    h.run(PlayerCommand::LoudnessEnhancerSetTargetGain(-3.25)).unwrap();
    assert_eq!(h.effects.target_gain_mb(), Some(-325));

    h.run(PlayerCommand::EqualizerBandSetGain { band: 4, gain: 6.0 }).unwrap();
    let CommandResponse::EqualizerParameters { parameters } = h.run(PlayerCommand::EqualizerGetParameters).unwrap()
    else {
        panic!("expected equalizer parameters");
    };
    assert_eq!(parameters.bands.len(), 5);
    assert_eq!(parameters.bands[0].gain, 1.0);
    assert_eq!(parameters.bands[1].gain, -2.0);
    assert_eq!(parameters.bands[4].gain, 6.0);
    assert_eq!(parameters.bands[0].center_frequency, 60.0);
    assert_eq!(parameters.min_decibels, -15.0);

    assert!(matches!(
        h.run(PlayerCommand::EqualizerBandSetGain { band: 9, gain: 0.0 }),
        Err(PlayerError::InvalidCommandArgument(_))
    ));
    assert!(matches!(
        h.run(PlayerCommand::AudioEffectSetEnabled { type_name: "Reverb".to_string(), enabled: true }),
        Err(PlayerError::UnsupportedEffectType(_))
    ));
}

// ============================================================================
// Dispose
// ============================================================================

#[test]
fn test_dispose_while_loading_aborts_and_closes_stream() {
    let mut h = Harness::new();
    let mut result = h.command(load(vec![progressive("a")], None));

    assert_eq!(h.run(PlayerCommand::Dispose), Ok(CommandResponse::empty()));

    assert_eq!(settled(&mut result).unwrap(), Err(PlayerError::AbortedConnection));
    let snapshot = h.last_snapshot().unwrap();
    assert_eq!(snapshot.processing_state, ProcessingState::Idle);
    assert_eq!(h.events.try_recv(), Err(TryRecvError::Disconnected));
    assert!(h.engine.calls().contains(&EngineCall::Release));
}

#[test]
fn test_dispose_settles_pending_play_and_seek() {
    let mut h = Harness::with_effects(vec![EffectDescriptor::Equalizer { enabled: true, band_gains: None }]);
    h.load_ready(vec![progressive("a")]).unwrap();
    let mut play = h.command(PlayerCommand::Play);
    let mut seek = h.command(PlayerCommand::Seek { position_us: Some(5), index: None });

    h.run(PlayerCommand::Dispose).unwrap();

    assert_eq!(settled(&mut play).unwrap(), Ok(CommandResponse::empty()));
    assert_eq!(settled(&mut seek).unwrap(), Ok(CommandResponse::empty()));
    assert_eq!(h.effects.released(), 1);
    assert!(h.controller.sources().is_empty());
    assert!(h.controller.is_disposed());
}

#[test]
fn test_commands_after_dispose_fail() {
    let mut h = Harness::new();
    h.run(PlayerCommand::Dispose).unwrap();

    assert_eq!(h.run(PlayerCommand::Play), Err(PlayerError::Disposed));
    assert_eq!(h.run(PlayerCommand::SetVolume(1.0)), Err(PlayerError::Disposed));
    // Dispose stays idempotent
    assert_eq!(h.run(PlayerCommand::Dispose), Ok(CommandResponse::empty()));
    assert_eq!(h.engine.count_calls(|c| matches!(c, EngineCall::Release)), 1);

    // Callbacks racing the dispose are dropped
    h.engine_event(EngineEvent::PlaybackStateChanged(EngineState::Ready));
    assert_eq!(h.controller.processing_state(), ProcessingState::Idle);
}

#[test]
fn test_silence_duration_reported_on_ready() {
    let mut h = Harness::new();
    let result = h.load_ready(vec![silence("gap", 2_500_000)]).unwrap();
    assert_eq!(result, CommandResponse::Loaded { duration_ms: Some(2500) });
}
