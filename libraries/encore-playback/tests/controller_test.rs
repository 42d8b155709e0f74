//! Controller scenarios
//!
//! Drives the state machine through the harness with a manual clock. Every
//! test checks what a listener or the audio backends actually observe.

mod common;

use common::*;
use encore_core::{GroupType, Query, Track};
use encore_playback::{
    AddAux, AddMode, Command, FinishAction, FocusChange, JsonFileStore, MemoryStore, Message,
    PendingSeek, PlaybackConfig, PlaybackEvent, ShiftDelta, ShuffleMode,
};
use std::time::Duration;
use tempfile::TempDir;

fn play_all(h: &mut Harness) {
    h.send(Message::AddTracks {
        query: Query::All,
        mode: AddMode::Play,
        aux: AddAux::None,
    });
}

fn command(h: &mut Harness, command: Command) {
    h.send(Message::Command(command));
}

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

// ===== Transport =====

#[test]
fn play_mode_loads_and_starts_first_track() {
    let mut h = Harness::new(library(&["a", "b", "c"]));
    assert!(h.controller.state().empty_queue());

    play_all(&mut h);

    assert_eq!(h.current_id().as_deref(), Some("a"));
    assert!(h.controller.state().playing());
    assert!(!h.controller.state().empty_queue());
    assert!(h.backends[0].is_loaded("a"));
    assert!(h.backends[0].with(|s| s.playing));
}

#[test]
fn play_pause_toggles_backend() {
    let mut h = Harness::new(library(&["a", "b"]));
    play_all(&mut h);

    command(&mut h, Command::PlayPause);
    assert!(!h.controller.state().playing());
    assert!(!h.active().with(|s| s.playing));

    command(&mut h, Command::PlayPause);
    assert!(h.controller.state().playing());
    assert!(h.active().with(|s| s.playing));
}

#[test]
fn pausing_twice_notifies_once() {
    let mut h = Harness::new(library(&["a", "b"]));
    play_all(&mut h);
    h.events();

    command(&mut h, Command::Pause);
    assert_eq!(count_state_changes(&h.events()), 1);

    command(&mut h, Command::Pause);
    assert_eq!(count_state_changes(&h.events()), 0);
}

#[test]
fn setting_same_shuffle_mode_is_silent() {
    let mut h = Harness::new(library(&["a", "b", "c"]));
    play_all(&mut h);
    h.events();

    h.send(Message::SetShuffleMode(ShuffleMode::None));
    assert!(h.events().is_empty());
}

#[test]
fn next_song_while_paused_does_not_start_playback() {
    let mut h = Harness::new(library(&["a", "b", "c"]));
    play_all(&mut h);
    command(&mut h, Command::Pause);

    command(&mut h, Command::NextSong { autoplay: false });
    assert_eq!(h.current_id().as_deref(), Some("b"));
    assert!(!h.controller.state().playing());
    assert!(h.active().is_loaded("b"));
    assert!(!h.active().with(|s| s.playing));

    command(&mut h, Command::NextSong { autoplay: true });
    assert_eq!(h.current_id().as_deref(), Some("c"));
    assert!(h.controller.state().playing());
}

#[test]
fn cycle_commands_update_published_modes() {
    let mut h = Harness::new(library(&["a", "b", "c"]));
    play_all(&mut h);

    command(&mut h, Command::CycleShuffle);
    assert_eq!(h.controller.state().shuffle_mode(), ShuffleMode::Songs);

    command(&mut h, Command::CycleRepeat);
    assert_eq!(h.controller.state().finish_action(), FinishAction::RepeatAll);
}

#[test]
fn shuffle_keeps_current_track_without_reloading() {
    let mut h = Harness::new(numbered_library(30));
    play_all(&mut h);
    for _ in 0..3 {
        command(&mut h, Command::NextSong { autoplay: false });
    }
    assert_eq!(h.current_id().as_deref(), Some("t3"));
    let loads = h.backends[0].load_count() + h.backends[1].load_count();
    h.events();

    h.send(Message::SetShuffleMode(ShuffleMode::Songs));

    assert_eq!(h.current_id().as_deref(), Some("t3"));
    assert!(h.active().is_loaded("t3"));
    assert_eq!(h.backends[0].load_count() + h.backends[1].load_count(), loads);
    assert!(!h
        .events()
        .iter()
        .any(|e| matches!(e, PlaybackEvent::TrackChanged { .. })));
}

// ===== Gapless =====

#[test]
fn completion_swaps_to_preloaded_backend() {
    let mut h = Harness::new(library(&["a", "b", "c"]));
    play_all(&mut h);

    h.advance(ms(300));
    assert!(h.backends[1].is_loaded("b"));
    assert_eq!(
        h.controller.preloaded_track().map(|t| t.id.to_string()),
        Some("b".to_string())
    );

    h.backends[0].complete();
    h.pump();

    assert_eq!(h.current_id().as_deref(), Some("b"));
    assert!(h.backends[1].with(|s| s.playing));
    assert_eq!(h.backends[1].load_count(), 1);
    assert_eq!(h.backends[0].loaded(), None);

    h.advance(ms(2_500));
    assert!(h.backends[0].is_loaded("c"));
    let played: Vec<String> = h
        .events()
        .iter()
        .filter_map(|e| match e {
            PlaybackEvent::TrackPlayed { track } => Some(track.id.to_string()),
            _ => None,
        })
        .collect();
    assert_eq!(played, vec!["a".to_string()]);
}

#[test]
fn completion_from_replaced_load_is_ignored() {
    let mut h = Harness::new(library(&["a", "b", "c"]));
    play_all(&mut h);
    h.advance(ms(300));
    h.backends[0].complete();
    h.pump();
    assert_eq!(h.current_id().as_deref(), Some("b"));

    // Backend 0 still holds the callback of its finished load
    h.backends[0].complete();
    h.pump();

    assert_eq!(h.current_id().as_deref(), Some("b"));
    assert!(h.backends[1].with(|s| s.playing));
}

#[test]
fn repeat_current_restarts_same_track() {
    let mut h = Harness::new(library(&["a", "b"]));
    play_all(&mut h);
    h.send(Message::SetFinishAction(FinishAction::RepeatCurrent));
    h.advance(ms(300));
    assert_eq!(h.controller.preloaded_track(), None);

    h.active().set_position(150_000);
    h.active().complete();
    h.pump();

    assert_eq!(h.current_id().as_deref(), Some("a"));
    assert!(h.active().with(|s| s.playing));
    assert_eq!(h.active().with(|s| s.position_ms), 0);
}

#[test]
fn stop_action_pauses_after_last_track() {
    let mut h = Harness::new(library(&["a"]));
    play_all(&mut h);

    h.active().complete();
    h.pump();

    assert!(!h.controller.state().playing());
    assert!(!h.controller.state().empty_queue());
    assert_eq!(h.current_id().as_deref(), Some("a"));
}

#[test]
fn gapless_disabled_never_preloads() {
    let config = PlaybackConfig {
        gapless: false,
        ..PlaybackConfig::default()
    };
    let mut h = Harness::with_config(library(&["a", "b"]), config);
    play_all(&mut h);
    h.advance(ms(1_000));

    assert_eq!(h.controller.preloaded_track(), None);
    assert_eq!(h.backends[1].load_count(), 0);
}

// ===== Load failures =====

#[test]
fn broken_tracks_are_skipped_until_one_loads() {
    let mut h = Harness::new(library(&["x1", "x2", "x3", "ok"]));
    for id in ["x1", "x2", "x3"] {
        h.break_track(id);
    }

    play_all(&mut h);
    h.advance(Duration::from_secs(10));

    assert_eq!(errors(&h.events()).len(), 3);
    assert_eq!(h.current_id().as_deref(), Some("ok"));
    assert!(h.controller.state().playing());
    assert!(!h.controller.state().error());
    assert_eq!(h.controller.auto_skips(), 0);
}

#[test]
fn all_broken_queue_gives_up_after_bounded_skips() {
    let mut h = Harness::new(numbered_library(15));
    for i in 0..15 {
        h.break_track(&format!("t{i}"));
    }

    play_all(&mut h);
    h.advance(Duration::from_secs(60));

    assert_eq!(errors(&h.events()).len(), 11);
    assert_eq!(h.controller.queue().current_pos(), 10);
    assert!(h.controller.state().error());
    assert!(!h.controller.state().playing());

    h.advance(Duration::from_secs(60));
    assert!(errors(&h.events()).is_empty());
}

#[test]
fn playback_error_on_active_backend_skips_ahead() {
    let mut h = Harness::new(library(&["a", "b"]));
    play_all(&mut h);

    h.backends[0].fail("decoder lost sync");
    h.pump();
    assert!(h.controller.state().error());
    assert_eq!(errors(&h.events()).len(), 1);

    h.advance(Duration::from_secs(2));
    assert_eq!(h.current_id().as_deref(), Some("b"));
    assert!(h.controller.state().playing());
}

// ===== Previous / seek =====

#[test]
fn previous_restarts_track_past_threshold() {
    let mut h = Harness::new(library(&["a", "b", "c"]));
    play_all(&mut h);
    command(&mut h, Command::NextSong { autoplay: false });
    assert_eq!(h.current_id().as_deref(), Some("b"));

    h.active().set_position(10_000);
    command(&mut h, Command::PreviousSong { autoplay: false });
    assert_eq!(h.current_id().as_deref(), Some("b"));
    assert_eq!(h.active().with(|s| s.position_ms), 0);

    h.active().set_position(3_000);
    command(&mut h, Command::PreviousSong { autoplay: false });
    assert_eq!(h.current_id().as_deref(), Some("a"));
}

#[test]
fn previous_on_short_track_always_goes_back() {
    let mut h = Harness::new(library(&["a", "b"]));
    play_all(&mut h);
    command(&mut h, Command::NextSong { autoplay: false });

    // 6 s into an 8 s track: past the threshold, but the track is too short
    h.active().with(|s| {
        s.duration_ms = Some(8_000);
        s.position_ms = 6_000;
    });
    command(&mut h, Command::PreviousSong { autoplay: false });
    assert_eq!(h.current_id().as_deref(), Some("a"));
}

#[test]
fn previous_late_in_track_counts_it_as_played() {
    let mut h = Harness::new(library(&["a", "b"]));
    play_all(&mut h);
    h.events();

    h.active().set_position(190_000);
    command(&mut h, Command::PreviousSong { autoplay: false });

    assert_eq!(h.current_id().as_deref(), Some("a"));
    assert!(h
        .events()
        .iter()
        .any(|e| matches!(e, PlaybackEvent::TrackPlayed { track } if track.id.as_str() == "a")));
}

#[test]
fn seek_steps_are_clamped_to_track() {
    let mut h = Harness::new(library(&["a"]));
    play_all(&mut h);

    h.active().set_position(10_000);
    command(&mut h, Command::SeekForward(30));
    assert_eq!(h.active().with(|s| s.position_ms), 40_000);

    command(&mut h, Command::SeekBackward(60));
    assert_eq!(h.active().with(|s| s.position_ms), 0);

    h.send(Message::SeekTo(900_000));
    assert_eq!(h.active().with(|s| s.position_ms), TRACK_MS);
}

// ===== Queue edits =====

#[test]
fn removing_current_track_loads_replacement() {
    let mut h = Harness::new(library(&["a", "b", "c"]));
    play_all(&mut h);

    h.send(Message::RemoveAt(0));

    assert_eq!(h.queue_ids(), vec!["b", "c"]);
    assert_eq!(h.current_id().as_deref(), Some("b"));
    assert!(h.active().is_loaded("b"));
    assert!(h.controller.state().playing());
}

#[test]
fn clear_queue_keeps_current_and_empty_queue_removes_all() {
    let mut h = Harness::new(library(&["a", "b", "c"]));
    play_all(&mut h);

    command(&mut h, Command::ClearQueue);
    assert_eq!(h.queue_ids(), vec!["a"]);
    assert!(h.controller.state().playing());

    command(&mut h, Command::EmptyQueue);
    assert!(h.queue_ids().is_empty());
    assert!(h.controller.state().empty_queue());
    assert!(!h.controller.state().playing());
    assert!(!h.controller.is_loaded());
}

#[test]
fn enqueue_from_album_adds_whole_album() {
    let album = |id: &str| track(id).with_album(7, "Seven");
    let lib = std::sync::Arc::new(encore_core::InMemoryLibrary::new(vec![
        track("solo"),
        album("s1"),
        album("s2"),
    ]));
    let mut h = Harness::new(lib);
    h.send(Message::AddTracks {
        query: Query::Tracks(vec!["solo".into()]),
        mode: AddMode::Play,
        aux: AddAux::None,
    });

    command(&mut h, Command::EnqueueFrom(album("s2"), GroupType::Album));

    assert_eq!(h.queue_ids(), vec!["solo", "s1", "s2"]);
    assert_eq!(h.current_id().as_deref(), Some("solo"));
}

#[test]
fn enqueue_id_first_starts_block_with_match() {
    let mut h = Harness::new(library(&["x", "y", "z"]));
    h.send(Message::AddTracks {
        query: Query::All,
        mode: AddMode::EnqueueIdFirst,
        aux: AddAux::Id("y".into()),
    });

    assert_eq!(h.queue_ids(), vec!["y", "x", "z"]);
}

#[test]
fn album_shift_moves_past_album() {
    let lib = std::sync::Arc::new(encore_core::InMemoryLibrary::new(vec![
        track("a1").with_album(1, "One"),
        track("a2").with_album(1, "One"),
        track("b1").with_album(2, "Two"),
    ]));
    let mut h = Harness::new(lib);
    play_all(&mut h);

    h.send(Message::SetCurrentSong(ShiftDelta::NextAlbum));
    assert_eq!(h.current_id().as_deref(), Some("b1"));
    assert!(h.active().is_loaded("b1"));
}

#[test]
fn shuffle_after_removal_keeps_current_track_loaded() {
    let mut h = Harness::new(library(&["a", "b", "c", "d", "e", "f", "g", "h"]));
    play_all(&mut h);
    command(&mut h, Command::NextSong { autoplay: false });
    command(&mut h, Command::NextSong { autoplay: false });
    h.send(Message::RemoveAt(0));
    h.events();
    let current = h.controller.current_track().cloned().unwrap();
    let loads: usize = h.backends.iter().map(MockBackend::load_count).sum();

    h.send(Message::SetShuffleMode(ShuffleMode::Songs));

    let events = h.events();
    assert!(!events
        .iter()
        .any(|e| matches!(e, PlaybackEvent::TrackChanged { .. })));
    assert_eq!(h.current_id().as_deref(), Some("c"));
    assert_eq!(h.controller.current_track().unwrap().flags, current.flags);
    assert_eq!(
        h.backends.iter().map(MockBackend::load_count).sum::<usize>(),
        loads
    );
    assert!(h.active().is_loaded("c"));
    assert!(h.controller.state().playing());
}

// ===== Random playback =====

#[test]
fn play_on_empty_queue_switches_to_random() {
    let mut h = Harness::new(numbered_library(50));
    command(&mut h, Command::Play);

    assert_eq!(h.controller.state().finish_action(), FinishAction::Random);
    assert!(h.controller.state().playing());
    assert!(h.current_id().is_some());

    for _ in 0..40 {
        command(&mut h, Command::NextSong { autoplay: false });
        h.advance(ms(300));
        let queue = h.controller.queue();
        assert!(queue.len() <= 20, "history grew to {}", queue.len());
        assert!(queue.current_pos() < queue.len());
    }
    assert!(h.controller.state().playing());
}

#[test]
fn random_lookahead_is_announced_as_next_track() {
    let mut h = Harness::new(library(&["a", "b", "c", "d"]));
    h.send(Message::SetFinishAction(FinishAction::Random));
    h.send(Message::AddTracks {
        query: Query::Tracks(vec!["a".into()]),
        mode: AddMode::Play,
        aux: AddAux::None,
    });
    h.events();

    h.advance(Duration::from_secs(1));

    let queue = h.controller.queue();
    assert_eq!(queue.len(), 2);
    let next = queue.tracks()[1].clone();
    assert!(next.flags.random_origin);
    let events = h.events();
    assert!(events.iter().any(|e| matches!(
        e,
        PlaybackEvent::ActiveTrackReplaced { delta: 1, track: Some(t) } if t.same_slot(&next)
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e, PlaybackEvent::PositionInfoChanged)));
    assert!(!events
        .iter()
        .any(|e| matches!(e, PlaybackEvent::TimelineChanged)));
    assert!(h
        .controller
        .preloaded_track()
        .is_some_and(|t| t.same_slot(&next)));
}

// ===== Idle timeout =====

fn idle_config() -> PlaybackConfig {
    PlaybackConfig {
        idle_timeout_ms: Some(10_000),
        ..PlaybackConfig::default()
    }
}

fn idle_paused(h: &mut Harness) {
    play_all(h);
    h.advance(Duration::from_secs(12));
    assert!(!h.controller.state().playing());
    assert!(h.controller.idle_paused_at().is_some());
}

#[test]
fn idle_timeout_fades_out() {
    let mut h = Harness::with_config(library(&["a", "b"]), idle_config());
    play_all(&mut h);

    h.advance(ms(10_500));
    let volume = h.controller.volume_factor();
    assert!(volume > 0.0 && volume < 1.0, "volume {volume}");
    assert!(h.controller.state().playing());
    assert!(h.active().with(|s| s.volume) < 1.0);
}

#[test]
fn activity_during_fade_restores_volume() {
    let mut h = Harness::with_config(library(&["a", "b"]), idle_config());
    play_all(&mut h);
    h.advance(ms(10_500));

    h.send(Message::UserActivity);
    assert_eq!(h.controller.volume_factor(), 1.0);
    assert!(h.controller.state().playing());

    h.advance(Duration::from_secs(5));
    assert!(h.controller.state().playing());
}

#[test]
fn action_within_grace_period_resumes() {
    let mut h = Harness::with_config(library(&["a", "b"]), idle_config());
    idle_paused(&mut h);

    h.advance(Duration::from_secs(30));
    command(&mut h, Command::PlayPause);

    assert!(h.controller.state().playing());
    assert!(h.active().with(|s| s.playing));
    assert_eq!(h.controller.volume_factor(), 1.0);
}

#[test]
fn action_after_grace_period_stays_paused() {
    let mut h = Harness::with_config(library(&["a", "b"]), idle_config());
    idle_paused(&mut h);

    h.advance(Duration::from_secs(90));
    h.send(Message::UserActivity);

    assert!(!h.controller.state().playing());
    assert!(h.controller.idle_paused_at().is_none());
}

// ===== Audio focus =====

#[test]
fn duckable_loss_lowers_volume_until_gain() {
    let mut h = Harness::new(library(&["a"]));
    play_all(&mut h);

    h.send(Message::AudioFocus(FocusChange::LossTransient { can_duck: true }));
    assert!(h.controller.state().ducking());
    assert!(h.controller.state().playing());
    assert!(h.active().with(|s| s.ducking));

    h.send(Message::AudioFocus(FocusChange::Gain));
    assert!(!h.controller.state().ducking());
    assert!(!h.active().with(|s| s.ducking));
}

#[test]
fn transient_loss_pauses_and_gain_resumes() {
    let mut h = Harness::new(library(&["a"]));
    play_all(&mut h);
    h.events();

    h.send(Message::AudioFocus(FocusChange::LossTransient { can_duck: false }));
    assert!(!h.controller.state().playing());
    assert!(h
        .events()
        .iter()
        .any(|e| matches!(e, PlaybackEvent::NotificationForced)));

    h.send(Message::AudioFocus(FocusChange::Gain));
    assert!(h.controller.state().playing());
    assert!(h.active().with(|s| s.playing));
}

#[test]
fn permanent_loss_stays_paused_on_gain() {
    let mut h = Harness::new(library(&["a"]));
    play_all(&mut h);

    h.send(Message::AudioFocus(FocusChange::Loss));
    assert!(!h.controller.state().playing());

    h.send(Message::AudioFocus(FocusChange::Gain));
    assert!(!h.controller.state().playing());
}

// ===== Double press =====

#[test]
fn double_press_opens_ui_instead_of_toggling() {
    let mut h = Harness::new(library(&["a", "b"]));
    play_all(&mut h);
    command(&mut h, Command::Pause);
    h.events();

    command(&mut h, Command::DelayedToggle);
    h.advance(ms(100));
    command(&mut h, Command::DelayedToggle);
    h.advance(Duration::from_secs(1));

    assert!(h
        .events()
        .iter()
        .any(|e| matches!(e, PlaybackEvent::OpenUiRequested)));
    assert!(!h.controller.state().playing());
}

#[test]
fn single_press_acts_after_window() {
    let mut h = Harness::new(library(&["a", "b"]));
    play_all(&mut h);
    command(&mut h, Command::Pause);

    command(&mut h, Command::DelayedToggle);
    assert!(!h.controller.state().playing());
    h.advance(ms(500));
    assert!(h.controller.state().playing());

    command(&mut h, Command::DelayedNext);
    assert_eq!(h.current_id().as_deref(), Some("a"));
    h.advance(ms(500));
    assert_eq!(h.current_id().as_deref(), Some("b"));
}

// ===== Sleep =====

#[test]
fn long_pause_releases_backends_and_keeps_position() {
    let mut h = Harness::new(library(&["a", "b"]));
    play_all(&mut h);
    h.active().set_position(42_000);
    command(&mut h, Command::Pause);

    h.advance(Duration::from_secs(301));

    assert!(!h.controller.is_loaded());
    assert_eq!(h.backends[0].loaded(), None);
    assert_eq!(h.backends[1].loaded(), None);
    assert_eq!(h.controller.position_ms(), 42_000);
    assert_eq!(
        h.controller.pending_seek(),
        Some(&PendingSeek {
            track_id: "a".into(),
            position_ms: 42_000,
        })
    );

    command(&mut h, Command::Play);
    assert!(h.controller.state().playing());
    assert!(h.active().is_loaded("a"));
    assert_eq!(h.active().with(|s| s.position_ms), 42_000);
    assert_eq!(h.controller.pending_seek(), None);
}

// ===== Library =====

#[test]
fn library_availability_drives_no_media() {
    let mut h = Harness::new(library(&[]));
    assert!(h.controller.state().no_media());

    h.library.insert(track("a"));
    h.send(Message::LibraryChanged);
    assert!(!h.controller.state().no_media());
    assert!(h.controller.state().empty_queue());

    command(&mut h, Command::Play);
    assert_eq!(h.current_id().as_deref(), Some("a"));
    assert!(h.controller.state().playing());

    h.library.remove(&"a".into());
    h.send(Message::LibraryChanged);
    assert!(h.controller.state().no_media());
    assert!(!h.controller.state().playing());
}

// ===== Persistence =====

#[test]
fn saves_are_debounced() {
    let store = MemoryStore::new();
    let mut h = Harness::with_store(library(&["a", "b", "c"]), PlaybackConfig::default(), store);
    play_all(&mut h);

    h.advance(Duration::from_secs(1));
    h.send(Message::SetFinishAction(FinishAction::RepeatAll));
    h.send(Message::MoveTrack { from: 2, to: 1 });

    h.advance(ms(4_500));
    assert_eq!(h.store.save_count(), 0);

    h.advance(Duration::from_secs(1));
    assert_eq!(h.store.save_count(), 1);
}

#[test]
fn shutdown_snapshot_restores_without_vanished_tracks() {
    let store = MemoryStore::new();
    let mut h = Harness::with_store(
        library(&["a", "b", "c"]),
        PlaybackConfig::default(),
        store.clone(),
    );
    play_all(&mut h);
    command(&mut h, Command::NextSong { autoplay: false });
    h.send(Message::SetFinishAction(FinishAction::RepeatAll));
    h.active().set_position(30_000);
    h.send(Message::Shutdown);

    let snapshot = store.snapshot().expect("snapshot saved on shutdown");
    assert_eq!(snapshot.tracks.len(), 3);
    assert_eq!(snapshot.current_pos, 1);
    assert_eq!(snapshot.pending_seek_track_id, Some("b".into()));
    assert_eq!(snapshot.pending_seek_ms, 30_000);

    let mut h = Harness::with_store(library(&["b", "c"]), PlaybackConfig::default(), store);
    assert_eq!(h.queue_ids(), vec!["b", "c"]);
    assert_eq!(h.current_id().as_deref(), Some("b"));
    assert_eq!(h.controller.state().finish_action(), FinishAction::RepeatAll);
    assert_eq!(h.controller.position_ms(), 30_000);
    assert!(!h.controller.state().playing());

    command(&mut h, Command::Play);
    assert!(h.active().is_loaded("b"));
    assert_eq!(h.active().with(|s| s.position_ms), 30_000);
}

#[test]
fn saved_position_of_vanished_track_is_dropped() {
    let store = MemoryStore::new();
    let mut h = Harness::with_store(
        library(&["a", "b", "c"]),
        PlaybackConfig::default(),
        store.clone(),
    );
    play_all(&mut h);
    command(&mut h, Command::NextSong { autoplay: false });
    h.active().set_position(30_000);
    h.send(Message::Shutdown);

    let mut h = Harness::with_store(
        library(&["a", "c"]),
        PlaybackConfig::default(),
        store.clone(),
    );
    assert_eq!(h.queue_ids(), vec!["a", "c"]);
    assert!(h.controller.pending_seek().is_none());
    assert_eq!(h.controller.position_ms(), 0);

    h.send(Message::Shutdown);
    let snapshot = store.snapshot().unwrap();
    assert_eq!(snapshot.pending_seek_track_id, None);
    assert_eq!(snapshot.pending_seek_ms, 0);
}

#[test]
fn json_store_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("queue.json");

    let mut h = Harness::with_persistence(
        library(&["a", "b", "c"]),
        PlaybackConfig::default(),
        Box::new(JsonFileStore::new(&path)),
    );
    play_all(&mut h);
    command(&mut h, Command::NextSong { autoplay: false });
    h.send(Message::Shutdown);
    assert!(path.exists());

    let h = Harness::with_persistence(
        library(&["a", "b", "c"]),
        PlaybackConfig::default(),
        Box::new(JsonFileStore::new(&path)),
    );
    assert_eq!(h.queue_ids(), vec!["a", "b", "c"]);
    assert_eq!(h.current_id().as_deref(), Some("b"));
}

#[test]
fn corrupt_snapshot_starts_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("queue.json");
    std::fs::write(&path, "not json at all").unwrap();

    let h = Harness::with_persistence(
        library(&["a"]),
        PlaybackConfig::default(),
        Box::new(JsonFileStore::new(&path)),
    );

    assert!(h.queue_ids().is_empty());
    assert!(h.controller.state().empty_queue());
}

#[test]
fn unfilled_library_entries_are_not_queued() {
    let lib = std::sync::Arc::new(encore_core::InMemoryLibrary::new(vec![
        track("a"),
        Track::new("ghost", "", ""),
    ]));
    let mut h = Harness::new(lib);
    play_all(&mut h);

    assert_eq!(h.queue_ids(), vec!["a"]);
}
