/// Line-oriented command shell
use encore_core::{GroupType, Query, Track, TrackId};
use encore_playback::{
    AddAux, AddMode, Command, FinishAction, FocusChange, Message, Observer, PlaybackState,
    ShiftDelta, ShuffleMode, Status, Timestamp,
};
use tracing::{debug, trace};

pub const HELP: &str = "\
Playback:
  play | pause | toggle          start, pause or toggle playback
  next [album] | prev [album]    skip by song or album
  seek <secs>                    jump to a position in the current track
  ff <secs> | rew <secs>         seek forward or backward
  press [next]                   headset button (press twice quickly to skip)
Queue:
  add [play|enqueue|next|flush] all | album <id> | artist <id> | <track id>...
      [--first <track id> | --at <index>]
  more song|album|artist         enqueue more like the current track
  rm <index> | rmid <track id>   remove one slot or every slot of a track
  mv <from> <to>                 move a slot
  clear                          drop everything after the current track
  empty                          remove everything
  shuffle [none|songs|albums]    cycle or set the shuffle mode
  repeat [stop|repeat_all|repeat_current|random]
                                 cycle or set the finish action
Other:
  focus gain|duck|pause|loss     simulate an audio focus change
  rescan                         tell the player the library changed
  status | help | quit
";

/// One parsed shell line
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Post a message to the playback worker
    Send(Message),

    /// Enqueue the current track's group
    More(GroupType),

    Status,
    Help,
    Quit,
}

/// Parse one line of input
///
/// Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Input>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default().to_ascii_lowercase();
    let args: Vec<&str> = words.collect();

    let command = |command: Command| Ok(Some(Input::Send(Message::Command(command))));
    let send = |message: Message| Ok(Some(Input::Send(message)));

    match (verb.as_str(), args.as_slice()) {
        ("play", []) => command(Command::Play),
        ("pause", []) => command(Command::Pause),
        ("toggle", []) => command(Command::PlayPause),

        ("next", []) => command(Command::NextSong { autoplay: false }),
        ("next", ["album"]) => send(Message::SetCurrentSong(ShiftDelta::NextAlbum)),
        ("prev", []) => command(Command::PreviousSong { autoplay: false }),
        ("prev", ["album"]) => send(Message::SetCurrentSong(ShiftDelta::PreviousAlbum)),

        ("seek", [secs]) => send(Message::SeekTo(u64::from(seconds(secs)?) * 1000)),
        ("ff", [secs]) => command(Command::SeekForward(seconds(secs)?)),
        ("rew", [secs]) => command(Command::SeekBackward(seconds(secs)?)),

        ("press", []) => command(Command::DelayedToggle),
        ("press", ["next"]) => command(Command::DelayedNext),

        ("add", _) => parse_add(&args).map(|message| Some(Input::Send(message))),

        ("more", [group]) => {
            let group = match *group {
                "song" => GroupType::Song,
                "album" => GroupType::Album,
                "artist" => GroupType::Artist,
                other => return Err(format!("Unknown group: {}", other)),
            };
            Ok(Some(Input::More(group)))
        }

        ("rm", [index]) => send(Message::RemoveAt(index_arg(index)?)),
        ("rmid", [id]) => send(Message::RemoveTrack(TrackId::new(*id))),
        ("mv", [from, to]) => send(Message::MoveTrack {
            from: index_arg(from)?,
            to: index_arg(to)?,
        }),
        ("clear", []) => command(Command::ClearQueue),
        ("empty", []) => command(Command::EmptyQueue),

        ("shuffle", []) => command(Command::CycleShuffle),
        ("shuffle", [mode]) => send(Message::SetShuffleMode(parse_shuffle(mode)?)),
        ("repeat", []) => command(Command::CycleRepeat),
        ("repeat", [action]) => send(Message::SetFinishAction(parse_finish(action)?)),

        ("focus", [change]) => {
            let change = match *change {
                "gain" => FocusChange::Gain,
                "duck" => FocusChange::LossTransient { can_duck: true },
                "pause" => FocusChange::LossTransient { can_duck: false },
                "loss" => FocusChange::Loss,
                other => return Err(format!("Unknown focus change: {}", other)),
            };
            send(Message::AudioFocus(change))
        }

        ("rescan", []) => send(Message::LibraryChanged),
        ("status", []) => Ok(Some(Input::Status)),
        ("help" | "?", []) => Ok(Some(Input::Help)),
        ("quit" | "exit", []) => Ok(Some(Input::Quit)),

        _ => Err(format!("Unknown command: {} (try 'help')", line)),
    }
}

fn seconds(arg: &str) -> Result<u32, String> {
    arg.parse()
        .map_err(|_| format!("Expected seconds, got '{}'", arg))
}

fn index_arg(arg: &str) -> Result<usize, String> {
    arg.parse()
        .map_err(|_| format!("Expected a queue index, got '{}'", arg))
}

fn id_arg(arg: &str) -> Result<i64, String> {
    arg.parse()
        .map_err(|_| format!("Expected a numeric id, got '{}'", arg))
}

fn parse_shuffle(arg: &str) -> Result<ShuffleMode, String> {
    [ShuffleMode::None, ShuffleMode::Songs, ShuffleMode::Albums]
        .into_iter()
        .find(|mode| mode.as_str() == arg)
        .ok_or_else(|| format!("Unknown shuffle mode: {}", arg))
}

fn parse_finish(arg: &str) -> Result<FinishAction, String> {
    [
        FinishAction::Stop,
        FinishAction::RepeatAll,
        FinishAction::RepeatCurrent,
        FinishAction::Random,
    ]
    .into_iter()
    .find(|action| action.as_str() == arg)
    .ok_or_else(|| format!("Unknown finish action: {}", arg))
}

/// `add [mode] <selection> [--first <id> | --at <index>]`
fn parse_add(args: &[&str]) -> Result<Message, String> {
    let mut args = args;

    let mut mode = AddMode::Play;
    if let Some(word) = args.first() {
        let explicit = match *word {
            "play" => Some(AddMode::Play),
            "enqueue" => Some(AddMode::Enqueue),
            "next" => Some(AddMode::EnqueueAsNext),
            "flush" => Some(AddMode::FlushAndPlayNext),
            _ => None,
        };
        if let Some(explicit) = explicit {
            mode = explicit;
            args = &args[1..];
        }
    }

    let mut aux = AddAux::None;
    if let Some(flag) = args.iter().position(|a| a.starts_with("--")) {
        let (selection, option) = args.split_at(flag);
        aux = match option {
            ["--first", id] => AddAux::Id(TrackId::new(*id)),
            ["--at", index] => AddAux::Position(index_arg(index)?),
            _ => return Err("Expected --first <track id> or --at <index>".to_string()),
        };
        args = selection;
    }

    let query = match args {
        [] => return Err("Nothing to add (try 'add all')".to_string()),
        ["all"] => Query::All,
        ["album", id] => Query::Album(id_arg(id)?),
        ["artist", id] => Query::Artist(id_arg(id)?),
        ids => Query::Tracks(ids.iter().map(|id| TrackId::new(*id)).collect()),
    };

    mode = match (mode, &aux) {
        (_, AddAux::None) => mode,
        (AddMode::Play, AddAux::Id(_)) => AddMode::PlayIdFirst,
        (AddMode::Play, AddAux::Position(_)) => AddMode::PlayPosFirst,
        (AddMode::Enqueue, AddAux::Id(_)) => AddMode::EnqueueIdFirst,
        (AddMode::Enqueue, AddAux::Position(_)) => AddMode::EnqueuePosFirst,
        _ => return Err("--first and --at only apply to play and enqueue".to_string()),
    };

    Ok(Message::AddTracks { query, mode, aux })
}

/// One-line description of a playback state
pub fn describe_state(state: &PlaybackState) -> String {
    let status = if state.playing() {
        "playing"
    } else if state.empty_queue() {
        "empty queue"
    } else if state.no_media() {
        "no media"
    } else if state.error() {
        "error"
    } else {
        "paused"
    };

    let mut line = format!(
        "{} (shuffle: {}, repeat: {})",
        status,
        state.shuffle_mode(),
        state.finish_action().as_str()
    );
    if state.ducking() {
        line.push_str(" [ducking]");
    }
    line
}

fn describe_track(track: &Track) -> String {
    match (track.artist.is_empty(), track.album.is_empty()) {
        (false, false) => format!("{} - {} ({})", track.artist, track.title, track.album),
        (false, true) => format!("{} - {}", track.artist, track.title),
        _ => track.title.clone(),
    }
}

/// Render the published status
pub fn format_status(status: &Status) -> String {
    let mut out = format!("State:    {}\n", describe_state(&status.state));
    match &status.current_track {
        Some(track) => {
            let position = status.position_ms / 1000;
            out.push_str(&format!(
                "Track:    {} [{}:{:02}]\n",
                describe_track(track),
                position / 60,
                position % 60
            ));
            out.push_str(&format!(
                "Queue:    {} of {}\n",
                status.current_pos + 1,
                status.queue_len
            ));
        }
        None => out.push_str("Track:    -\n"),
    }
    out
}

/// Prints playback notifications to stdout
#[derive(Debug, Default)]
pub struct ConsoleObserver;

impl Observer for ConsoleObserver {
    fn on_state_changed(&mut self, _timestamp: Timestamp, state: PlaybackState) {
        println!("* {}", describe_state(&state));
    }

    fn on_track_changed(&mut self, _timestamp: Timestamp, track: Option<&Track>) {
        match track {
            Some(track) => println!("> {}", describe_track(track)),
            None => println!("> (nothing selected)"),
        }
    }

    fn on_active_track_replaced(&mut self, delta: i8, track: Option<&Track>) {
        trace!(
            "Slot {:+} now holds {:?}",
            delta,
            track.map(|t| t.id.as_str())
        );
    }

    fn on_timeline_changed(&mut self) {
        trace!("Timeline changed");
    }

    fn on_position_info_changed(&mut self) {
        trace!("Position info changed");
    }

    fn on_error(&mut self, _timestamp: Timestamp, message: &str) {
        println!("! {}", message);
    }

    fn on_track_played(&mut self, track: &Track) {
        debug!("Played {}", track.id);
    }

    fn on_notification_forced(&mut self) {
        println!("* playback interrupted by another player");
    }

    fn on_open_ui_requested(&mut self) {
        println!("* (double press) type 'status' for the player");
    }
}
