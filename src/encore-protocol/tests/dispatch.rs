use encore_core::{
    Backend, BackendError, BackendResult, Library, LibraryStats, PlaybackOptions, SearchField,
    Tag, TlTrack, Track, Tracklist,
};
use encore_protocol::{
    encode, Dispatcher, Notifier, Outcome, ProtocolSettings, SessionState, Subsystem,
};
use memory_backend::MemoryBackend;
use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingNotifier(Mutex<Vec<Subsystem>>);

impl Notifier for RecordingNotifier {
    fn notify(&self, subsystem: Subsystem) {
        self.0.lock().unwrap().push(subsystem);
    }
}

fn sample_tracks() -> Vec<Track> {
    vec![
        Track {
            title: Some("So What".into()),
            artist: Some("Miles Davis".into()),
            album: Some("Kind of Blue".into()),
            length_ms: Some(562_000),
            ..Track::new("local:jazz/kob/01.flac")
        },
        Track {
            title: Some("Freddie Freeloader".into()),
            artist: Some("Miles Davis".into()),
            album: Some("Kind of Blue".into()),
            length_ms: Some(589_000),
            ..Track::new("local:jazz/kob/02.flac")
        },
        Track {
            title: Some("Airbag".into()),
            artist: Some("Radiohead".into()),
            album: Some("OK Computer".into()),
            ..Track::new("local:rock/okc/01.flac")
        },
    ]
}

fn backend() -> Backend {
    MemoryBackend::builder()
        .tracks(sample_tracks())
        .image("local:jazz/kob/01.flac", (0u8..=199).collect())
        .build()
        .unwrap()
}

fn dispatcher_with(backend: Backend, settings: ProtocolSettings) -> (Dispatcher, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let settings = ProtocolSettings {
        default_playlist_scheme: "m3u".into(),
        ..settings
    };
    (Dispatcher::new(backend, settings, notifier.clone()), notifier)
}

fn dispatcher() -> Dispatcher {
    dispatcher_with(backend(), ProtocolSettings::default()).0
}

/// Sends one line and returns what would go on the wire.
fn send(dispatcher: &Dispatcher, session: &mut SessionState, line: &str) -> String {
    match dispatcher.handle_line(session, line) {
        Outcome::Respond(frames) => String::from_utf8_lossy(&encode(&frames)).into_owned(),
        other => panic!("expected a response to {line:?}, got {other:?}"),
    }
}

fn pending(dispatcher: &Dispatcher, session: &mut SessionState, line: &str) {
    assert_eq!(dispatcher.handle_line(session, line), Outcome::Pending, "{line}");
}

#[test]
fn greeting_names_protocol_version() {
    assert_eq!(Dispatcher::greeting(), "OK MPD 0.21.0");
}

#[test]
fn unknown_command_is_acked() {
    let d = dispatcher();
    let mut s = d.open_session(1);
    assert_eq!(
        send(&d, &mut s, "foobar"),
        "ACK [5@0] {foobar} unknown command \"foobar\"\n"
    );
}

#[test]
fn blank_line_reports_no_command() {
    let d = dispatcher();
    let mut s = d.open_session(1);
    assert_eq!(send(&d, &mut s, ""), "ACK [5@0] {} No command given\n");
}

#[test]
fn unterminated_quote_is_an_argument_error() {
    let d = dispatcher();
    let mut s = d.open_session(1);
    let reply = send(&d, &mut s, "find artist \"Miles");
    assert!(reply.starts_with("ACK [2@0] {find} "), "{reply}");
}

#[test]
fn wrong_arity_names_the_command() {
    let d = dispatcher();
    let mut s = d.open_session(1);
    assert_eq!(
        send(&d, &mut s, "swap 1"),
        "ACK [2@0] {swap} wrong number of arguments for \"swap\"\n"
    );
}

#[test]
fn password_gates_everything_but_exempt_commands() {
    let settings = ProtocolSettings {
        password: Some("hunter2".into()),
        ..ProtocolSettings::default()
    };
    let (d, _) = dispatcher_with(backend(), settings);
    let mut s = d.open_session(1);

    assert_eq!(
        send(&d, &mut s, "status"),
        "ACK [4@0] {status} you don't have permission for \"status\"\n"
    );
    assert_eq!(send(&d, &mut s, "ping"), "OK\n");
    assert!(send(&d, &mut s, "commands").contains("command: password\n"));
    assert_eq!(
        send(&d, &mut s, "password wrong"),
        "ACK [3@0] {password} incorrect password\n"
    );
    assert_eq!(send(&d, &mut s, "password hunter2"), "OK\n");
    assert!(send(&d, &mut s, "status").ends_with("OK\n"));
}

#[test]
fn command_list_stops_at_first_failure() {
    let d = dispatcher();
    let mut s = d.open_session(1);

    pending(&d, &mut s, "command_list_begin");
    pending(&d, &mut s, "add local:jazz/kob/01.flac");
    pending(&d, &mut s, "add local:nowhere");
    pending(&d, &mut s, "add local:jazz/kob/02.flac");
    assert_eq!(
        send(&d, &mut s, "command_list_end"),
        "ACK [50@2] {add} directory or file not found\n"
    );

    // The first add ran, the third never did.
    assert_eq!(d.backend().tracklist.length(), 1);
    assert!(!s.in_command_list());
}

#[test]
fn verbose_list_marks_each_success() {
    let d = dispatcher();
    let mut s = d.open_session(1);

    pending(&d, &mut s, "command_list_ok_begin");
    pending(&d, &mut s, "ping");
    pending(&d, &mut s, "addid local:rock/okc/01.flac");
    assert_eq!(
        send(&d, &mut s, "command_list_end"),
        "list_OK\nId: 1\nlist_OK\nOK\n"
    );
}

#[test]
fn verbose_list_failure_keeps_earlier_markers() {
    let d = dispatcher();
    let mut s = d.open_session(1);

    pending(&d, &mut s, "command_list_ok_begin");
    pending(&d, &mut s, "ping");
    pending(&d, &mut s, "bogus");
    pending(&d, &mut s, "ping");
    assert_eq!(
        send(&d, &mut s, "command_list_end"),
        "list_OK\nACK [5@2] {bogus} unknown command \"bogus\"\n"
    );
}

#[test]
fn nested_list_is_refused() {
    let d = dispatcher();
    let mut s = d.open_session(1);

    pending(&d, &mut s, "command_list_begin");
    pending(&d, &mut s, "ping");
    let reply = send(&d, &mut s, "command_list_begin");
    assert!(reply.starts_with("ACK [1@0] {command_list_begin}"), "{reply}");
    assert!(!s.in_command_list());
}

#[test]
fn idle_inside_list_is_refused() {
    let d = dispatcher();
    let mut s = d.open_session(1);

    pending(&d, &mut s, "command_list_begin");
    pending(&d, &mut s, "idle");
    assert_eq!(
        send(&d, &mut s, "command_list_end"),
        "ACK [1@1] {idle} \"idle\" is not allowed in a command list\n"
    );
}

#[test]
fn list_end_outside_list_is_unknown() {
    let d = dispatcher();
    let mut s = d.open_session(1);
    assert_eq!(
        send(&d, &mut s, "command_list_end"),
        "ACK [5@0] {command_list_end} unknown command \"command_list_end\"\n"
    );
}

#[test]
fn idle_returns_requested_subsystems() {
    let d = dispatcher();
    let mut s = d.open_session(1);

    let expected: BTreeSet<Subsystem> = [Subsystem::Player, Subsystem::Mixer].into_iter().collect();
    assert_eq!(
        d.handle_line(&mut s, "idle player mixer"),
        Outcome::Idle(expected)
    );
    assert_eq!(
        d.handle_line(&mut s, "idle"),
        Outcome::Idle(Subsystem::ALL.into_iter().collect())
    );
    assert!(send(&d, &mut s, "idle nonsense").starts_with("ACK [2@0] {idle}"));
}

#[test]
fn noidle_outside_idle_is_ok() {
    let d = dispatcher();
    let mut s = d.open_session(1);
    assert_eq!(send(&d, &mut s, "noidle"), "OK\n");
}

#[test]
fn idle_reply_lists_changes_in_order() {
    let changed: BTreeSet<Subsystem> = [Subsystem::Mixer, Subsystem::Player].into_iter().collect();
    let frames = Dispatcher::idle_reply(&changed);
    assert_eq!(
        String::from_utf8(encode(&frames)).unwrap(),
        "changed: player\nchanged: mixer\nOK\n"
    );
}

#[test]
fn close_drops_the_connection() {
    let d = dispatcher();
    let mut s = d.open_session(1);
    assert_eq!(d.handle_line(&mut s, "close"), Outcome::Close);
}

#[test]
fn status_reflects_playback() {
    let d = dispatcher();
    let mut s = d.open_session(1);

    send(&d, &mut s, "add local:jazz");
    assert_eq!(send(&d, &mut s, "play 0"), "OK\n");
    let status = send(&d, &mut s, "status");

    assert!(status.contains("state: play\n"), "{status}");
    assert!(status.contains("song: 0\nsongid: 1\n"), "{status}");
    assert!(status.contains("nextsong: 1\nnextsongid: 2\n"), "{status}");
    assert!(status.contains("playlistlength: 2\n"), "{status}");
}

#[test]
fn play_out_of_range_is_bad_song_index() {
    let d = dispatcher();
    let mut s = d.open_session(1);
    assert_eq!(
        send(&d, &mut s, "play 3"),
        "ACK [2@0] {play} Bad song index\n"
    );
}

#[test]
fn huge_positions_are_rejected_not_fatal() {
    let d = dispatcher();
    let mut s = d.open_session(1);
    send(&d, &mut s, "add local:jazz/kob/01.flac");

    for line in [
        "delete 18446744073709551615",
        "playlistinfo 18446744073709551615",
        "shuffle 18446744073709551615",
    ] {
        let reply = send(&d, &mut s, line);
        assert!(reply.starts_with("ACK [2@0]"), "{line}: {reply}");
    }
    assert_eq!(
        send(&d, &mut s, "move 0 18446744073709551615"),
        "ACK [2@0] {move} Bad song index\n"
    );
    assert_eq!(
        send(&d, &mut s, "load mix 18446744073709551615"),
        "ACK [2@0] {load} incorrect arguments\n"
    );
    assert!(send(&d, &mut s, "playlistinfo").contains("Id: 1\n"));
}

/// Appends one more entry right after every snapshot, once armed, as a
/// concurrent client would.
struct ChurningTracklist {
    inner: Arc<dyn Tracklist>,
    armed: AtomicBool,
}

impl Tracklist for ChurningTracklist {
    fn tracks(&self) -> Vec<TlTrack> {
        let snapshot = self.inner.tracks();
        if self.armed.swap(false, Ordering::SeqCst) {
            self.inner
                .add(vec![Track::new("local:rock/okc/01.flac")], None)
                .unwrap();
        }
        snapshot
    }

    fn version(&self) -> u32 {
        self.inner.version()
    }

    fn index_of(&self, tlid: u32) -> Option<usize> {
        self.inner.index_of(tlid)
    }

    fn next_tlid(&self) -> Option<u32> {
        self.inner.next_tlid()
    }

    fn add(&self, tracks: Vec<Track>, at: Option<usize>) -> BackendResult<Vec<TlTrack>> {
        self.inner.add(tracks, at)
    }

    fn remove(&self, tlids: &[u32]) -> BackendResult<Vec<TlTrack>> {
        self.inner.remove(tlids)
    }

    fn clear(&self) -> BackendResult<()> {
        self.inner.clear()
    }

    fn move_range(&self, range: Range<usize>, to: usize) -> BackendResult<()> {
        self.inner.move_range(range, to)
    }

    fn swap(&self, a: usize, b: usize) -> BackendResult<()> {
        self.inner.swap(a, b)
    }

    fn shuffle(&self, range: Option<Range<usize>>) -> BackendResult<()> {
        self.inner.shuffle(range)
    }

    fn options(&self) -> PlaybackOptions {
        self.inner.options()
    }

    fn set_options(&self, options: PlaybackOptions) -> BackendResult<()> {
        self.inner.set_options(options)
    }
}

#[test]
fn playlistid_answers_from_one_snapshot() {
    let mut backend = backend();
    let churn = Arc::new(ChurningTracklist {
        inner: Arc::clone(&backend.tracklist),
        armed: AtomicBool::new(false),
    });
    backend.tracklist = churn.clone();
    let (d, _) = dispatcher_with(backend, ProtocolSettings::default());
    let mut s = d.open_session(1);
    send(&d, &mut s, "add local:jazz");

    churn.armed.store(true, Ordering::SeqCst);
    assert_eq!(
        send(&d, &mut s, "playlistid 3"),
        "ACK [50@0] {playlistid} No such song\n"
    );
    let found = send(&d, &mut s, "playlistid 3");
    assert!(found.contains("Pos: 2\nId: 3\n"), "{found}");
}

#[test]
fn tagtypes_limit_song_output() {
    let d = dispatcher();
    let mut s = d.open_session(1);
    send(&d, &mut s, "add local:jazz/kob/01.flac");

    assert_eq!(send(&d, &mut s, "tagtypes clear"), "OK\n");
    assert_eq!(send(&d, &mut s, "tagtypes enable Artist"), "OK\n");
    let info = send(&d, &mut s, "playlistinfo");

    assert!(info.contains("Artist: Miles Davis\n"), "{info}");
    assert!(!info.contains("Title:"), "{info}");
    assert!(info.contains("Pos: 0\nId: 1\n"), "{info}");
    assert_eq!(
        send(&d, &mut s, "tagtypes enable Bogus"),
        "ACK [2@0] {tagtypes} Unknown tag type\n"
    );
}

#[test]
fn albumart_is_served_in_chunks() {
    let d = dispatcher();
    let mut s = d.open_session(1);
    send(&d, &mut s, "binarylimit 64");

    let frames = match d.handle_line(&mut s, "albumart local:jazz/kob/01.flac 128") {
        Outcome::Respond(frames) => encode(&frames),
        other => panic!("unexpected {other:?}"),
    };
    let mut expected = b"size: 200\nbinary: 64\n".to_vec();
    expected.extend(128u8..192);
    expected.extend_from_slice(b"\nOK\n");
    assert_eq!(frames, expected);

    assert_eq!(
        send(&d, &mut s, "albumart local:jazz/kob/01.flac 201"),
        "ACK [2@0] {albumart} Bad file offset\n"
    );
    assert_eq!(
        send(&d, &mut s, "albumart local:rock/okc/01.flac 0"),
        "ACK [50@0] {albumart} No file exists\n"
    );
    assert_eq!(send(&d, &mut s, "readpicture local:rock/okc/01.flac 0"), "OK\n");
}

#[test]
fn binarylimit_has_a_floor() {
    let d = dispatcher();
    let mut s = d.open_session(1);
    assert_eq!(
        send(&d, &mut s, "binarylimit 10"),
        "ACK [2@0] {binarylimit} Value too small, minimum is 64\n"
    );
}

#[test]
fn find_and_list_query_the_library() {
    let d = dispatcher();
    let mut s = d.open_session(1);

    let found = send(&d, &mut s, "find artist \"Miles Davis\"");
    assert_eq!(found.matches("file: ").count(), 2, "{found}");
    assert_eq!(
        send(&d, &mut s, "list album"),
        "Album: Kind of Blue\nAlbum: OK Computer\nOK\n"
    );
    assert_eq!(
        send(&d, &mut s, "find bogus x"),
        "ACK [2@0] {find} Unknown filter type\n"
    );
}

#[test]
fn stored_playlist_lifecycle() {
    let d = dispatcher();
    let mut s = d.open_session(1);

    assert_eq!(send(&d, &mut s, "playlistadd mix local:rock/okc/01.flac"), "OK\n");
    assert_eq!(send(&d, &mut s, "listplaylist mix"), "file: local:rock/okc/01.flac\nOK\n");
    assert!(send(&d, &mut s, "listplaylists").starts_with("playlist: mix\nLast-Modified: "));

    send(&d, &mut s, "add local:jazz");
    assert_eq!(
        send(&d, &mut s, "save mix"),
        "ACK [56@0] {save} Playlist already exists\n"
    );
    assert_eq!(send(&d, &mut s, "rename mix evening"), "OK\n");
    assert_eq!(
        send(&d, &mut s, "listplaylist mix"),
        "ACK [50@0] {listplaylist} No such playlist\n"
    );
    assert_eq!(send(&d, &mut s, "rm evening"), "OK\n");
    assert_eq!(send(&d, &mut s, "listplaylists"), "OK\n");
}

#[test]
fn playlist_names_with_slashes_are_rejected() {
    let d = dispatcher();
    let mut s = d.open_session(1);
    let reply = send(&d, &mut s, "save a/b");
    assert!(reply.starts_with("ACK [2@0] {save} playlist name is invalid"), "{reply}");
}

struct BusyLibrary;

impl Library for BusyLibrary {
    fn lookup(&self, _uri: &str) -> BackendResult<Vec<Track>> {
        Ok(Vec::new())
    }

    fn search(&self, _query: &[(SearchField, String)], _exact: bool) -> BackendResult<Vec<Track>> {
        Ok(Vec::new())
    }

    fn distinct(&self, _tag: Tag, _query: &[(SearchField, String)]) -> BackendResult<Vec<String>> {
        Ok(Vec::new())
    }

    fn image(&self, _uri: &str) -> BackendResult<Option<Vec<u8>>> {
        Ok(None)
    }

    fn refresh(&self, _uri: Option<&str>) -> BackendResult<u32> {
        Err(BackendError::UpdateInProgress)
    }

    fn stats(&self) -> LibraryStats {
        LibraryStats::default()
    }

    fn uri_schemes(&self) -> Vec<String> {
        Vec::new()
    }
}

#[test]
fn concurrent_update_is_reported() {
    let mut backend = backend();
    backend.library = Arc::new(BusyLibrary);
    let (d, _) = dispatcher_with(backend, ProtocolSettings::default());
    let mut s = d.open_session(1);
    assert_eq!(
        send(&d, &mut s, "update"),
        "ACK [54@0] {update} already updating\n"
    );
}

#[test]
fn update_returns_job_id() {
    let d = dispatcher();
    let mut s = d.open_session(1);
    assert_eq!(send(&d, &mut s, "update"), "updating_db: 1\nOK\n");
}

#[test]
fn blacklisted_commands_look_unknown() {
    let settings = ProtocolSettings {
        command_blacklist: vec!["listall".into(), "update".into()],
        ..ProtocolSettings::default()
    };
    let (d, _) = dispatcher_with(backend(), settings);
    let mut s = d.open_session(1);
    assert_eq!(
        send(&d, &mut s, "update"),
        "ACK [5@0] {update} unknown command \"update\"\n"
    );
}

#[test]
fn channel_messages_reach_subscribers() {
    let (d, notifier) = dispatcher_with(backend(), ProtocolSettings::default());
    let mut alice = d.open_session(1);
    let mut bob = d.open_session(2);

    assert_eq!(send(&d, &mut alice, "subscribe lobby"), "OK\n");
    assert_eq!(
        send(&d, &mut bob, "sendmessage nowhere hi"),
        "ACK [50@0] {sendmessage} nobody is subscribed to this channel\n"
    );
    assert_eq!(send(&d, &mut bob, "sendmessage lobby hi"), "OK\n");
    assert_eq!(
        send(&d, &mut alice, "readmessages"),
        "channel: lobby\nmessage: hi\nOK\n"
    );
    assert_eq!(send(&d, &mut bob, "channels"), "channel: lobby\nOK\n");

    let seen = notifier.0.lock().unwrap();
    assert!(seen.contains(&Subsystem::Subscription));
    assert!(seen.contains(&Subsystem::Message));
}

#[test]
fn only_default_partition_exists() {
    let d = dispatcher();
    let mut s = d.open_session(1);
    assert_eq!(send(&d, &mut s, "partition default"), "OK\n");
    assert_eq!(
        send(&d, &mut s, "partition other"),
        "ACK [50@0] {partition} partition does not exist\n"
    );
    assert_eq!(send(&d, &mut s, "listpartitions"), "partition: default\nOK\n");
}

#[test]
fn unread_messages_are_capped() {
    let d = dispatcher();
    let mut reader = d.open_session(1);
    let mut writer = d.open_session(2);
    send(&d, &mut reader, "subscribe lobby");

    for n in 0..64 {
        assert_eq!(send(&d, &mut writer, &format!("sendmessage lobby m{n}")), "OK\n");
    }
    assert_eq!(
        send(&d, &mut writer, "sendmessage lobby one-too-many"),
        "ACK [52@0] {sendmessage} message queue is full\n"
    );
    let unread = send(&d, &mut reader, "readmessages");
    assert_eq!(unread.matches("message: ").count(), 64);
    assert_eq!(send(&d, &mut writer, "sendmessage lobby fresh"), "OK\n");
}

#[test]
fn known_but_unsupported_commands_say_so() {
    let d = dispatcher();
    let mut s = d.open_session(1);
    for (line, name) in [
        ("prio 1 0:", "prio"),
        ("prioid 1 1", "prioid"),
        ("rangeid 1 0:", "rangeid"),
        ("addtagid 1 artist x", "addtagid"),
        ("cleartagid 1 artist", "cleartagid"),
        ("sticker list song local:jazz/kob/01.flac", "sticker"),
        ("mount foo nfs://host/export", "mount"),
        ("unmount foo", "unmount"),
        ("listmounts", "listmounts"),
        ("listneighbors", "listneighbors"),
    ] {
        assert_eq!(
            send(&d, &mut s, line),
            format!("ACK [0@0] {{{name}}} Not implemented\n"),
            "{line}"
        );
    }
    assert_eq!(
        send(&d, &mut s, "mount foo"),
        "ACK [2@0] {mount} wrong number of arguments for \"mount\"\n"
    );
}

#[test]
fn filter_expressions_query_the_library() {
    let d = dispatcher();
    let mut s = d.open_session(1);

    let found = send(&d, &mut s, r#"find "(artist == \"Miles Davis\")""#);
    assert_eq!(found.matches("file: ").count(), 2, "{found}");
    let found = send(&d, &mut s, r#"search "(album contains 'blue')""#);
    assert_eq!(found.matches("file: ").count(), 2, "{found}");
    let found = send(
        &d,
        &mut s,
        r#"find "((artist == 'Miles Davis') AND (title != 'So What'))""#,
    );
    assert_eq!(found.matches("file: ").count(), 1, "{found}");
    assert!(found.starts_with("file: local:jazz/kob/02.flac\n"), "{found}");
    assert_eq!(
        send(&d, &mut s, r#"count "(artist != 'Miles Davis')""#),
        "songs: 1\nplaytime: 0\nOK\n"
    );
    assert_eq!(
        send(&d, &mut s, r#"list album "(artist == 'Radiohead')""#),
        "Album: OK Computer\nOK\n"
    );
    assert_eq!(send(&d, &mut s, r#"findadd "(base 'local:jazz')""#), "OK\n");
    let queued = send(&d, &mut s, r#"playlistsearch "(title contains 'what')""#);
    assert_eq!(queued.matches("file: ").count(), 1, "{queued}");

    assert_eq!(
        send(&d, &mut s, r#"find "(artist == 'x'""#),
        "ACK [2@0] {find} incomplete filter expression\n"
    );
    assert_eq!(
        send(&d, &mut s, r#"search "artist == 'x')""#),
        "ACK [2@0] {search} incorrect arguments\n"
    );
    assert_eq!(
        send(&d, &mut s, r#"find "(artist ~~ 'x')""#),
        "ACK [2@0] {find} invalid operator\n"
    );
}
