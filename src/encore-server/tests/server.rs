use encore_core::{Backend, Track};
use encore_protocol::ProtocolSettings;
use encore_server::{ListenAddr, Server, ServerSettings, Shared};
use memory_backend::MemoryBackend;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    server: JoinHandle<()>,
}

impl Harness {
    async fn start(settings: ServerSettings, protocol: ProtocolSettings) -> Self {
        let shared = Arc::new(Shared::new(backend(), protocol, settings.connection_timeout));
        let server = Server::bind(&settings, shared).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (shutdown, rx) = watch::channel(false);
        let server = tokio::spawn(async move {
            server.run(rx).await.unwrap();
        });
        Self {
            addr,
            shutdown,
            server,
        }
    }

    async fn with_defaults() -> Self {
        Self::start(settings(20, Duration::from_secs(60)), ProtocolSettings::default()).await
    }

    async fn connect(&self) -> Client {
        let mut client = Client::open(self.addr).await;
        assert_eq!(client.line().await.as_deref(), Some("OK MPD 0.21.0"));
        client
    }

    async fn stop(self) {
        self.shutdown.send(true).unwrap();
        timeout(WAIT, self.server).await.unwrap().unwrap();
    }
}

fn settings(max_connections: usize, connection_timeout: Duration) -> ServerSettings {
    ServerSettings {
        listen: ListenAddr::tcp("127.0.0.1", 0),
        max_connections,
        connection_timeout,
    }
}

fn backend() -> Backend {
    MemoryBackend::builder()
        .tracks([
            Track {
                title: Some("Paranoid Android".into()),
                artist: Some("Radiohead".into()),
                length_ms: Some(383_000),
                ..Track::new("local:okc/02.flac")
            },
            Track::new("local:okc/03.flac"),
        ])
        .image("local:okc/02.flac", vec![7; 100])
        .build()
        .unwrap()
}

struct Client {
    reader: BufReader<TcpStream>,
}

impl Client {
    async fn open(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        Self {
            reader: BufReader::new(stream),
        }
    }

    /// Next line without its terminator, or `None` once the server hangs up.
    async fn line(&mut self) -> Option<String> {
        let mut line = String::new();
        let read = timeout(WAIT, self.reader.read_line(&mut line))
            .await
            .expect("server went quiet")
            .ok()?;
        if read == 0 {
            return None;
        }
        Some(line.trim_end_matches('\n').to_string())
    }

    async fn send(&mut self, line: &str) {
        let stream = self.reader.get_mut();
        stream.write_all(line.as_bytes()).await.unwrap();
        stream.write_all(b"\n").await.unwrap();
    }

    /// Reads up to and including the closing `OK` or `ACK` line.
    async fn reply(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = self.line().await {
            let done = line == "OK" || line.starts_with("ACK ");
            lines.push(line);
            if done {
                break;
            }
        }
        lines
    }

    async fn command(&mut self, line: &str) -> Vec<String> {
        self.send(line).await;
        self.reply().await
    }

    async fn is_closed(&mut self) -> bool {
        self.line().await.is_none()
    }
}

#[tokio::test]
async fn ping_round_trip() {
    let harness = Harness::with_defaults().await;
    let mut client = harness.connect().await;
    assert_eq!(client.command("ping").await, vec!["OK"]);
    harness.stop().await;
}

#[tokio::test]
async fn idle_wakes_on_change_from_another_client() {
    let harness = Harness::with_defaults().await;
    let mut watcher = harness.connect().await;
    let mut actor = harness.connect().await;

    watcher.send("idle player").await;
    assert_eq!(actor.command("add local:okc").await, vec!["OK"]);
    assert_eq!(actor.command("play 0").await, vec!["OK"]);

    assert_eq!(watcher.reply().await, vec!["changed: player", "OK"]);
    harness.stop().await;
}

#[tokio::test]
async fn changes_while_busy_are_delivered_on_next_idle() {
    let harness = Harness::with_defaults().await;
    let mut watcher = harness.connect().await;
    let mut actor = harness.connect().await;

    assert_eq!(actor.command("setvol 30").await, vec!["OK"]);
    assert_eq!(
        watcher.command("idle mixer playlist").await,
        vec!["changed: mixer", "OK"]
    );
    harness.stop().await;
}

#[tokio::test]
async fn noidle_ends_idle_without_changes() {
    let harness = Harness::with_defaults().await;
    let mut client = harness.connect().await;

    client.send("idle").await;
    assert_eq!(client.command("noidle").await, vec!["OK"]);
    assert_eq!(client.command("ping").await, vec!["OK"]);
    harness.stop().await;
}

#[tokio::test]
async fn other_command_while_idle_closes_connection() {
    let harness = Harness::with_defaults().await;
    let mut client = harness.connect().await;

    client.send("idle").await;
    client.send("status").await;
    assert!(client.is_closed().await);
    harness.stop().await;
}

#[tokio::test]
async fn connection_ceiling_refuses_extra_clients() {
    let harness = Harness::start(settings(1, Duration::from_secs(60)), ProtocolSettings::default()).await;
    let mut first = harness.connect().await;

    let mut second = Client::open(harness.addr).await;
    assert!(second.is_closed().await);

    assert_eq!(first.command("ping").await, vec!["OK"]);
    drop(first);

    // The slot frees up once the first session has gone.
    let mut third = None;
    for _ in 0..50 {
        let mut candidate = Client::open(harness.addr).await;
        if candidate.line().await.as_deref() == Some("OK MPD 0.21.0") {
            third = Some(candidate);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(third.is_some(), "slot was never released");
    harness.stop().await;
}

#[tokio::test]
async fn silent_client_is_dropped() {
    let harness = Harness::start(settings(5, Duration::from_millis(300)), ProtocolSettings::default()).await;
    let mut client = harness.connect().await;
    assert!(client.is_closed().await);
    harness.stop().await;
}

#[tokio::test]
async fn idle_client_outlives_the_timeout() {
    let harness = Harness::start(settings(5, Duration::from_millis(300)), ProtocolSettings::default()).await;
    let mut client = harness.connect().await;

    client.send("idle").await;
    tokio::time::sleep(Duration::from_millis(900)).await;
    assert_eq!(client.command("noidle").await, vec!["OK"]);
    harness.stop().await;
}

#[tokio::test]
async fn password_unlocks_commands() {
    let protocol = ProtocolSettings {
        password: Some("secret".into()),
        ..ProtocolSettings::default()
    };
    let harness = Harness::start(settings(5, Duration::from_secs(60)), protocol).await;
    let mut client = harness.connect().await;

    assert_eq!(
        client.command("currentsong").await,
        vec!["ACK [4@0] {currentsong} you don't have permission for \"currentsong\""]
    );
    assert_eq!(client.command("password secret").await, vec!["OK"]);
    assert_eq!(client.command("currentsong").await, vec!["OK"]);
    harness.stop().await;
}

#[tokio::test]
async fn command_list_over_the_wire() {
    let harness = Harness::with_defaults().await;
    let mut client = harness.connect().await;

    client.send("command_list_ok_begin").await;
    client.send("add local:okc/02.flac").await;
    client.send("status").await;
    client.send("command_list_end").await;

    let reply = client.reply().await;
    assert_eq!(reply[0], "list_OK");
    assert!(reply.contains(&"playlistlength: 1".to_string()));
    assert_eq!(&reply[reply.len() - 2..], ["list_OK", "OK"]);
    harness.stop().await;
}

#[tokio::test]
async fn albumart_payload_is_raw_bytes() {
    let harness = Harness::with_defaults().await;
    let mut client = harness.connect().await;

    client.send("albumart local:okc/02.flac 0").await;
    assert_eq!(client.line().await.as_deref(), Some("size: 100"));
    assert_eq!(client.line().await.as_deref(), Some("binary: 100"));
    let mut payload = vec![0u8; 101];
    client.reader.read_exact(&mut payload).await.unwrap();
    assert_eq!(&payload[..100], &[7u8; 100][..]);
    assert_eq!(payload[100], b'\n');
    assert_eq!(client.line().await.as_deref(), Some("OK"));
    harness.stop().await;
}

#[tokio::test]
async fn http_request_is_dropped() {
    let harness = Harness::with_defaults().await;
    let mut client = harness.connect().await;
    client.send("GET / HTTP/1.1").await;
    assert!(client.is_closed().await);
    harness.stop().await;
}

#[tokio::test]
async fn shutdown_closes_open_sessions() {
    let harness = Harness::with_defaults().await;
    let mut client = harness.connect().await;
    client.send("idle").await;

    let Harness {
        shutdown, server, ..
    } = harness;
    shutdown.send(true).unwrap();
    timeout(WAIT, server).await.unwrap().unwrap();
    assert!(client.is_closed().await);
}
