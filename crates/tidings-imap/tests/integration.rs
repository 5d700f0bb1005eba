//! Integration tests for the command engine.
//!
//! A small session loop routes replies from an in-memory fake server to the
//! commands it sent, the way a real connection would.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{
    AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use tidings_imap::{
    Command, CommandConfig, CommandState, ContinuationResponse, Error, Literal, ResponseCode,
    Serializer, ServerData, Status, StatusResponse, StreamSerializer, Tag, TagGenerator,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("tidings_imap=debug")
        .try_init();
}

/// Commands sent but not yet completed, in issuance order.
#[derive(Clone, Default)]
struct Pending(Arc<Mutex<Vec<Command>>>);

impl Pending {
    fn push(&self, cmd: Command) {
        self.0.lock().unwrap().push(cmd);
    }

    fn current(&self) -> Option<Command> {
        self.0.lock().unwrap().last().cloned()
    }

    fn take(&self, tag: &Tag) -> Option<Command> {
        let mut pending = self.0.lock().unwrap();
        let index = pending.iter().position(|cmd| cmd.tag() == tag)?;
        Some(pending.remove(index))
    }

    fn drain(&self) -> Vec<Command> {
        self.0.lock().unwrap().drain(..).collect()
    }
}

struct Session {
    wire: StreamSerializer<WriteHalf<DuplexStream>>,
    tags: TagGenerator,
    pending: Pending,
    cancel: CancellationToken,
    reader: JoinHandle<()>,
}

impl Session {
    fn connect(stream: DuplexStream) -> Self {
        let (read, write) = tokio::io::split(stream);
        let pending = Pending::default();
        let reader = tokio::spawn(dispatch(BufReader::new(read), pending.clone()));
        Self {
            wire: StreamSerializer::new(write),
            tags: TagGenerator::new('t'),
            pending,
            cancel: CancellationToken::new(),
            reader,
        }
    }

    async fn run(&mut self, cmd: &Command) -> tidings_imap::Result<()> {
        cmd.assign_tag(self.tags.next())?;
        self.pending.push(cmd.clone());
        cmd.send(&mut self.wire, &self.cancel).await?;
        self.wire.flush().await?;
        cmd.send_wait(&mut self.wire, &self.cancel).await?;
        cmd.wait_until_complete(&self.cancel).await
    }
}

/// Reads server lines and hands each one to the command it belongs to.
async fn dispatch(mut reader: BufReader<ReadHalf<DuplexStream>>, pending: Pending) {
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = line.trim_end();

        if let Some(text) = line.strip_prefix('+') {
            if let Some(cmd) = pending.current() {
                let _ = cmd.continuation_requested(&ContinuationResponse::new(text.trim()));
            }
        } else if let Some(data) = line.strip_prefix("* ") {
            if let Some(cmd) = pending.current() {
                let _ = cmd.data_received(&ServerData::new(data));
            }
        } else if let Some(status) = parse_status(line) {
            if let Some(cmd) = pending.take(&status.tag) {
                let _ = cmd.completed(status);
            }
        }
    }
    for cmd in pending.drain() {
        cmd.disconnected("connection closed by server");
    }
}

fn parse_status(line: &str) -> Option<StatusResponse> {
    let (tag, rest) = line.split_once(' ')?;
    let (status, rest) = rest.split_once(' ').unwrap_or((rest, ""));
    let mut response = StatusResponse::new(Tag::new(tag), Status::parse(status)?);
    let mut text = rest.trim();
    if text.starts_with('[') {
        if let Some(end) = text.find(']') {
            response = response.with_code(ResponseCode::parse(&text[..=end]));
            text = text[end + 1..].trim();
        }
    }
    if !text.is_empty() {
        response = response.with_text(text);
    }
    Some(response)
}

/// Answers requests from a fixed script and returns everything it received.
async fn fake_server(stream: DuplexStream) -> Vec<String> {
    let (read, mut write) = tokio::io::split(stream);
    let mut read = BufReader::new(read);
    let mut transcript = Vec::new();
    let mut line = String::new();

    loop {
        line.clear();
        if read.read_line(&mut line).await.unwrap_or(0) == 0 {
            break;
        }
        let request = line.trim_end().to_string();
        transcript.push(request.clone());

        let mut words = request.splitn(3, ' ');
        let tag = words.next().unwrap_or_default();
        let verb = words.next().unwrap_or_default();
        let rest = words.next().unwrap_or_default();

        let reply = match verb {
            "LOGIN" if rest == "alice secret" => format!("{tag} OK LOGIN completed\r\n"),
            "LOGIN" => format!("{tag} NO [AUTHENTICATIONFAILED] Invalid credentials\r\n"),
            "SELECT" => format!(
                "* 3 EXISTS\r\n* 0 RECENT\r\n{tag} OK [READ-WRITE] SELECT completed\r\n"
            ),
            "CREATE" => format!("{tag} NO [ALREADYEXISTS] Mailbox exists\r\n"),
            "APPEND" => {
                let len: usize = rest
                    .rsplit_once('{')
                    .and_then(|(_, n)| n.strip_suffix('}'))
                    .and_then(|n| n.parse().ok())
                    .unwrap();
                write.write_all(b"+ Ready for literal data\r\n").await.unwrap();
                let mut body = vec![0_u8; len + 2];
                read.read_exact(&mut body).await.unwrap();
                transcript.push(String::from_utf8_lossy(&body[..len]).into_owned());
                format!("{tag} OK APPEND completed\r\n")
            }
            // Never answered.
            "NOOP" => continue,
            "HANGUP" => break,
            "LOGOUT" => {
                write
                    .write_all(format!("* BYE logging out\r\n{tag} OK LOGOUT completed\r\n").as_bytes())
                    .await
                    .unwrap();
                break;
            }
            _ => format!("{tag} BAD Unknown command\r\n"),
        };
        write.write_all(reply.as_bytes()).await.unwrap();
    }
    transcript
}

#[tokio::test]
async fn test_session_flow() {
    init_tracing();
    let (client, server) = tokio::io::duplex(8192);
    let server = tokio::spawn(fake_server(server));
    let mut session = Session::connect(client);

    let login = Command::login("alice", "secret");
    session.run(&login).await.unwrap();
    assert_eq!(login.state(), CommandState::Completed);

    let select = Command::select("INBOX");
    session.run(&select).await.unwrap();
    let status = select.status().unwrap();
    assert_eq!(status.code, Some(ResponseCode::ReadWrite));
    assert_eq!(status.text(), "SELECT completed");

    let message = "From: alice@example.com\r\nSubject: hi\r\n\r\nHello!\r\n";
    let append = Command::append("INBOX", &["\\Seen"], Literal::new(message));
    session.run(&append).await.unwrap();

    let logout = Command::logout();
    session.run(&logout).await.unwrap();

    let transcript = server.await.unwrap();
    assert_eq!(
        transcript,
        vec![
            "t0000 LOGIN alice secret".to_string(),
            "t0001 SELECT INBOX".to_string(),
            format!("t0002 APPEND INBOX (\\Seen) {{{}}}", message.len()),
            message.to_string(),
            "t0003 LOGOUT".to_string(),
        ]
    );
    session.reader.await.unwrap();
}

#[tokio::test]
async fn test_rejected_login() {
    init_tracing();
    let (client, server) = tokio::io::duplex(8192);
    let _server = tokio::spawn(fake_server(server));
    let mut session = Session::connect(client);

    let login = Command::login("alice", "wrong");
    let err = session.run(&login).await.unwrap_err();
    assert!(matches!(err, Error::Unauthenticated(_)));
    assert!(matches!(login.throw_on_error(), Err(Error::Unauthenticated(_))));
}

#[tokio::test]
async fn test_classified_and_bad_replies() {
    init_tracing();
    let (client, server) = tokio::io::duplex(8192);
    let _server = tokio::spawn(fake_server(server));
    let mut session = Session::connect(client);

    let create = Command::new("CREATE", ["Archive".into()]);
    assert!(matches!(session.run(&create).await, Err(Error::Server(_))));
    assert_eq!(create.status().unwrap().code, Some(ResponseCode::AlreadyExists));

    let bogus = Command::new("FROB", []);
    assert!(matches!(session.run(&bogus).await, Err(Error::Server(_))));
}

#[tokio::test]
async fn test_server_hangup_disconnects_command() {
    init_tracing();
    let (client, server) = tokio::io::duplex(8192);
    let _server = tokio::spawn(fake_server(server));
    let mut session = Session::connect(client);

    let hangup = Command::new("HANGUP", []);
    let err = session.run(&hangup).await.unwrap_err();
    assert!(matches!(err, Error::NotConnected(_)));
    assert!(err.is_unavailable());
    assert_eq!(hangup.state(), CommandState::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_silent_server_times_out() {
    init_tracing();
    let (client, server) = tokio::io::duplex(8192);
    let _server = tokio::spawn(fake_server(server));
    let mut session = Session::connect(client);

    let config = CommandConfig::builder()
        .response_timeout(Duration::from_secs(10))
        .build();
    let noop = Command::with_config("NOOP", [], &config);
    let err = session.run(&noop).await.unwrap_err();
    assert!(matches!(err, Error::Timeout(after) if after == Duration::from_secs(10)));
    assert_eq!(noop.state(), CommandState::TimedOut);
}
