//! The controller session: owns the block list and a cursor over it,
//! drives the agent one action block at a time, and survives connection
//! loss without losing its place.
//!
//! Narration and pause blocks are controller-local and never touch the
//! network. An action block becomes one `Execute` frame whose ack is
//! awaited under a deadline; every failure mode maps onto a
//! [`StepOutcome`] so the UI can decide what to do, and the cursor only
//! moves on success.

use cm_blocks::{Block, BlockKind, group};
use cm_protocol::{AckStatus, FrameBuffer, Message, read_message, write_message};
use cm_script::{FrontMatter, Script};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::{Duration, timeout};
use tracing::{debug, info, warn};

/// Default deadline for an `Execute` ack.
pub const ACK_DEADLINE: Duration = Duration::from_secs(30);

/// What one `step()` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The action block ran on the agent; the cursor advanced.
    Executed,
    /// A pause block was consumed; the caller honors the timeout.
    Paused(Option<u64>),
    /// A narration block was consumed locally.
    NarrationOnly,
    /// The cursor is past the last block.
    Finished,
    /// The agent reported a failure; the cursor did not move.
    AgentError(String),
    /// The socket died or the ack deadline passed; the cursor did not
    /// move and the connection was dropped.
    ConnectionLost,
}

#[derive(Debug, Error)]
#[error("failed to connect to agent at {addr}: {source}")]
pub struct ConnectError {
    pub addr: String,
    #[source]
    pub source: std::io::Error,
}

struct Connection {
    stream: TcpStream,
    frames: FrameBuffer,
}

pub struct Presenter {
    blocks: Vec<Block>,
    current: usize,
    front_matter: FrontMatter,
    agent_addr: String,
    connection: Option<Connection>,
    ack_deadline: Duration,
}

impl Presenter {
    /// Groups the parsed script once; the block list is immutable from
    /// here on.
    pub fn new(script: &Script, agent_addr: impl Into<String>) -> Self {
        Self {
            blocks: group(script),
            current: 0,
            front_matter: script.front_matter.clone(),
            agent_addr: agent_addr.into(),
            connection: None,
            ack_deadline: ACK_DEADLINE,
        }
    }

    /// Tests shorten the ack deadline; production keeps the default.
    pub fn with_ack_deadline(mut self, deadline: Duration) -> Self {
        self.ack_deadline = deadline;
        self
    }

    pub fn front_matter(&self) -> &FrontMatter {
        &self.front_matter
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// `(current, len)` for progress display.
    pub fn progress(&self) -> (usize, usize) {
        (self.current, self.blocks.len())
    }

    /// The block the next `step()` will act on, if any remain.
    pub fn current_block(&self) -> Option<&Block> {
        self.blocks.get(self.current)
    }

    /// Establishes the TCP link. Failure is recoverable; callers retry at
    /// will and the cursor is untouched either way.
    pub async fn connect(&mut self) -> Result<(), ConnectError> {
        let stream = TcpStream::connect(&self.agent_addr)
            .await
            .map_err(|source| ConnectError {
                addr: self.agent_addr.clone(),
                source,
            })?;
        info!(target: "presenter.session", addr = self.agent_addr.as_str(), "agent_connected");
        self.connection = Some(Connection {
            stream,
            frames: FrameBuffer::new(),
        });
        Ok(())
    }

    /// Steps back one block. Nothing is un-executed; re-triggering is the
    /// presenter's call.
    pub fn go_back(&mut self) {
        if self.current > 0 {
            self.current -= 1;
        }
    }

    /// Advances through the current block per its kind.
    pub async fn step(&mut self) -> StepOutcome {
        let Some(block) = self.blocks.get(self.current) else {
            return StepOutcome::Finished;
        };
        match block.kind {
            BlockKind::NarrationOnly => {
                self.current += 1;
                StepOutcome::NarrationOnly
            }
            BlockKind::Pause(timeout_secs) => {
                self.current += 1;
                StepOutcome::Paused(timeout_secs)
            }
            BlockKind::Action => self.step_action().await,
        }
    }

    async fn step_action(&mut self) -> StepOutcome {
        let message = Message::Execute {
            actions: self.blocks[self.current].actions.clone(),
            typing_speed: self.front_matter.typing_speed_ms,
            typing_variance: self.front_matter.typing_variance_ms,
        };

        let Some(conn) = self.connection.as_mut() else {
            warn!(target: "presenter.session", "step_without_connection");
            return StepOutcome::ConnectionLost;
        };

        if let Err(err) = write_message(&mut conn.stream, &message).await {
            warn!(target: "presenter.session", %err, "execute_write_failed");
            self.connection = None;
            return StepOutcome::ConnectionLost;
        }
        debug!(target: "presenter.session", block = self.current, "execute_sent");

        let ack = timeout(
            self.ack_deadline,
            read_message(&mut conn.stream, &mut conn.frames),
        )
        .await;

        match ack {
            Err(_elapsed) => {
                warn!(target: "presenter.session", block = self.current, "ack_deadline_exceeded");
                self.connection = None;
                StepOutcome::ConnectionLost
            }
            Ok(Err(err)) => {
                warn!(target: "presenter.session", %err, "ack_read_failed");
                self.connection = None;
                StepOutcome::ConnectionLost
            }
            Ok(Ok(None)) => {
                warn!(target: "presenter.session", "agent_hung_up");
                self.connection = None;
                StepOutcome::ConnectionLost
            }
            Ok(Ok(Some(Message::Ack {
                status: AckStatus::Ok,
                ..
            }))) => {
                self.current += 1;
                StepOutcome::Executed
            }
            Ok(Ok(Some(Message::Ack {
                status: AckStatus::Error,
                message,
            }))) => {
                let detail =
                    message.unwrap_or_else(|| "agent reported an unspecified failure".to_string());
                warn!(target: "presenter.session", detail = detail.as_str(), "agent_error");
                StepOutcome::AgentError(detail)
            }
            Ok(Ok(Some(other))) => {
                warn!(target: "presenter.session", kind = ?other, "unexpected_reply");
                self.connection = None;
                StepOutcome::ConnectionLost
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cm_script::{Directive, parse_script};
    use tokio::net::TcpListener;

    const SCRIPT: &str = "[SAY] Hello\n[PAUSE] 2\n[FOCUS] Terminal\n[TYPE] ls\n[RUN]\n[PAUSE]";

    fn presenter_for(text: &str, addr: std::net::SocketAddr) -> Presenter {
        let script = parse_script(text).expect("script parses");
        Presenter::new(&script, addr.to_string())
            .with_ack_deadline(Duration::from_millis(500))
    }

    /// A scripted fake agent: accepts one connection and answers each
    /// inbound Execute with the queued replies, recording what it saw.
    async fn fake_agent(
        replies: Vec<Message>,
    ) -> (
        std::net::SocketAddr,
        tokio::task::JoinHandle<Vec<Message>>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let handle = tokio::spawn(async move {
            let mut seen = Vec::new();
            let (mut stream, _) = listener.accept().await.expect("accept");
            let mut frames = FrameBuffer::new();
            for reply in replies {
                match read_message(&mut stream, &mut frames).await {
                    Ok(Some(message)) => {
                        seen.push(message);
                        write_message(&mut stream, &reply).await.expect("reply");
                    }
                    _ => break,
                }
            }
            seen
        });
        (addr, handle)
    }

    fn ok_ack() -> Message {
        Message::Ack {
            status: AckStatus::Ok,
            message: None,
        }
    }

    #[tokio::test]
    async fn empty_script_finishes_immediately() {
        let script = parse_script("").unwrap();
        let mut presenter = Presenter::new(&script, "127.0.0.1:1");
        assert_eq!(presenter.step().await, StepOutcome::Finished);
        assert_eq!(presenter.progress(), (0, 0));
    }

    #[tokio::test]
    async fn narration_and_pause_steps_send_nothing() {
        // No agent exists at this address; narration and pause must not care.
        let script = parse_script("[PAUSE] 3\n[SAY] Hello").unwrap();
        let mut presenter = Presenter::new(&script, "127.0.0.1:1");
        assert_eq!(presenter.step().await, StepOutcome::Paused(Some(3)));
        assert_eq!(presenter.step().await, StepOutcome::NarrationOnly);
        assert_eq!(presenter.step().await, StepOutcome::Finished);
    }

    #[tokio::test]
    async fn action_block_executes_and_advances() {
        let (addr, agent) = fake_agent(vec![ok_ack()]).await;
        let mut presenter = presenter_for(SCRIPT, addr);
        presenter.connect().await.expect("connect");

        assert_eq!(presenter.step().await, StepOutcome::Paused(Some(2)));
        assert_eq!(presenter.step().await, StepOutcome::Executed);
        assert_eq!(presenter.step().await, StepOutcome::Paused(None));
        assert_eq!(presenter.step().await, StepOutcome::Finished);

        let seen = agent.await.expect("agent task");
        assert_eq!(seen.len(), 1);
        match &seen[0] {
            Message::Execute {
                actions,
                typing_speed,
                typing_variance,
            } => {
                assert_eq!(
                    actions,
                    &vec![
                        Directive::Focus {
                            app: "Terminal".into()
                        },
                        Directive::Type { text: "ls".into() },
                        Directive::Run,
                    ]
                );
                assert_eq!((*typing_speed, *typing_variance), (40, 15));
            }
            other => panic!("expected Execute, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn front_matter_cadence_rides_along() {
        let text = "---\ntyping_speed: 80\ntyping_variance: 3\n---\n[TYPE] hi";
        let (addr, agent) = fake_agent(vec![ok_ack()]).await;
        let mut presenter = presenter_for(text, addr);
        presenter.connect().await.expect("connect");
        assert_eq!(presenter.step().await, StepOutcome::Executed);

        let seen = agent.await.expect("agent task");
        match &seen[0] {
            Message::Execute {
                typing_speed,
                typing_variance,
                ..
            } => assert_eq!((*typing_speed, *typing_variance), (80, 3)),
            other => panic!("expected Execute, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn agent_error_keeps_the_cursor() {
        let (addr, _agent) = fake_agent(vec![
            Message::Ack {
                status: AckStatus::Error,
                message: Some("no such app".into()),
            },
            ok_ack(),
        ])
        .await;
        let mut presenter = presenter_for("[FOCUS] Nowhere", addr);
        presenter.connect().await.expect("connect");

        assert_eq!(
            presenter.step().await,
            StepOutcome::AgentError("no such app".into())
        );
        assert_eq!(presenter.progress(), (0, 1));

        // Retrying the same block succeeds on the second queued ack.
        assert_eq!(presenter.step().await, StepOutcome::Executed);
        assert_eq!(presenter.progress(), (1, 1));
    }

    #[tokio::test]
    async fn severed_connection_preserves_cursor_and_reconnect_resends() {
        // First agent hangs up without acking.
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let first = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let mut frames = FrameBuffer::new();
            let _ = read_message(&mut stream, &mut frames).await;
            // Drop without replying.
        });

        let mut presenter = presenter_for("[TYPE] hi\n[RUN]", addr);
        presenter.connect().await.expect("connect");
        assert_eq!(presenter.step().await, StepOutcome::ConnectionLost);
        assert!(!presenter.is_connected());
        assert_eq!(presenter.progress(), (0, 1));
        first.await.expect("first agent");

        // Second agent on a fresh listener receives the identical payload.
        let (addr2, agent2) = fake_agent(vec![ok_ack()]).await;
        presenter.agent_addr = addr2.to_string();
        presenter.connect().await.expect("reconnect");
        assert_eq!(presenter.step().await, StepOutcome::Executed);

        let seen = agent2.await.expect("agent task");
        match &seen[0] {
            Message::Execute { actions, .. } => {
                assert_eq!(
                    actions,
                    &vec![Directive::Type { text: "hi".into() }, Directive::Run]
                );
            }
            other => panic!("expected Execute, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ack_deadline_drops_the_socket() {
        // Agent that reads but never replies; the deadline must fire.
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let _ = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let mut frames = FrameBuffer::new();
            let _ = read_message(&mut stream, &mut frames).await;
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let mut presenter = presenter_for("[RUN]", addr);
        presenter.connect().await.expect("connect");
        assert_eq!(presenter.step().await, StepOutcome::ConnectionLost);
        assert_eq!(presenter.progress(), (0, 1));
    }

    #[tokio::test]
    async fn go_back_floors_at_zero() {
        let script = parse_script("[SAY] a\n[PAUSE]\n[SAY] b").unwrap();
        let mut presenter = Presenter::new(&script, "127.0.0.1:1");
        presenter.go_back();
        assert_eq!(presenter.progress().0, 0);
        presenter.step().await;
        presenter.step().await;
        assert_eq!(presenter.progress().0, 2);
        presenter.go_back();
        assert_eq!(presenter.progress().0, 1);
    }

    #[tokio::test]
    async fn current_block_reflects_the_cursor() {
        let script = parse_script("[SAY] a\n[PAUSE]").unwrap();
        let mut presenter = Presenter::new(&script, "127.0.0.1:1");
        assert!(matches!(
            presenter.current_block().map(|b| b.kind),
            Some(BlockKind::Pause(None))
        ));
        presenter.step().await;
        assert!(presenter.current_block().is_none());
    }
}
