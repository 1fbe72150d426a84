//! Chat client connection handling.
//!
//! The `ChatClient` connects to the server, negotiates a pseudonym, then
//! splits into two halves: a spawned receiver printing every server line,
//! and the input loop forwarding typed lines until `exit` or EOF.
//!
//! The session logic is generic over its streams so the handshake and the
//! forwarding loop can be exercised against in-memory pipes.

use std::net::SocketAddr;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use parley_protocol::{ACCEPT, EXIT_COMMAND, REJECT};

use crate::error::{ClientError, Result};

/// Configuration for the chat client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server endpoint to connect to.
    pub addr: SocketAddr,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 12001)),
        }
    }
}

/// Client for a parley chat session.
///
/// # Connection Lifecycle
///
/// 1. Connects to the server's TCP endpoint
/// 2. Proposes pseudonyms from the terminal until one is accepted
/// 3. Spawns a receiver that prints every server line
/// 4. Forwards typed lines until `exit`, terminal EOF, or cancellation
pub struct ChatClient {
    /// Configuration for connection behavior.
    config: ClientConfig,

    /// Cancellation token for graceful shutdown.
    cancel_token: CancellationToken,
}

impl ChatClient {
    /// Creates a new chat client.
    #[must_use]
    pub fn new(config: ClientConfig, cancel_token: CancellationToken) -> Self {
        Self {
            config,
            cancel_token,
        }
    }

    /// Runs the client to completion.
    ///
    /// Returns when the user exits, the server closes the connection, or
    /// the cancellation token fires.
    ///
    /// # Errors
    ///
    /// - `ClientError::Connect` if the server endpoint is unreachable
    /// - Handshake and I/O errors from the session itself
    pub async fn run(&self) -> Result<()> {
        let stream = TcpStream::connect(self.config.addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: self.config.addr,
                source,
            })?;

        info!(addr = %self.config.addr, "Connected to chat server");

        let (read_half, write_half) = stream.into_split();
        let server_reader = BufReader::new(read_half);
        let input = BufReader::new(tokio::io::stdin());

        self.run_session(server_reader, write_half, input).await
    }

    /// Drives a connected session: handshake, then receive and forward
    /// concurrently.
    async fn run_session<R, W, I>(&self, mut server_reader: R, mut server_writer: W, mut input: I) -> Result<()>
    where
        R: AsyncBufRead + Send + Unpin + 'static,
        W: AsyncWrite + Unpin,
        I: AsyncBufRead + Unpin,
    {
        let name = negotiate_name(&mut server_reader, &mut server_writer, &mut input).await?;
        debug!(name = %name, "Handshake completed");

        println!("You are connected");
        println!("---------------------------------------");

        let cancel_token = self.cancel_token.clone();
        let receiver = tokio::spawn(print_server_lines(server_reader, cancel_token));

        let result = forward_input(&mut server_writer, &mut input, &self.cancel_token).await;

        // Either side ending takes the other one down with it.
        self.cancel_token.cancel();
        let _ = receiver.await;

        result
    }
}

/// Handshake: proposes pseudonyms until the server accepts one.
///
/// Prompts on the terminal, sends each proposal, and interprets the
/// server's one-line verdict. The server decides validity; the client
/// sends whatever was typed.
///
/// # Errors
///
/// - `ClientError::InputClosed` if the terminal closes before acceptance
/// - `ClientError::ServerClosed` if the server closes mid-handshake
/// - `ClientError::UnexpectedReply` for any verdict that is not one of
///   the two protocol tokens
async fn negotiate_name<R, W, I>(server_reader: &mut R, server_writer: &mut W, input: &mut I) -> Result<String>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    I: AsyncBufRead + Unpin,
{
    println!("Please enter your pseudonym:");

    loop {
        let Some(proposal) = read_input_line(input).await? else {
            return Err(ClientError::InputClosed);
        };
        if proposal.is_empty() {
            continue;
        }

        send_line(server_writer, &proposal).await?;

        let mut verdict = String::new();
        let bytes_read = server_reader.read_line(&mut verdict).await?;
        if bytes_read == 0 {
            return Err(ClientError::ServerClosed);
        }

        match verdict.trim_end() {
            ACCEPT => return Ok(proposal),
            REJECT => println!("Pseudonym existed, please enter a new one:"),
            other => return Err(ClientError::UnexpectedReply(other.to_string())),
        }
    }
}

/// Receiver half: prints every server line to the terminal.
///
/// Ends on server EOF, read error, or cancellation, and cancels the token
/// on the way out so the input loop stops waiting on the terminal.
async fn print_server_lines<R>(mut server_reader: R, cancel_token: CancellationToken)
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let mut line = String::new();

        tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!("Receiver cancelled");
                return;
            }

            read_result = server_reader.read_line(&mut line) => {
                match read_result {
                    Ok(0) => {
                        println!("Connection closed by server.");
                        cancel_token.cancel();
                        return;
                    }
                    Ok(_) => {
                        println!("{}", line.trim_end());
                    }
                    Err(e) => {
                        if !cancel_token.is_cancelled() {
                            warn!(error = %e, "Connection lost");
                        }
                        cancel_token.cancel();
                        return;
                    }
                }
            }
        }
    }
}

/// Sender half: forwards typed lines to the server.
///
/// Empty lines are skipped locally. `exit` is forwarded so the server
/// runs its normal teardown, then the loop ends. Terminal EOF synthesizes
/// the same `exit` so closing stdin and typing it behave alike.
async fn forward_input<W, I>(server_writer: &mut W, input: &mut I, cancel_token: &CancellationToken) -> Result<()>
where
    W: AsyncWrite + Unpin,
    I: AsyncBufRead + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!("Input loop cancelled");
                return Ok(());
            }

            line = read_input_line(input) => {
                let Some(line) = line? else {
                    send_line(server_writer, EXIT_COMMAND).await?;
                    return Ok(());
                };

                if line.is_empty() {
                    continue;
                }

                send_line(server_writer, &line).await?;

                if line == EXIT_COMMAND {
                    return Ok(());
                }
            }
        }
    }
}

/// Reads one terminal line without its terminator; `None` on EOF.
async fn read_input_line<I>(input: &mut I) -> Result<Option<String>>
where
    I: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let bytes_read = input.read_line(&mut line).await?;
    if bytes_read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Sends one line to the server, newline-terminated and flushed.
async fn send_line<W>(writer: &mut W, line: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
