// src/network/handshake.rs
//! Connection handshake
//!
//! Strictly sequential exchange run on every new connection before any task
//! traffic:
//!
//! ```text
//! coordinator                      worker
//!   WHO_ARE_YOU_?        ->
//!                        <-   ITS_ME
//!   GIMME_PASSWORD       ->
//!                        <-   PASSWD <secret>
//!   HELLO_YOU            ->
//!                        <-   READY
//!   OK                   ->
//! ```
//!
//! `ITS_ME` and `READY` must match exactly, without padding. The secret is
//! compared byte for byte and never logged.

use crate::network::line::LineChannel;
use crate::network::protocol::{
    CONNECTION_REJECTED, CoordinatorMessage, INVALID_PASSWORD_FORMAT, PASSWD_PREFIX,
    WorkerMessage,
};
use crate::types::AuthState;
use crate::utils::error::AuthError;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite};

/// Proof that a connection completed the handshake
#[derive(Debug, Clone, Copy)]
pub struct Authenticated {
    /// Time the exchange took
    pub elapsed: Duration,
}

/// Runs the acceptor (coordinator) side of the handshake
///
/// On failure the matching rejection line has already been sent; the caller
/// only has to drop the connection.
pub async fn accept<R, W>(
    channel: &mut LineChannel<R, W>,
    secret: &str,
) -> Result<Authenticated, AuthError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let started = Instant::now();
    let mut state = AuthState::AwaitingIdentity;

    send(channel, &CoordinatorMessage::WhoAreYou.to_string()).await?;
    let line = receive(channel, state).await?;
    if line != WorkerMessage::ItsMe.to_string() {
        send(channel, CONNECTION_REJECTED).await?;
        return Err(AuthError::UnexpectedResponse(line));
    }

    advance(&mut state, AuthState::AwaitingPassword);
    send(channel, &CoordinatorMessage::GimmePassword.to_string()).await?;
    let line = receive(channel, state).await?;
    let offered = match line.get(..PASSWD_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(PASSWD_PREFIX) => &line[PASSWD_PREFIX.len()..],
        _ => {
            send(channel, INVALID_PASSWORD_FORMAT).await?;
            return Err(AuthError::MalformedMessage(line));
        }
    };
    if offered.as_bytes() != secret.as_bytes() {
        send(channel, &CoordinatorMessage::YouDontFoolMe.to_string()).await?;
        return Err(AuthError::BadCredential);
    }

    advance(&mut state, AuthState::Authenticated);
    send(channel, &CoordinatorMessage::HelloYou.to_string()).await?;
    let line = receive(channel, state).await?;
    if line != WorkerMessage::Ready.to_string() {
        send(channel, CONNECTION_REJECTED).await?;
        return Err(AuthError::UnexpectedResponse(line));
    }

    send(channel, &CoordinatorMessage::Ok.to_string()).await?;
    advance(&mut state, AuthState::Ready);

    Ok(Authenticated {
        elapsed: started.elapsed(),
    })
}

/// Runs the initiator (worker) side of the handshake
pub async fn initiate<R, W>(
    channel: &mut LineChannel<R, W>,
    secret: &str,
) -> Result<Authenticated, AuthError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let started = Instant::now();

    expect(channel, CoordinatorMessage::WhoAreYou).await?;
    send(channel, &WorkerMessage::ItsMe.to_string()).await?;

    expect(channel, CoordinatorMessage::GimmePassword).await?;
    log::trace!("-> {}<redacted>", PASSWD_PREFIX);
    channel
        .send_line(&WorkerMessage::Passwd(secret.to_string()).to_string())
        .await?;

    let line = receive(channel, AuthState::Authenticated).await?;
    match line.parse::<CoordinatorMessage>() {
        Ok(CoordinatorMessage::HelloYou) => {}
        Ok(CoordinatorMessage::YouDontFoolMe) => return Err(AuthError::BadCredential),
        _ => return Err(AuthError::UnexpectedResponse(line)),
    }

    send(channel, &WorkerMessage::Ready.to_string()).await?;
    expect(channel, CoordinatorMessage::Ok).await?;

    Ok(Authenticated {
        elapsed: started.elapsed(),
    })
}

fn advance(state: &mut AuthState, next: AuthState) {
    debug_assert!(next > *state, "handshake state only moves forward");
    log::trace!("handshake {} -> {}", state, next);
    *state = next;
}

async fn send<R, W>(channel: &mut LineChannel<R, W>, line: &str) -> Result<(), AuthError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    log::trace!("-> {}", line);
    channel.send_line(line).await?;
    Ok(())
}

/// Reads one handshake line; the credential line is logged by size only
async fn receive<R, W>(channel: &mut LineChannel<R, W>, state: AuthState) -> Result<String, AuthError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let line = channel.recv_line().await?.ok_or(AuthError::ConnectionClosed)?;
    if state == AuthState::AwaitingPassword {
        log::trace!("<- (credential line, {} bytes)", line.len());
    } else {
        log::trace!("<- {}", line);
    }
    Ok(line)
}

async fn expect<R, W>(channel: &mut LineChannel<R, W>, wanted: CoordinatorMessage) -> Result<(), AuthError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let line = receive(channel, AuthState::AwaitingIdentity).await?;
    match line.parse::<CoordinatorMessage>() {
        Ok(message) if message == wanted => Ok(()),
        _ => Err(AuthError::UnexpectedResponse(line)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

    type Channel = LineChannel<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

    fn pipe() -> (Channel, Channel) {
        let (a, b) = tokio::io::duplex(1024);
        (LineChannel::from_stream(a), LineChannel::from_stream(b))
    }

    /// Plays the worker side from a script and returns every line it received.
    async fn scripted_worker(mut channel: Channel, script: Vec<&'static str>) -> Vec<String> {
        let mut received = Vec::new();
        for reply in script {
            match channel.recv_line().await.unwrap() {
                Some(line) => received.push(line),
                None => return received,
            }
            channel.send_line(reply).await.unwrap();
        }
        while let Ok(Some(line)) = channel.recv_line().await {
            received.push(line);
        }
        received
    }

    #[tokio::test]
    async fn test_accept_and_initiate_agree() {
        let (mut coordinator, mut worker) = pipe();
        let (accepted, initiated) = tokio::join!(
            accept(&mut coordinator, "password"),
            initiate(&mut worker, "password")
        );
        assert!(accepted.is_ok());
        assert!(initiated.is_ok());
    }

    #[tokio::test]
    async fn test_exact_acceptor_exchange() {
        let (mut coordinator, worker) = pipe();
        let peer = tokio::spawn(scripted_worker(worker, vec!["ITS_ME", "PASSWD password", "READY"]));

        accept(&mut coordinator, "password").await.unwrap();
        drop(coordinator);

        assert_eq!(
            peer.await.unwrap(),
            vec!["WHO_ARE_YOU_?", "GIMME_PASSWORD", "HELLO_YOU", "OK"]
        );
    }

    /// Identity and readiness lines are matched exactly, not case-folded or trimmed.
    #[tokio::test]
    async fn test_identity_and_ready_lines_are_exact() {
        for script in [vec!["its_me"], vec!["ITS_ME "], vec!["ITS_ME", "PASSWD password", "ready"]] {
            let (mut coordinator, worker) = pipe();
            let sent = script.last().map(|line| line.to_string());
            let peer = tokio::spawn(scripted_worker(worker, script));

            let result = accept(&mut coordinator, "password").await;
            assert!(
                matches!(result, Err(AuthError::UnexpectedResponse(ref line)) if Some(line) == sent.as_ref()),
                "{:?} accepted",
                sent
            );
            drop(coordinator);
            assert_eq!(peer.await.unwrap().last().map(String::as_str), Some(CONNECTION_REJECTED));
        }
    }

    #[tokio::test]
    async fn test_wrong_password_is_refused() {
        let (mut coordinator, worker) = pipe();
        let peer = tokio::spawn(scripted_worker(worker, vec!["ITS_ME", "PASSWD wrong"]));

        let result = accept(&mut coordinator, "password").await;
        assert!(matches!(result, Err(AuthError::BadCredential)));
        drop(coordinator);

        let lines = peer.await.unwrap();
        assert_eq!(lines.last().map(String::as_str), Some("YOU_DONT_FOOL_ME"));
        assert_eq!(lines.len(), 3, "nothing follows the refusal");
    }

    #[tokio::test]
    async fn test_bad_identity_is_rejected() {
        let (mut coordinator, worker) = pipe();
        let peer = tokio::spawn(scripted_worker(worker, vec!["ITS_NOT_ME"]));

        let result = accept(&mut coordinator, "password").await;
        assert!(matches!(result, Err(AuthError::UnexpectedResponse(line)) if line == "ITS_NOT_ME"));
        drop(coordinator);
        assert_eq!(peer.await.unwrap(), vec!["WHO_ARE_YOU_?", CONNECTION_REJECTED]);
    }

    #[tokio::test]
    async fn test_missing_passwd_prefix_is_malformed() {
        let (mut coordinator, worker) = pipe();
        let peer = tokio::spawn(scripted_worker(worker, vec!["ITS_ME", "password"]));

        let result = accept(&mut coordinator, "password").await;
        assert!(matches!(result, Err(AuthError::MalformedMessage(_))));
        drop(coordinator);
        assert_eq!(peer.await.unwrap().last().map(String::as_str), Some(INVALID_PASSWORD_FORMAT));
    }

    #[tokio::test]
    async fn test_secret_comparison_is_exact() {
        let (mut coordinator, worker) = pipe();
        let _peer = tokio::spawn(scripted_worker(worker, vec!["ITS_ME", "PASSWD password "]));
        assert!(matches!(
            accept(&mut coordinator, "password").await,
            Err(AuthError::BadCredential)
        ));
    }

    #[tokio::test]
    async fn test_missing_ready_is_rejected() {
        let (mut coordinator, worker) = pipe();
        let peer = tokio::spawn(scripted_worker(worker, vec!["ITS_ME", "PASSWD s3cret", "GO"]));

        assert!(matches!(
            accept(&mut coordinator, "s3cret").await,
            Err(AuthError::UnexpectedResponse(_))
        ));
        drop(coordinator);
        assert_eq!(peer.await.unwrap().last().map(String::as_str), Some(CONNECTION_REJECTED));
    }

    #[tokio::test]
    async fn test_end_of_stream_is_connection_closed() {
        let (mut coordinator, worker) = pipe();
        drop(worker);
        assert!(matches!(
            accept(&mut coordinator, "password").await,
            Err(AuthError::ConnectionClosed) | Err(AuthError::Io(_))
        ));

        let (coordinator, mut worker) = pipe();
        drop(coordinator);
        assert!(matches!(
            initiate(&mut worker, "password").await,
            Err(AuthError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_initiator_sees_refusal() {
        let (mut coordinator, mut worker) = pipe();
        let (accepted, initiated) = tokio::join!(
            accept(&mut coordinator, "password"),
            initiate(&mut worker, "guess")
        );
        assert!(matches!(accepted, Err(AuthError::BadCredential)));
        assert!(matches!(initiated, Err(AuthError::BadCredential)));
    }
}
