use std::{collections::VecDeque, io, sync::Arc, time::Duration};

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream},
    time::timeout,
};

use entsync_shared::{
    Command, EntityId, FrameDecoder, FrameEncoder, Protocol, FRAME_HEADER_SIZE,
};

use crate::test_protocol::Barrier;

const MAX_FRAME: usize = 1024 * 1024;
const WAIT: Duration = Duration::from_secs(5);

/// Client end of a connection, speaking the frame protocol directly.
///
/// Panics on anything unexpected, which fails the calling test.
pub struct TestClient<S = DuplexStream> {
    stream: S,
    protocol: Arc<Protocol>,
    encoder: FrameEncoder,
    decoder: FrameDecoder,
    pending: VecDeque<Command>,
    next_barrier: u32,
}

impl<S: AsyncRead + AsyncWrite + Unpin> TestClient<S> {
    pub fn new(stream: S, protocol: Arc<Protocol>) -> Self {
        let compression = protocol.compression.clone().unwrap_or_default();
        let encoder = FrameEncoder::try_new(compression.client_to_server, MAX_FRAME)
            .expect("client encoder");
        let decoder = FrameDecoder::try_new(compression.server_to_client, MAX_FRAME)
            .expect("client decoder");

        Self {
            stream,
            protocol,
            encoder,
            decoder,
            pending: VecDeque::new(),
            next_barrier: 0,
        }
    }

    /// Consumes `InitTime` and the share of the client session, returning the
    /// session's entity id.
    pub async fn handshake(&mut self) -> EntityId {
        match self.recv().await {
            Command::InitTime { server_time } => assert!(server_time > 0),
            other => panic!("expected InitTime first, got {other}"),
        }
        match self.recv().await {
            Command::EntityShare { entity, .. } => entity,
            other => panic!("expected the client session share, got {other}"),
        }
    }

    // Sending

    /// Sends all `commands` in a single frame.
    pub async fn send(&mut self, commands: &[Command]) {
        let frame = self
            .encoder
            .encode(&self.protocol, commands)
            .expect("test commands are encodable");
        self.send_raw(&frame).await;
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.expect("write to server");
        self.stream.flush().await.expect("flush to server");
    }

    /// Closes the write half; the server sees an orderly disconnect.
    pub async fn shutdown(&mut self) {
        self.stream.shutdown().await.expect("shutdown");
    }

    // Receiving

    /// Next command from the server, waiting up to five seconds.
    pub async fn recv(&mut self) -> Command {
        if let Some(command) = self.pending.pop_front() {
            return command;
        }
        let commands = timeout(WAIT, self.read_frame())
            .await
            .expect("server sent nothing within the wait time")
            .expect("server frame")
            .expect("server closed the connection");
        self.pending.extend(commands);
        self.pending
            .pop_front()
            .expect("server frames carry at least one command")
    }

    /// Receives until a command matching `wanted` arrives, skipping pings.
    pub async fn recv_matching(&mut self, wanted: impl Fn(&Command) -> bool) -> Command {
        loop {
            let command = self.recv().await;
            if wanted(&command) {
                return command;
            }
            assert!(
                is_ping(&command),
                "unexpected {command} while waiting for another command"
            );
        }
    }

    /// Everything the server sends until it closes the socket.
    pub async fn recv_until_closed(&mut self) -> Vec<Command> {
        let mut commands: Vec<Command> = self.pending.drain(..).collect();
        loop {
            let frame = timeout(WAIT, self.read_frame())
                .await
                .expect("server did not close within the wait time");
            match frame {
                Ok(Some(frame)) => commands.extend(frame),
                Ok(None) => return commands,
                Err(error) if entsync_server::is_disconnect(error.kind()) => return commands,
                Err(error) => panic!("unexpected read error: {error}"),
            }
        }
    }

    /// Asks `connection` to queue a [`Barrier`] and returns everything that was
    /// queued for this client before it, pings excluded.
    pub async fn recv_until_barrier(
        &mut self,
        connection: &entsync_server::ConnectionHandle,
    ) -> Vec<Command> {
        let sequence = self.next_barrier;
        self.next_barrier += 1;
        connection.send(Command::send_event(Barrier { sequence }, Vec::new()));

        let mut before = Vec::new();
        loop {
            let command = self.recv().await;
            if let Command::SendEvent { event, .. } = &command {
                if event.downcast_ref::<Barrier>() == Some(&Barrier { sequence }) {
                    return before;
                }
            }
            if !is_ping(&command) {
                before.push(command);
            }
        }
    }

    async fn read_frame(&mut self) -> io::Result<Option<Vec<Command>>> {
        let mut header = [0u8; FRAME_HEADER_SIZE];
        if self.stream.read(&mut header[..1]).await? == 0 {
            return Ok(None);
        }
        self.stream.read_exact(&mut header[1..]).await?;
        let header = self
            .decoder
            .read_header(&header)
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;

        let mut payload = vec![0u8; header.payload_length as usize];
        self.stream.read_exact(&mut payload).await?;
        self.decoder
            .decode_payload(&self.protocol, &header, &payload)
            .map(Some)
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))
    }
}

fn is_ping(command: &Command) -> bool {
    matches!(
        command,
        Command::SendEvent { event, .. }
            if event.downcast_ref::<entsync_shared::PingEvent>().is_some()
    )
}
