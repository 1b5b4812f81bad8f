use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::{Duration, Instant},
};

use log::{debug, error, warn};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter},
    task::JoinHandle,
};

use entsync_shared::{
    Command, ConnectionError, DecoderError, FrameDecoder, FrameEncoder, Protocol, FRAME_HEADER_SIZE,
};

use crate::{
    connection::{
        connection_config::ConnectionConfig,
        disconnect_reason::DisconnectReason,
        handle::ConnectionHandle,
        io,
        queue::{monitored_channel, MonitoredReceiver, MonitoredSender},
    },
    executor::CommandExecutor,
};

/// What every connection pipeline shares.
pub(crate) struct PipelineContext {
    pub protocol: Arc<Protocol>,
    pub executor: Arc<CommandExecutor>,
    pub config: ConnectionConfig,
}

enum ReadError {
    Io(std::io::Error),
    Decode(DecoderError),
}

/// Drives one connection through its receive, execute and send stages until
/// it closes, and returns the reason it closed with.
///
/// Each stage runs as its own task. Receive decodes frames and queues their
/// commands in arrival order, execute applies them one at a time, and send
/// writes the outbound queue one frame per command.
pub(crate) async fn run<S>(
    stream: S,
    connection: ConnectionHandle,
    outbound: MonitoredReceiver<Command>,
    context: Arc<PipelineContext>,
) -> DisconnectReason
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let compression = context.protocol.compression.clone().unwrap_or_default();
    let max_frame_size = context.config.max_frame_size;

    let decoder = match FrameDecoder::try_new(compression.client_to_server, max_frame_size) {
        Ok(decoder) => decoder,
        Err(error) => {
            error!("{connection}: cannot create frame decoder: {error}");
            connection.close(DisconnectReason::Protocol(ConnectionError::Decoder(error)));
            return closing_reason(&connection);
        }
    };
    let encoder = match FrameEncoder::try_new(compression.server_to_client, max_frame_size) {
        Ok(encoder) => encoder,
        Err(error) => {
            error!("{connection}: cannot create frame encoder: {error}");
            connection.close(DisconnectReason::Protocol(ConnectionError::Encoder(error)));
            return closing_reason(&connection);
        }
    };

    let (reader, writer) = tokio::io::split(stream);
    let (inbound_sender, inbound_receiver) = monitored_channel(
        "inbound",
        connection.key(),
        context.config.queue_warn_threshold,
    );

    let mut receive = tokio::spawn(receive_loop(
        reader,
        connection.clone(),
        decoder,
        context.protocol.clone(),
        inbound_sender,
    ));
    let execute = tokio::spawn(execute_loop(
        connection.clone(),
        context.executor.clone(),
        inbound_receiver,
    ));
    let send = tokio::spawn(send_loop(
        writer,
        connection.clone(),
        encoder,
        context.protocol.clone(),
        outbound,
        context.config.flush_timeout,
    ));

    let receive_finished = tokio::select! {
        _ = connection.closed() => false,
        result = &mut receive => {
            report_stage(&connection, "receive", result);
            true
        }
    };
    // no-op unless a stage panicked before recording why it stopped
    connection.close(DisconnectReason::Io(std::io::ErrorKind::Other));

    if !receive_finished {
        report_stage(&connection, "receive", receive.await);
    }
    report_stage(&connection, "send", send.await);
    report_stage(&connection, "execute", execute.await);

    closing_reason(&connection)
}

fn closing_reason(connection: &ConnectionHandle) -> DisconnectReason {
    connection
        .close_reason()
        .unwrap_or(DisconnectReason::ServerShutdown)
}

fn report_stage(
    connection: &ConnectionHandle,
    stage: &'static str,
    result: Result<(), tokio::task::JoinError>,
) {
    if let Err(error) = result {
        error!("{connection}: {stage} stage panicked: {error}");
    }
}

// Receive

async fn receive_loop<R>(
    mut reader: R,
    connection: ConnectionHandle,
    mut decoder: FrameDecoder,
    protocol: Arc<Protocol>,
    inbound: MonitoredSender<Command>,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let frame = tokio::select! {
            _ = connection.closed() => return,
            frame = read_frame(&mut reader, &mut decoder, &protocol) => frame,
        };

        match frame {
            Ok(Some(commands)) => {
                connection.touch(Instant::now());
                for command in commands {
                    if inbound.send(command).is_err() {
                        return;
                    }
                }
            }
            Ok(None) => {
                debug!("{connection}: peer closed the socket");
                connection.close(DisconnectReason::PeerClosed);
                return;
            }
            Err(ReadError::Io(error)) => {
                connection.close(io::classify(&connection, "receive", &error));
                return;
            }
            Err(ReadError::Decode(error)) => {
                warn!("{connection}: dropping connection on undecodable frame: {error}");
                connection.close(DisconnectReason::Protocol(ConnectionError::Decoder(error)));
                return;
            }
        }
    }
}

/// Reads one whole frame. `None` when the peer closed the socket on a frame
/// boundary.
async fn read_frame<R>(
    reader: &mut R,
    decoder: &mut FrameDecoder,
    protocol: &Protocol,
) -> Result<Option<Vec<Command>>, ReadError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_SIZE];
    if reader
        .read(&mut header[..1])
        .await
        .map_err(ReadError::Io)?
        == 0
    {
        return Ok(None);
    }
    reader
        .read_exact(&mut header[1..])
        .await
        .map_err(ReadError::Io)?;
    let header = decoder.read_header(&header).map_err(ReadError::Decode)?;

    let mut payload = vec![0u8; header.payload_length as usize];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(ReadError::Io)?;

    decoder
        .decode_payload(protocol, &header, &payload)
        .map(Some)
        .map_err(ReadError::Decode)
}

// Execute

async fn execute_loop(
    connection: ConnectionHandle,
    executor: Arc<CommandExecutor>,
    mut inbound: MonitoredReceiver<Command>,
) {
    while let Some(command) = inbound.recv().await {
        let code = command.code();
        let entity = command.entity();
        let target = || match entity {
            Some(entity) => format!("{code} on entity {entity}"),
            None => code.to_string(),
        };

        // A panicking handler fails its own command only
        let executed =
            panic::catch_unwind(AssertUnwindSafe(|| executor.execute(&connection, command)));
        match executed {
            Ok(Ok(())) => {}
            Ok(Err(error)) => warn!("{connection}: {} failed: {error}", target()),
            Err(payload) => error!(
                "{connection}: {} panicked: {}",
                target(),
                panic_message(payload.as_ref())
            ),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

// Send

async fn send_loop<W>(
    writer: W,
    connection: ConnectionHandle,
    mut encoder: FrameEncoder,
    protocol: Arc<Protocol>,
    mut outbound: MonitoredReceiver<Command>,
    flush_timeout: Duration,
) where
    W: AsyncWrite + Unpin,
{
    let mut writer = BufWriter::new(writer);

    loop {
        let command = tokio::select! {
            biased;
            command = outbound.recv() => command,
            _ = connection.closed() => break,
        };
        let Some(command) = command else {
            break;
        };

        let written =
            write_command(&mut writer, &mut encoder, &protocol, &connection, &command).await;
        let flushed = match written {
            Ok(()) if outbound.is_empty() => writer
                .flush()
                .await
                .map_err(|error| io::classify(&connection, "send", &error)),
            other => other,
        };
        if let Err(reason) = flushed {
            connection.close(reason);
            return;
        }
    }

    // Whatever was queued before the close, `Close` included, still goes out
    let drain = async {
        while let Ok(command) = outbound.try_recv() {
            write_command(&mut writer, &mut encoder, &protocol, &connection, &command).await?;
        }
        writer
            .flush()
            .await
            .map_err(|error| io::classify(&connection, "send", &error))?;
        writer
            .shutdown()
            .await
            .map_err(|error| io::classify(&connection, "send", &error))
    };
    let drained = tokio::time::timeout(flush_timeout, drain).await;
    match drained {
        Ok(Ok(())) => {}
        Ok(Err(reason)) => debug!("{connection}: final flush abandoned, {reason}"),
        Err(_) => warn!(
            "{connection}: final flush did not finish within {}ms, {} commands dropped",
            flush_timeout.as_millis(),
            outbound.len()
        ),
    }
}

async fn write_command<W>(
    writer: &mut W,
    encoder: &mut FrameEncoder,
    protocol: &Protocol,
    connection: &ConnectionHandle,
    command: &Command,
) -> Result<(), DisconnectReason>
where
    W: AsyncWrite + Unpin,
{
    let frame = encoder
        .encode(protocol, std::slice::from_ref(command))
        .map_err(|error| {
            error!("{connection}: cannot encode {command}: {error}");
            DisconnectReason::Protocol(ConnectionError::Encoder(error))
        })?;
    writer
        .write_all(&frame)
        .await
        .map_err(|error| io::classify(connection, "send", &error))
}

/// Spawns the pipeline for `connection` and runs `finish` with its outcome.
pub(crate) fn spawn<S, F>(
    stream: S,
    connection: ConnectionHandle,
    outbound: MonitoredReceiver<Command>,
    context: Arc<PipelineContext>,
    finish: F,
) -> JoinHandle<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
    F: FnOnce(ConnectionHandle, DisconnectReason) + Send + 'static,
{
    tokio::spawn(async move {
        let reason = run(stream, connection.clone(), outbound, context).await;
        finish(connection, reason);
    })
}
