//! A frame carrying a component id the protocol does not know is fatal for the
//! connection, and none of the commands in that frame are applied.

use entsync_server::{DisconnectReason, Handlers};
use entsync_shared::{
    ByteWrite, ByteWriter, Command, ConnectionError, DecoderError, FrameHeader, MarkerMap,
    ProtocolId,
};
use entsync_test::{init_logger, Position, TestServer};

const UNKNOWN_ID: i64 = 999_999_999;

#[tokio::test]
async fn unknown_component_id_drops_the_whole_frame() {
    init_logger();
    let server = TestServer::new(Handlers::new());
    let (mut client, connection) = server.connect().await;
    let session = connection.client_session().expect("created on connect");

    let mut payload = ByteWriter::new();
    Command::ComponentAdd {
        entity: session.id(),
        component: Box::new(Position { x: 1, y: 2 }),
    }
    .write(server.server.protocol(), &mut payload)
    .expect("registered component");
    // ComponentAdd on the same entity, with an id nobody registered
    payload.write_byte(4);
    payload.write_bytes(&session.id().get().to_be_bytes());
    payload.write_bytes(&UNKNOWN_ID.to_be_bytes());
    payload.write_bytes(&[0, 0, 0, 0]);

    let mut frame = ByteWriter::new();
    FrameHeader {
        markers: MarkerMap::new(false),
        payload_length: payload.len() as u32,
    }
    .write(&mut frame);
    frame.write_bytes(payload.as_slice());
    client.send_raw(frame.as_slice()).await;

    assert_eq!(
        server.wait_closed(&connection).await,
        DisconnectReason::Protocol(ConnectionError::Decoder(DecoderError::UnknownComponent {
            id: ProtocolId::new(UNKNOWN_ID)
        }))
    );
    assert!(!session.has_component::<Position>());
    assert!(!server.registry().contains(session.id()));
}

#[tokio::test]
async fn oversized_frame_is_refused_before_reading_it() {
    init_logger();
    let server = TestServer::new(Handlers::new());
    let (mut client, connection) = server.connect().await;

    client
        .send_raw(&[0xFF, 0x00, 0x00, 0x7F, 0xFF, 0xFF, 0xFF])
        .await;

    assert!(matches!(
        server.wait_closed(&connection).await,
        DisconnectReason::Protocol(ConnectionError::Decoder(
            DecoderError::PayloadTooLarge { .. }
        ))
    ));
}
