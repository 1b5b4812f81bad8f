use std::time::Instant;

use tokio::net::TcpStream;

use entsync_server::{
    ConnectionPhase, DisconnectReason, HandlerError, Handlers, Lifetime, Server, ServerConfig,
};
use entsync_shared::{Command, EntityId, PingEvent, PongEvent};
use entsync_test::{
    eventually, init_logger, protocol, share_snapshot, Chat, Health, TestClient, TestServer,
};

#[tokio::test]
async fn init_time_comes_before_the_client_session() {
    init_logger();
    let server = TestServer::new(Handlers::new());
    let (stream, server_side) = tokio::io::duplex(4096);
    let connection = server.server.connect(server_side, None);
    let mut client = TestClient::new(stream, server.server.protocol().clone());

    assert!(matches!(client.recv().await, Command::InitTime { server_time } if server_time > 0));

    let session = connection.client_session().expect("created on connect");
    let share = client.recv().await;
    assert!(share_snapshot(&share, session.id()).is_empty());
    assert!(server.registry().is_temporary(session.id()));
    assert_eq!(connection.phase(), ConnectionPhase::Online);
}

#[tokio::test]
async fn kick_delivers_close_before_the_socket_closes() {
    init_logger();
    let server = TestServer::new(Handlers::new());
    let (mut client, connection) = server.connect().await;

    connection.kick("afk");

    let received = client.recv_until_closed().await;
    assert_eq!(
        received.last(),
        Some(&Command::Close {
            reason: "afk".to_string()
        })
    );
    assert_eq!(
        server.wait_closed(&connection).await,
        DisconnectReason::Kicked("afk".to_string())
    );
    assert_eq!(server.server.connection_count(), 0);
}

#[tokio::test]
async fn disconnect_cleans_up_observer_sets() {
    init_logger();
    let server = TestServer::new(Handlers::new());
    let (mut leaving, leaving_handle) = server.connect().await;
    let (_staying, staying_handle) = server.connect().await;
    let registry = server.registry();

    let only_leaving = registry.create(None);
    let both = registry.create(None);
    let fort = registry
        .create_with_id(EntityId::new(9_000), None, Lifetime::Permanent)
        .expect("free id");
    leaving_handle.share(&only_leaving);
    leaving_handle.share(&fort);
    for connection in [&leaving_handle, &staying_handle] {
        connection.share(&both);
    }

    leaving.shutdown().await;
    assert_eq!(
        server.wait_closed(&leaving_handle).await,
        DisconnectReason::PeerClosed
    );

    assert!(!registry.contains(only_leaving.id()));
    assert!(registry.contains(both.id()));
    assert!(!both.is_shared_with(leaving_handle.key()));
    assert!(both.is_shared_with(staying_handle.key()));
    assert!(registry.contains(fort.id()));
    assert!(fort.is_unobserved());
    assert_eq!(leaving_handle.shared_count(), 0);
}

#[tokio::test]
async fn client_cannot_send_server_commands() {
    init_logger();
    let server = TestServer::new(Handlers::new());
    let (mut client, connection) = server.connect().await;
    let session = connection.client_session().expect("created on connect");

    client
        .send(&[
            Command::EntityUnshare {
                entity: session.id(),
            },
            Command::Close {
                reason: "bye".to_string(),
            },
            Command::ComponentAdd {
                entity: session.id(),
                component: Box::new(Health {
                    current: 1.0,
                    max: 1.0,
                }),
            },
        ])
        .await;

    eventually(|| session.has_component::<Health>()).await;
    assert!(connection.is_online());
    assert!(session.is_shared_with(connection.key()));
    // the originator gets no echo of its own change
    assert!(client.recv_until_barrier(&connection).await.is_empty());
}

#[tokio::test]
async fn pong_measures_ping() {
    init_logger();
    let server = TestServer::new(Handlers::new());
    let (mut client, connection) = server.connect().await;
    let session = connection.client_session().expect("created on connect");

    server.server.ping_connections(Instant::now());

    let ping = client.recv().await;
    let (command_id, targets) = match &ping {
        Command::SendEvent { event, entities } => (
            event
                .downcast_ref::<PingEvent>()
                .expect("a ping event")
                .command_id,
            entities.clone(),
        ),
        other => panic!("expected a ping, got {other}"),
    };
    assert_eq!(targets, vec![session.id()]);

    client
        .send(&[Command::send_event(PongEvent { command_id }, Vec::new())])
        .await;
    eventually(|| connection.ping().is_some()).await;
}

#[tokio::test]
async fn failing_connect_hook_kicks() {
    init_logger();
    let mut handlers = Handlers::new();
    handlers.on_connect(|_| Err(HandlerError::rejected("server full")));
    let server = TestServer::new(handlers);

    let (mut client, connection) = server.connect().await;

    assert!(client
        .recv_until_closed()
        .await
        .contains(&Command::Close {
            reason: "server full".to_string()
        }));
    assert_eq!(
        server.wait_closed(&connection).await,
        DisconnectReason::Kicked("server full".to_string())
    );
}

#[tokio::test]
async fn panicking_handler_fails_only_its_command() {
    init_logger();
    let mut handlers = Handlers::new();
    handlers.add_event::<Chat>(|_, chat, _| panic!("cannot handle {}", chat.text));
    let server = TestServer::new(handlers);
    let (mut client, connection) = server.connect().await;
    let session = connection.client_session().expect("created on connect");

    client
        .send(&[Command::send_event(
            Chat {
                text: "boom".to_string(),
            },
            Vec::new(),
        )])
        .await;
    client
        .send(&[Command::ComponentAdd {
            entity: session.id(),
            component: Box::new(Health {
                current: 9.0,
                max: 9.0,
            }),
        }])
        .await;

    eventually(|| session.has_component::<Health>()).await;
    assert!(connection.is_online());
    assert_eq!(connection.close_reason(), None);
}

#[tokio::test]
async fn tcp_clients_are_told_about_shutdown() {
    init_logger();
    let server = Server::new(ServerConfig::default(), protocol(), Handlers::new());
    let address = server.listen("127.0.0.1:0").await.expect("bind");

    let stream = TcpStream::connect(address).await.expect("connect");
    let mut client = TestClient::new(stream, server.protocol().clone());
    client.handshake().await;
    eventually(|| server.connection_count() == 1).await;

    server.shutdown();

    let received = client.recv_until_closed().await;
    assert!(received.contains(&Command::Close {
        reason: DisconnectReason::ServerShutdown.to_string()
    }));
    eventually(|| server.connection_count() == 0).await;
}
