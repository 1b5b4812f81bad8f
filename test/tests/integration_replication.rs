use std::sync::Arc;

use entsync_server::{send_event, ComponentAction, Handlers, Lifetime};
use entsync_shared::{Command, Component, EntityId};
use entsync_test::{
    component_of, eventually, init_logger, share_snapshot, Chat, Health, Name, Position,
    TestServer,
};

fn health(current: f32) -> Health {
    Health {
        current,
        max: 100.0,
    }
}

#[tokio::test]
async fn change_reaches_every_other_observer() {
    init_logger();
    let server = TestServer::new(Handlers::new());
    let (mut sender, sender_handle) = server.connect().await;
    let (mut observer, observer_handle) = server.connect().await;

    let tank = server
        .registry()
        .create_with_id(EntityId::new(7), None, Lifetime::Permanent)
        .expect("free id");
    tank.add_component(health(100.0)).expect("new kind");
    sender_handle.share(&tank);
    observer_handle.share(&tank);
    for client in [&mut sender, &mut observer] {
        let share = client.recv().await;
        let snapshot = share_snapshot(&share, EntityId::new(7));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].downcast_ref::<Health>(), Some(&health(100.0)));
    }

    sender
        .send(&[Command::ComponentChange {
            entity: EntityId::new(7),
            component: Box::new(health(40.0)),
        }])
        .await;

    let change = observer.recv().await;
    assert_eq!(change.entity(), Some(EntityId::new(7)));
    assert_eq!(component_of::<Health>(&change), Some(health(40.0)));
    assert_eq!(tank.get_component::<Health>(), Ok(health(40.0)));
    assert!(sender.recv_until_barrier(&sender_handle).await.is_empty());
}

#[tokio::test]
async fn sharing_twice_sends_one_snapshot() {
    init_logger();
    let server = TestServer::new(Handlers::new());
    let (mut client, connection) = server.connect().await;
    let crate_entity = server.registry().create_permanent(None);

    assert!(connection.share(&crate_entity));
    assert!(!connection.share(&crate_entity));
    assert!(!connection.share_if_unshared(&crate_entity));

    let received = client.recv_until_barrier(&connection).await;
    assert_eq!(received.len(), 1);
    share_snapshot(&received[0], crate_entity.id());
}

#[tokio::test]
async fn late_observer_gets_current_state_only() {
    init_logger();
    let server = TestServer::new(Handlers::new());
    let (_early, early_handle) = server.connect().await;
    let (mut late, late_handle) = server.connect().await;

    let flag = server.registry().create_permanent(None);
    early_handle.share(&flag);
    flag.add_component(Position { x: 1, y: 1 }).expect("new kind");
    flag.add_component(Name {
        value: "north".to_string(),
    })
    .expect("new kind");
    flag.change_component::<Position>(|position| position.x = 5)
        .expect("present");
    flag.remove_component::<Name>().expect("present");

    late_handle.share(&flag);

    let received = late.recv_until_barrier(&late_handle).await;
    assert_eq!(received.len(), 1);
    let snapshot = share_snapshot(&received[0], flag.id());
    assert_eq!(snapshot.len(), 1);
    assert_eq!(
        snapshot[0].downcast_ref::<Position>(),
        Some(&Position { x: 5, y: 1 })
    );
}

#[tokio::test]
async fn unshared_entities_cannot_be_touched() {
    init_logger();
    let server = TestServer::new(Handlers::new());
    let (mut client, connection) = server.connect().await;
    let hidden = server.registry().create_permanent(None);
    let session = connection.client_session().expect("created on connect");

    client
        .send(&[
            Command::ComponentAdd {
                entity: hidden.id(),
                component: Box::new(health(1.0)),
            },
            Command::ComponentAdd {
                entity: session.id(),
                component: Box::new(health(2.0)),
            },
        ])
        .await;

    // commands run in order, so once the second applied the first was refused
    eventually(|| session.has_component::<Health>()).await;
    assert!(!hidden.has_component::<Health>());
    assert!(connection.is_online());
}

#[tokio::test]
async fn chat_event_reaches_observers_of_its_targets() {
    init_logger();
    let mut handlers = Handlers::new();
    handlers.add_event::<Chat>(|_, chat, targets| {
        send_event(chat.clone(), targets);
        Ok(())
    });
    let server = TestServer::new(handlers);
    let (mut speaker, speaker_handle) = server.connect().await;
    let (mut listener, listener_handle) = server.connect().await;

    let room = server.registry().create_permanent(None);
    speaker_handle.share(&room);
    listener_handle.share(&room);
    speaker.recv().await;
    listener.recv().await;

    speaker
        .send(&[Command::send_event(
            Chat {
                text: "gg".to_string(),
            },
            vec![room.id()],
        )])
        .await;

    for client in [&mut listener, &mut speaker] {
        match client.recv().await {
            Command::SendEvent { event, entities } => {
                assert_eq!(
                    event.downcast_ref::<Chat>(),
                    Some(&Chat {
                        text: "gg".to_string()
                    })
                );
                assert_eq!(entities, vec![room.id()]);
            }
            other => panic!("expected the chat event, got {other}"),
        }
    }
}

#[tokio::test]
async fn component_hooks_see_client_changes() {
    init_logger();
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let mut handlers = Handlers::new();
    {
        let seen = seen.clone();
        handlers.on_component::<Health>(move |context, entity, action| {
            seen.lock()
                .expect("hook log")
                .push((context.connection.key(), entity.id(), action));
            Ok(())
        });
    }
    let server = TestServer::new(handlers);
    let (mut client, connection) = server.connect().await;
    let tank = server.registry().create_permanent(None);
    connection.share(&tank);
    client.recv().await;

    client
        .send(&[
            Command::ComponentAdd {
                entity: tank.id(),
                component: Box::new(health(100.0)),
            },
            Command::ComponentRemove {
                entity: tank.id(),
                kind: Health::kind(),
            },
        ])
        .await;

    eventually(|| seen.lock().expect("hook log").len() == 2).await;
    assert_eq!(
        *seen.lock().expect("hook log"),
        vec![
            (connection.key(), tank.id(), ComponentAction::Added),
            (connection.key(), tank.id(), ComponentAction::Removed),
        ]
    );
    assert!(!tank.has_component::<Health>());
}

#[tokio::test]
async fn concurrent_clients_add_different_kinds() {
    init_logger();
    let server = TestServer::new(Handlers::new());
    let (mut first, first_handle) = server.connect().await;
    let (mut second, second_handle) = server.connect().await;
    let tank = server.registry().create_permanent(None);
    first_handle.share(&tank);
    second_handle.share(&tank);
    first.recv().await;
    second.recv().await;

    let add_health = Command::ComponentAdd {
        entity: tank.id(),
        component: Box::new(health(50.0)),
    };
    let add_position = Command::ComponentAdd {
        entity: tank.id(),
        component: Box::new(Position { x: 3, y: 4 }),
    };
    let (first_commands, second_commands) = ([add_health], [add_position]);
    tokio::join!(first.send(&first_commands), second.send(&second_commands));

    eventually(|| tank.component_count() == 2).await;
    assert_eq!(tank.get_component::<Health>(), Ok(health(50.0)));
    assert_eq!(tank.get_component::<Position>(), Ok(Position { x: 3, y: 4 }));

    // each client hears about the other's addition only
    let first_saw = first.recv().await;
    let second_saw = second.recv().await;
    assert_eq!(component_of::<Position>(&first_saw), Some(Position { x: 3, y: 4 }));
    assert_eq!(component_of::<Health>(&second_saw), Some(health(50.0)));
}
