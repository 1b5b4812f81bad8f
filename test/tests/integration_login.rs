use entsync_server::{Handlers, Lifetime};
use entsync_shared::{Command, EntityId};
use entsync_test::{init_logger, share_snapshot, Login, Name, TestServer};

fn login_handlers() -> Handlers {
    let mut handlers = Handlers::new();
    handlers.add_event::<Login>(|context, login, _| {
        let user = context.registry.build(EntityId::new(login.user_id), None);
        user.add_component(Name {
            value: login.nickname.clone(),
        })?;
        context.session().attach_user(user)?;
        Ok(())
    });
    handlers
}

fn login(user_id: i64, nickname: &str) -> Command {
    Command::send_event(
        Login {
            user_id,
            nickname: nickname.to_string(),
        },
        Vec::new(),
    )
}

#[tokio::test]
async fn login_moves_observers_of_the_placeholder() {
    init_logger();
    let server = TestServer::new(login_handlers());
    let (mut player, player_handle) = server.connect().await;
    let (mut watcher, watcher_handle) = server.connect().await;

    let placeholder = server
        .registry()
        .create_with_id(EntityId::new(500), None, Lifetime::Temporary)
        .expect("free id");
    placeholder
        .add_component(Name {
            value: "guest".to_string(),
        })
        .expect("new kind");
    watcher_handle.share(&placeholder);
    watcher.recv().await;

    player.send(&[login(500, "ace")]).await;

    let share = player.recv().await;
    let snapshot = share_snapshot(&share, EntityId::new(500));
    assert_eq!(
        snapshot[0].downcast_ref::<Name>(),
        Some(&Name {
            value: "ace".to_string()
        })
    );

    assert_eq!(
        watcher.recv().await,
        Command::EntityUnshare {
            entity: EntityId::new(500)
        }
    );
    let share = watcher.recv().await;
    assert_eq!(share_snapshot(&share, EntityId::new(500)).len(), 1);

    let user = player_handle.user().expect("logged in");
    assert_eq!(user.id(), EntityId::new(500));
    assert!(!server.registry().is_temporary(user.id()));
    assert!(user.is_shared_with(watcher_handle.key()));
}

#[tokio::test]
async fn user_leaves_with_its_connection() {
    init_logger();
    let server = TestServer::new(login_handlers());
    let (mut player, player_handle) = server.connect().await;
    let (mut watcher, watcher_handle) = server.connect().await;

    player.send(&[login(42, "zed")]).await;
    player.recv().await;
    let user = player_handle.user().expect("logged in");
    watcher_handle.share(&user);
    watcher.recv().await;

    player.shutdown().await;
    server.wait_closed(&player_handle).await;

    assert_eq!(
        watcher.recv().await,
        Command::EntityUnshare {
            entity: EntityId::new(42)
        }
    );
    assert!(!server.registry().contains(EntityId::new(42)));
}

#[tokio::test]
async fn login_as_a_taken_permanent_id_is_refused() {
    init_logger();
    let server = TestServer::new(login_handlers());
    let (mut player, player_handle) = server.connect().await;
    server
        .registry()
        .create_with_id(EntityId::new(77), None, Lifetime::Permanent)
        .expect("free id");

    player.send(&[login(77, "imposter")]).await;

    assert!(player.recv_until_barrier(&player_handle).await.is_empty());
    assert!(player_handle.user().is_none());
    assert!(player_handle.is_online());
}
