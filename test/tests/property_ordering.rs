use proptest::prelude::*;

use entsync_server::Handlers;
use entsync_shared::Command;
use entsync_test::{component_of, Position, TestServer};

fn replay(moves: Vec<(i32, i32)>, single_frame: bool) -> Vec<Position> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");

    runtime.block_on(async move {
        let server = TestServer::new(Handlers::new());
        let (mut mover, mover_handle) = server.connect().await;
        let (mut observer, observer_handle) = server.connect().await;
        let tank = server.registry().create_permanent(None);
        tank.add_component(Position { x: 0, y: 0 }).expect("new kind");
        mover_handle.share(&tank);
        observer_handle.share(&tank);
        mover.recv().await;
        observer.recv().await;

        let commands: Vec<Command> = moves
            .iter()
            .map(|&(x, y)| Command::ComponentChange {
                entity: tank.id(),
                component: Box::new(Position { x, y }),
            })
            .collect();
        if single_frame {
            mover.send(&commands).await;
        } else {
            for command in commands {
                mover.send(&[command]).await;
            }
        }

        let mut seen = Vec::new();
        for _ in 0..moves.len() {
            let change = observer.recv().await;
            seen.push(component_of::<Position>(&change).expect("a position change"));
        }
        assert_eq!(tank.get_component::<Position>(), Ok(seen[seen.len() - 1].clone()));
        seen
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn observers_see_changes_in_send_order(
        moves in prop::collection::vec((any::<i32>(), any::<i32>()), 1..24),
        single_frame in any::<bool>(),
    ) {
        let expected: Vec<Position> = moves.iter().map(|&(x, y)| Position { x, y }).collect();
        prop_assert_eq!(replay(moves, single_frame), expected);
    }
}
