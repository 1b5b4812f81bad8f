#![cfg(feature = "zstd_support")]

use entsync_server::{Handlers, ServerConfig};
use entsync_shared::{Command, CompressionConfig, CompressionMode};
use entsync_test::{component_of, init_logger, protocol, share_snapshot, Name, TestServer};

#[tokio::test]
async fn compressed_frames_flow_both_ways() {
    init_logger();
    let mut compressed = protocol();
    compressed.compression(CompressionConfig::symmetric(CompressionMode::Default(3)));
    let server = TestServer::with_protocol(ServerConfig::default(), compressed, Handlers::new());
    let (mut writer, writer_handle) = server.connect().await;
    let (mut reader, reader_handle) = server.connect().await;

    let banner = server.registry().create_permanent(None);
    banner
        .add_component(Name {
            value: "welcome ".repeat(512),
        })
        .expect("new kind");
    writer_handle.share(&banner);
    reader_handle.share(&banner);
    writer.recv().await;
    let share = reader.recv().await;
    assert_eq!(share_snapshot(&share, banner.id()).len(), 1);

    let motto = Name {
        value: "hold the line ".repeat(256),
    };
    writer
        .send(&[Command::ComponentChange {
            entity: banner.id(),
            component: Box::new(motto.clone()),
        }])
        .await;

    assert_eq!(component_of::<Name>(&reader.recv().await), Some(motto));
}
