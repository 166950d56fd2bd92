#![allow(clippy::unwrap_used, clippy::panic)]

use std::{sync::Arc, time::Duration};

use cyprus::{
    comm::{self, ControlChannels, SubsystemEndpoint},
    config::ServerConfig,
    protocol::{Capabilities, Frame, SubsystemKind},
    transmission::NetworkTransmissionServer,
};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Error as WsError, Message, http::StatusCode, protocol::CloseFrame},
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    server: Arc<NetworkTransmissionServer>,
    control: ControlChannels,
    endpoint: SubsystemEndpoint,
    url: String,
}

async fn start() -> Harness {
    let wiring = comm::wire(8);
    let config = ServerConfig {
        port: 0,
        secure: false,
        ..ServerConfig::default()
    };
    let server = Arc::new(NetworkTransmissionServer::new(config, wiring.transport));

    let serving = Arc::clone(&server);
    tokio::spawn(async move { serving.serve().await });
    let addr = server.local_addr().await.unwrap();

    Harness {
        server,
        control: wiring.control,
        endpoint: wiring.endpoints[&SubsystemKind::MediaPlayer].clone(),
        url: format!("ws://127.0.0.1:{}/", addr.port()),
    }
}

async fn connect(url: &str) -> Client {
    let (client, _) = connect_async(url).await.unwrap();
    client
}

async fn send(client: &mut Client, frame: &Frame) {
    client
        .send(Message::Binary(frame.encode().unwrap().into()))
        .await
        .unwrap();
}

async fn next_frame(client: &mut Client) -> Frame {
    loop {
        let message = tokio::time::timeout(WAIT, client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        match message {
            Message::Binary(data) => return Frame::decode(&data).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected message {other:?}"),
        }
    }
}

async fn close_frame(client: &mut Client) -> CloseFrame {
    loop {
        let message = tokio::time::timeout(WAIT, client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Close(Some(frame)) = message {
            return frame;
        }
    }
}

fn init(modules: &[&str]) -> Frame {
    let capabilities = Capabilities {
        capabilities: modules.iter().map(|m| m.to_string()).collect(),
    };
    Frame::event("init", &capabilities).unwrap()
}

#[tokio::test]
async fn init_reaches_the_orchestrator_and_replies_reach_the_client() {
    let mut harness = start().await;
    let mut client = connect(&harness.url).await;

    send(&mut client, &init(&["mp"])).await;
    let requested = tokio::time::timeout(WAIT, harness.control.module_init.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(requested, vec!["mp".to_string()]);

    let reply = Frame::event(
        "rinit",
        &Capabilities {
            capabilities: requested,
        },
    )
    .unwrap();
    harness.control.write.send(reply).await.unwrap();

    let received = next_frame(&mut client).await;
    assert_eq!(received.method(), "rinit");
    let capabilities: Capabilities = received.arg(0).unwrap();
    assert_eq!(capabilities.capabilities, vec!["mp".to_string()]);
}

/// Sends `init` and waits until the orchestrator side sees it, which means
/// the connection is fully set up.
async fn initialize(harness: &mut Harness, client: &mut Client) {
    send(client, &init(&["mp"])).await;
    tokio::time::timeout(WAIT, harness.control.module_init.recv())
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn module_events_are_written_to_the_client() {
    let mut harness = start().await;
    let mut client = connect(&harness.url).await;
    initialize(&mut harness, &mut client).await;

    let event = Frame::new("mp:rlist", vec![rmpv::Value::Nil]);
    harness.endpoint.events().send(event.clone()).await.unwrap();

    assert_eq!(next_frame(&mut client).await, event);
}

#[tokio::test]
async fn events_from_before_the_connection_are_not_delivered() {
    let mut harness = start().await;
    let stale = Frame::new("mp:linux:psu", vec![rmpv::Value::Nil]);
    harness.endpoint.events().send(stale).await.unwrap();

    let mut client = connect(&harness.url).await;
    initialize(&mut harness, &mut client).await;

    let fresh = Frame::new("mp:rlist", vec![rmpv::Value::Nil]);
    harness.endpoint.events().send(fresh.clone()).await.unwrap();

    assert_eq!(next_frame(&mut client).await, fresh);
}

#[tokio::test]
async fn second_client_is_locked_out() {
    let harness = start().await;
    let _first = connect(&harness.url).await;

    match connect_async(harness.url.as_str()).await {
        Err(WsError::Http(response)) => assert_eq!(response.status(), StatusCode::LOCKED),
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("second client was accepted"),
    }
}

#[tokio::test]
async fn disconnect_fires_module_close_and_frees_the_slot() {
    let mut harness = start().await;
    let mut client = connect(&harness.url).await;

    client.close(None).await.unwrap();
    drop(client);

    tokio::time::timeout(WAIT, harness.control.module_close.recv())
        .await
        .unwrap()
        .unwrap();

    let mut reconnected = None;
    for _ in 0..50 {
        if let Ok((client, _)) = connect_async(harness.url.as_str()).await {
            reconnected = Some(client);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(reconnected.is_some());
}

#[tokio::test]
async fn shutdown_tells_the_client_the_server_is_going_away() {
    let harness = start().await;
    let mut client = connect(&harness.url).await;

    let server = Arc::clone(&harness.server);
    let shutdown = tokio::spawn(async move { server.shutdown(WAIT).await });

    let frame = close_frame(&mut client).await;
    assert_eq!(u16::from(frame.code), 1001);
    assert_eq!(frame.reason.as_str(), "SERVER SHUTDOWN");

    shutdown.await.unwrap().unwrap();
}
