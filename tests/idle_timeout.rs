//! Idle-timeout eviction tests.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use portico::{Client, HttpDriver, HttpDriverFactory, Server};

mod common;
use common::{bound_listener, options, wait_for, HoldOpenFactory, NoopResponder};

#[tokio::test]
async fn test_idle_connection_is_evicted() {
    let (listener, addr) = bound_listener().await;
    let server = Server::new(vec![listener], Arc::new(NoopResponder), options(1, 5, 16, 16));
    server.set_driver_factory(Arc::new(HoldOpenFactory::new())).unwrap();
    server.start().await.unwrap();

    let mut stream = TcpStream::connect(addr).await.unwrap();
    wait_for(|| server.connection_count() == 1).await;

    // The driver never renews, so the sweep closes the connection once the
    // clock passes its deadline.
    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf)).await;
    assert!(matches!(read, Ok(Ok(0)) | Ok(Err(_))), "connection should be closed");

    wait_for(|| server.connection_count() == 0).await;
    server.stop().await.unwrap();
}

/// Factory whose drivers renew the idle deadline on a short cadence.
struct RenewingFactory;

struct RenewingDriver;

#[async_trait]
impl HttpDriver for RenewingDriver {
    async fn serve(self: Box<Self>, client: Client) -> std::io::Result<()> {
        loop {
            tokio::time::sleep(Duration::from_millis(300)).await;
            client.renew_timeout();
        }
    }
}

impl HttpDriverFactory for RenewingFactory {
    fn application_layer_protocols(&self) -> Vec<String> {
        Vec::new()
    }

    fn create_driver(&self, _client: &Client) -> Box<dyn HttpDriver> {
        Box::new(RenewingDriver)
    }
}

#[tokio::test]
async fn test_renewing_connection_survives_the_sweep() {
    let (listener, addr) = bound_listener().await;
    let server = Server::new(vec![listener], Arc::new(NoopResponder), options(1, 5, 16, 16));
    server.set_driver_factory(Arc::new(RenewingFactory)).unwrap();
    server.start().await.unwrap();

    let stream = TcpStream::connect(addr).await.unwrap();
    wait_for(|| server.connection_count() == 1).await;

    // Three full timeout windows later the connection is still there.
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(server.connection_count(), 1);

    server.stop().await.unwrap();
    assert_eq!(server.connection_count(), 0);
    drop(stream);
}
