//! Driver served over a real unix socket

use async_trait::async_trait;
use cb_core::{ContainerRecord, NetworkRecord, RuntimeClient, RuntimeEvent};
use cb_http::{RouterBuilder, UnixSocketServer};
use cb_network::{create_router, DriverConfig, NetworkDriver};
use cb_plugins::{CniCommand, PluginError, PluginInvoker};
use cb_state::StateCache;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::mpsc;

struct OneNetworkRuntime {
    network: NetworkRecord,
    info_calls: AtomicUsize,
}

#[async_trait]
impl RuntimeClient for OneNetworkRuntime {
    async fn list_networks(&self) -> cb_core::Result<Vec<NetworkRecord>> {
        Ok(vec![])
    }

    async fn inspect_container(&self, id: &str) -> cb_core::Result<ContainerRecord> {
        Err(cb_core::Error::not_found(id))
    }

    async fn network_info(&self, id: &str) -> cb_core::Result<NetworkRecord> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        if id == self.network.id {
            Ok(self.network.clone())
        } else {
            Err(cb_core::Error::not_found(id))
        }
    }

    async fn add_event_listener(&self, _events: mpsc::Sender<RuntimeEvent>) -> cb_core::Result<()> {
        Ok(())
    }
}

struct NoopInvoker;

#[async_trait]
impl PluginInvoker for NoopInvoker {
    async fn invoke(
        &self,
        _plugin: &str,
        _command: CniCommand,
        _container_id: &str,
        _netns: &str,
        _config: &[u8],
    ) -> Result<Vec<u8>, PluginError> {
        Ok(Vec::new())
    }
}

async fn post(path: &Path, verb: &str, body: &str) -> String {
    let mut stream = UnixStream::connect(path).await.unwrap();
    let request = format!(
        "POST /NetworkDriver.{} HTTP/1.1\r\nHost: plugin\r\nContent-Type: application/vnd.docker.plugins.v1.2+json\r\nContent-Length: {}\r\n\r\n{}",
        verb,
        body.len(),
        body
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn create_network_registers_after_connection_closes() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("cni.sock");

    let runtime = Arc::new(OneNetworkRuntime {
        network: NetworkRecord::new("net1", "mynet", "bridge"),
        info_calls: AtomicUsize::new(0),
    });
    let cache = StateCache::new();
    cache
        .insert_container(ContainerRecord::new("c1", "sb1", 4242))
        .await;
    let driver = Arc::new(NetworkDriver::new(
        DriverConfig::default(),
        cache.clone(),
        runtime.clone(),
        Arc::new(NoopInvoker),
    ));

    let server = UnixSocketServer::builder()
        .socket_path(&socket)
        .router(
            RouterBuilder::new()
                .merge("network-driver", create_router(driver.clone()))
                .build(),
        )
        .bind()
        .unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let serving = tokio::spawn(server.serve_with_shutdown(async move {
        let _ = stop_rx.await;
    }));

    let response = post(
        &socket,
        "CreateNetwork",
        r#"{"NetworkID":"net1","Options":{"com.docker.network.generic":{}}}"#,
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("{}"));

    let mut registered = false;
    for _ in 0..200 {
        if cache.lookup_network("net1").await.is_some() {
            registered = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(registered, "network was never registered");
    assert_eq!(runtime.info_calls.load(Ordering::SeqCst), 1);

    let response = post(
        &socket,
        "Join",
        r#"{"NetworkID":"net1","EndpointID":"ep1","SandboxKey":"sb1","Options":{}}"#,
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("\"InterfaceNames\""));

    driver.shutdown();
    stop_tx.send(()).unwrap();
    serving.await.unwrap();
    assert!(!socket.exists());
}

#[tokio::test]
async fn malformed_body_answers_400_over_socket() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("cni.sock");

    let driver = Arc::new(NetworkDriver::new(
        DriverConfig::default(),
        StateCache::new(),
        Arc::new(OneNetworkRuntime {
            network: NetworkRecord::new("net1", "mynet", "bridge"),
            info_calls: AtomicUsize::new(0),
        }),
        Arc::new(NoopInvoker),
    ));
    let server = UnixSocketServer::builder()
        .socket_path(&socket)
        .router(create_router(driver))
        .bind()
        .unwrap();
    tokio::spawn(server.serve());

    let response = post(&socket, "Join", "[1,2").await;
    assert!(response.starts_with("HTTP/1.1 400"));
    assert!(response.contains("\"Err\""));
}
