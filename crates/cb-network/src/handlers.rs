//! HTTP handlers for the remote driver protocol

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use cb_http::ConnectionSignal;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::driver::NetworkDriver;
use crate::error::DriverError;
use crate::wire::{
    CapabilitiesResponse, CreateEndpointRequest, CreateEndpointResponse, CreateNetworkRequest,
    DeleteNetworkRequest, EmptyResponse, EndpointInfoResponse, EndpointRequest,
    HandshakeResponse, JoinRequest, JoinResponse, LeaveRequest,
};

/// Driver scope reported to the runtime
pub const DRIVER_SCOPE: &str = "local";

type DriverState = Arc<NetworkDriver>;

/// Routes for the plugin handshake, status and every NetworkDriver verb
pub fn create_router(driver: Arc<NetworkDriver>) -> Router {
    Router::new()
        .route("/Plugin.Activate", post(handshake))
        .route("/status", get(status))
        .route("/NetworkDriver.GetCapabilities", post(get_capabilities))
        .route("/NetworkDriver.CreateNetwork", post(create_network))
        .route("/NetworkDriver.DeleteNetwork", post(delete_network))
        .route("/NetworkDriver.CreateEndpoint", post(create_endpoint))
        .route("/NetworkDriver.DeleteEndpoint", post(delete_endpoint))
        .route("/NetworkDriver.EndpointOperInfo", post(endpoint_info))
        .route("/NetworkDriver.Join", post(join))
        .route("/NetworkDriver.Leave", post(leave))
        .with_state(driver)
}

/// Parse a request body regardless of its content type; empty means `{}`
fn decode<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, DriverError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| DriverError::Decode(e.to_string()))
}

async fn handshake() -> Json<HandshakeResponse> {
    Json(HandshakeResponse::default())
}

async fn status(State(driver): State<DriverState>) -> String {
    format!("CNI bridge {}\n", driver.version())
}

async fn get_capabilities() -> Json<CapabilitiesResponse> {
    Json(CapabilitiesResponse {
        scope: DRIVER_SCOPE.to_string(),
    })
}

async fn create_network(
    State(driver): State<DriverState>,
    signal: Option<Extension<ConnectionSignal>>,
    body: Bytes,
) -> Result<Json<EmptyResponse>, DriverError> {
    let req: CreateNetworkRequest = decode(&body)?;
    driver.create_network(req, signal.map(|Extension(s)| s));
    Ok(Json(EmptyResponse {}))
}

async fn delete_network(
    State(driver): State<DriverState>,
    body: Bytes,
) -> Result<Json<EmptyResponse>, DriverError> {
    let req: DeleteNetworkRequest = decode(&body)?;
    driver.delete_network(req).await;
    Ok(Json(EmptyResponse {}))
}

async fn create_endpoint(
    State(driver): State<DriverState>,
    body: Bytes,
) -> Result<Json<CreateEndpointResponse>, DriverError> {
    let req: CreateEndpointRequest = decode(&body)?;
    Ok(Json(driver.create_endpoint(req)))
}

async fn delete_endpoint(
    State(driver): State<DriverState>,
    body: Bytes,
) -> Result<Json<EmptyResponse>, DriverError> {
    let req: EndpointRequest = decode(&body)?;
    driver.delete_endpoint(req);
    Ok(Json(EmptyResponse {}))
}

async fn endpoint_info(
    State(driver): State<DriverState>,
    body: Bytes,
) -> Result<Json<EndpointInfoResponse>, DriverError> {
    let req: EndpointRequest = decode(&body)?;
    Ok(Json(driver.endpoint_info(req)))
}

async fn join(
    State(driver): State<DriverState>,
    body: Bytes,
) -> Result<Json<JoinResponse>, DriverError> {
    let req: JoinRequest = decode(&body)?;
    Ok(Json(driver.join(req).await?))
}

async fn leave(
    State(driver): State<DriverState>,
    body: Bytes,
) -> Result<Json<EmptyResponse>, DriverError> {
    let req: LeaveRequest = decode(&body)?;
    driver.leave(req);
    Ok(Json(EmptyResponse {}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::test_support::{RecordingInvoker, StaticRuntime};
    use crate::driver::DriverConfig;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use cb_core::{ContainerRecord, NetworkRecord};
    use cb_http::RouterBuilder;
    use cb_state::StateCache;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const DOCKER_CONTENT_TYPE: &str = "application/vnd.docker.plugins.v1.2+json";

    async fn fixture() -> (Router, Arc<RecordingInvoker>) {
        let cache = StateCache::new();
        cache
            .register_network(NetworkRecord::new("net1", "mynet", "bridge"))
            .await;
        cache
            .insert_container(ContainerRecord::new("c1", "sb1", 4242))
            .await;
        let invoker = Arc::new(RecordingInvoker::default());
        let driver = NetworkDriver::new(
            DriverConfig::default(),
            cache,
            Arc::new(StaticRuntime::default()),
            invoker.clone(),
        );
        let router = RouterBuilder::new()
            .merge("network-driver", create_router(Arc::new(driver)))
            .build();
        (router, invoker)
    }

    async fn call(router: &Router, path: &str, body: &str) -> (StatusCode, Value) {
        let response = router
            .clone()
            .oneshot(
                Request::post(path)
                    .header("content-type", DOCKER_CONTENT_TYPE)
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_handshake_and_capabilities() {
        let (router, _) = fixture().await;

        let (status, body) = call(&router, "/Plugin.Activate", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"Implements": ["NetworkDriver"]}));

        let (_, body) = call(&router, "/NetworkDriver.GetCapabilities", "{}").await;
        assert_eq!(body, json!({"Scope": "local"}));
    }

    #[tokio::test]
    async fn test_status_text() {
        let (router, _) = fixture().await;
        let response = router
            .oneshot(Request::get("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.starts_with("CNI bridge "));
        assert!(text.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_join_over_router() {
        let (router, invoker) = fixture().await;

        let (status, body) = call(
            &router,
            "/NetworkDriver.Join",
            r#"{"NetworkID":"net1","EndpointID":"ep1","SandboxKey":"sb1","Options":{}}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["InterfaceNames"].as_array().unwrap().len(), 1);
        assert_eq!(body["InterfaceNames"][0]["DstPrefix"], "eth");
        assert_eq!(body["StaticRoutes"], json!([]));

        let calls = invoker.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].container_id, "sb1");
        assert_eq!(calls[0].netns, "/proc/4242/ns/net");
    }

    #[tokio::test]
    async fn test_join_unknown_sandbox_is_500() {
        let (router, invoker) = fixture().await;

        let (status, body) = call(
            &router,
            "/NetworkDriver.Join",
            r#"{"NetworkID":"net1","EndpointID":"ep1","SandboxKey":"sb-other"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["Err"].as_str().unwrap().contains("sb-other"));
        assert!(invoker.calls().is_empty());
    }

    #[tokio::test]
    async fn test_decode_error_is_400() {
        let (router, _) = fixture().await;

        let (status, body) = call(&router, "/NetworkDriver.Join", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["Err"]
            .as_str()
            .unwrap()
            .starts_with("Unable to decode JSON payload"));
    }

    #[tokio::test]
    async fn test_endpoint_verbs() {
        let (router, _) = fixture().await;

        let (_, body) = call(
            &router,
            "/NetworkDriver.CreateEndpoint",
            r#"{"NetworkID":"net1","EndpointID":"ep1","Interfaces":[{"ID":0,"SrcName":"x"}]}"#,
        )
        .await;
        assert_eq!(body, json!({"Interfaces": []}));

        let (_, body) = call(&router, "/NetworkDriver.EndpointOperInfo", "").await;
        assert_eq!(body, json!({"Value": {}}));

        for path in ["/NetworkDriver.DeleteEndpoint", "/NetworkDriver.Leave"] {
            let (status, body) = call(&router, path, r#"{"NetworkID":"net1"}"#).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!({}));
        }
    }

    #[tokio::test]
    async fn test_delete_network_over_router() {
        let (router, invoker) = fixture().await;

        let (status, _) = call(
            &router,
            "/NetworkDriver.DeleteNetwork",
            r#"{"NetworkID":"net1"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            &router,
            "/NetworkDriver.Join",
            r#"{"NetworkID":"net1","EndpointID":"ep1","SandboxKey":"sb1"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["Err"].as_str().unwrap().contains("net1"));
        assert!(invoker.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let (router, _) = fixture().await;
        let (status, _) = call(&router, "/NetworkDriver.AllocateNetwork", "{}").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
