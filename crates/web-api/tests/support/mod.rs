#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use application::{
    ChatCoordinator, ChatCoordinatorDependencies, CoordinatorSettings, HtmlSanitizer,
    ManualClock, MessageStore, StoreError,
};
use async_trait::async_trait;
use config::LimitsConfig;
use domain::{ChatMessage, ConnectionId, DisplayName};
use futures_util::{SinkExt, StreamExt};
use infrastructure::MemoryMessageStore;
use serde_json::Value;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::oneshot,
    time::{sleep, timeout},
};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as TungsteniteMessage, MaybeTlsStream, WebSocketStream,
};
use web_api::{router, AppState};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestApp {
    pub state: AppState,
    pub clock: Arc<ManualClock>,
}

/// 所有操作都失败的消息存储
pub struct OfflineStore;

#[async_trait]
impl MessageStore for OfflineStore {
    async fn append(&self, _message: ChatMessage) -> Result<(), StoreError> {
        Err(StoreError::unavailable("offline"))
    }

    async fn get_last(&self, _count: usize) -> Result<Vec<ChatMessage>, StoreError> {
        Err(StoreError::unavailable("offline"))
    }

    async fn rename_author(
        &self,
        _connection_id: ConnectionId,
        _name: DisplayName,
    ) -> Result<(), StoreError> {
        Err(StoreError::unavailable("offline"))
    }
}

pub fn build_app(limits: LimitsConfig, trust_forwarded_for: bool) -> TestApp {
    build_app_with_store(
        limits,
        trust_forwarded_for,
        Arc::new(MemoryMessageStore::new(100)),
    )
}

pub fn build_app_with_store(
    limits: LimitsConfig,
    trust_forwarded_for: bool,
    message_store: Arc<dyn MessageStore>,
) -> TestApp {
    let clock = Arc::new(ManualClock::default());
    let coordinator = ChatCoordinator::new(
        CoordinatorSettings {
            limits,
            propagate_renames: true,
        },
        ChatCoordinatorDependencies {
            message_store,
            sanitizer: Arc::new(HtmlSanitizer),
            clock: clock.clone(),
        },
    );
    TestApp {
        state: AppState::new(Arc::new(coordinator), trust_forwarded_for),
        clock,
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub app: TestApp,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub fn http(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn connect(&self) -> WsClient {
        let (ws, _) = connect_async(format!("ws://{}/api/v1/ws", self.addr))
            .await
            .expect("ws connect");
        ws
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

pub async fn spawn_server(limits: LimitsConfig) -> TestServer {
    serve(build_app(limits, false)).await
}

pub async fn spawn_server_with_store(
    limits: LimitsConfig,
    message_store: Arc<dyn MessageStore>,
) -> TestServer {
    serve(build_app_with_store(limits, false, message_store)).await
}

async fn serve(app: TestApp) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let service = router(app.state.clone()).into_make_service_with_connect_info::<SocketAddr>();
    tokio::spawn(async move {
        axum::serve(listener, service)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
    });

    // allow server to start
    sleep(Duration::from_millis(50)).await;

    TestServer {
        addr,
        app,
        shutdown: Some(shutdown_tx),
    }
}

pub async fn send_frame(ws: &mut WsClient, frame: Value) {
    ws.send(TungsteniteMessage::Text(frame.to_string().into()))
        .await
        .expect("send frame");
}

/// 下一个 JSON 文本帧；连接关闭时返回 None
pub async fn next_frame(ws: &mut WsClient) -> Option<Value> {
    loop {
        let next = timeout(FRAME_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for frame");
        match next {
            Some(Ok(TungsteniteMessage::Text(text))) => {
                return Some(serde_json::from_str(text.as_str()).expect("json frame"));
            }
            Some(Ok(TungsteniteMessage::Close(_))) | None | Some(Err(_)) => return None,
            Some(Ok(_)) => continue,
        }
    }
}

/// 跳过其他帧，直到收到指定类型的帧
pub async fn expect_frame(ws: &mut WsClient, frame_type: &str) -> Value {
    loop {
        match next_frame(ws).await {
            Some(frame) if frame["type"] == frame_type => return frame,
            Some(_) => continue,
            None => panic!("connection closed before {frame_type} frame"),
        }
    }
}

pub async fn expect_closed(ws: &mut WsClient) {
    while let Some(frame) = next_frame(ws).await {
        if frame["type"] == "message" || frame["type"] == "users" {
            continue;
        }
        panic!("unexpected frame before close: {frame}");
    }
}
