use std::time::Duration;

use application::{
    ApplicationError, BanNotice, ChangeNameOutcome, ConnectOutcome, HistoryOutcome,
    SendMessageOutcome, TextSanitizer,
};
use axum::body::Bytes;
use axum::extract::ws::{close_code, CloseFrame, Message as WsMessage, WebSocket};
use domain::{ConnectionId, Origin};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::{broadcast, mpsc};

use crate::protocol::{ClientFrame, ServerFrame};
use crate::state::AppState;

/// 读取端结束后，等待发送端把已排队的帧写完的最长时间
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// WebSocket 连接管理器
///
/// 每个连接一个实例，负责：
/// - 准入（`on_connect`）被拒时发送通知帧并关闭
/// - 把客户端帧交给协调器，并把结果翻译成服务端帧
/// - 转发广播
/// - 断开时调用 `on_disconnect`
pub struct WebSocketConnection {
    state: AppState,
    connection_id: ConnectionId,
    origin: Origin,
}

/// WebSocket 写操作命令
///
/// 所有对 sender 的写操作都经由发送任务串行执行
#[derive(Debug)]
enum WsCommand {
    Frame(ServerFrame),
    Pong(Bytes),
    Close(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

impl WebSocketConnection {
    pub fn new(state: AppState, origin: Origin) -> Self {
        Self {
            state,
            connection_id: ConnectionId::generate(),
            origin,
        }
    }

    pub async fn run(self, mut socket: WebSocket) {
        let connection_id = self.connection_id;
        let outcome = self
            .state
            .coordinator
            .on_connect(connection_id, self.origin.clone());

        let rejection = match outcome {
            ConnectOutcome::Allowed => None,
            ConnectOutcome::Banned { retry_after } => Some((
                ServerFrame::Banned(BanNotice::new(Some(retry_after))),
                "banned",
            )),
            ConnectOutcome::CapacityExceeded => {
                Some((ServerFrame::capacity_exceeded(), "too many connections"))
            }
        };
        if let Some((frame, reason)) = rejection {
            tracing::info!(
                origin = %self.origin,
                connection_id = %connection_id,
                reason,
                "拒绝 WebSocket 连接"
            );
            if let Some(text) = encode(&frame) {
                let _ = socket.send(WsMessage::Text(text.into())).await;
            }
            let _ = socket.send(close_message(reason)).await;
            return;
        }

        // 先订阅再发送欢迎帧，避免漏掉紧随其后的广播
        let events = self.state.broadcaster.subscribe();
        let (sender, incoming) = socket.split();
        let (cmd_tx, cmd_rx) = mpsc::channel::<WsCommand>(32);

        let greeting = [
            ServerFrame::Welcome { connection_id },
            ServerFrame::users(self.state.coordinator.current_users()),
        ];
        for frame in greeting {
            let _ = cmd_tx.send(WsCommand::Frame(frame)).await;
        }

        let state = self.state.clone();
        let mut send_task = tokio::spawn(write_loop(sender, cmd_rx, events, connection_id));
        let mut recv_task = tokio::spawn(async move { self.read_loop(incoming, cmd_tx).await });

        // 等待任意一个任务完成（连接断开）
        tokio::select! {
            _ = &mut send_task => {
                recv_task.abort();
            }
            _ = &mut recv_task => {
                if tokio::time::timeout(DRAIN_TIMEOUT, &mut send_task).await.is_err() {
                    send_task.abort();
                }
            }
        }

        let was_named = state
            .coordinator
            .connections()
            .display_name_of(connection_id)
            .is_some();
        state.coordinator.on_disconnect(connection_id);
        if was_named {
            state.broadcast_users();
        }
        tracing::info!(connection_id = %connection_id, "WebSocket连接已断开");
    }

    async fn read_loop(
        self,
        mut incoming: SplitStream<WebSocket>,
        cmd_tx: mpsc::Sender<WsCommand>,
    ) {
        while let Some(message) = incoming.next().await {
            let message = match message {
                Ok(message) => message,
                Err(err) => {
                    tracing::debug!(
                        connection_id = %self.connection_id,
                        error = %err,
                        "WebSocket读取失败"
                    );
                    break;
                }
            };
            if self.handle_incoming(message, &cmd_tx).await == Flow::Close {
                break;
            }
        }
        tracing::debug!(connection_id = %self.connection_id, "WebSocket接收任务结束");
    }

    async fn handle_incoming(
        &self,
        message: WsMessage,
        cmd_tx: &mpsc::Sender<WsCommand>,
    ) -> Flow {
        match message {
            WsMessage::Text(text) => self.handle_frame(text.as_str(), cmd_tx).await,
            WsMessage::Binary(_) => {
                tracing::debug!(connection_id = %self.connection_id, "忽略二进制消息");
                Flow::Continue
            }
            WsMessage::Ping(data) => {
                if cmd_tx.send(WsCommand::Pong(data)).await.is_err() {
                    Flow::Close
                } else {
                    Flow::Continue
                }
            }
            WsMessage::Pong(_) => Flow::Continue,
            WsMessage::Close(_) => {
                tracing::debug!(connection_id = %self.connection_id, "WebSocket收到关闭消息");
                Flow::Close
            }
        }
    }

    async fn handle_frame(&self, text: &str, cmd_tx: &mpsc::Sender<WsCommand>) -> Flow {
        let frame = match serde_json::from_str::<ClientFrame>(text) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::debug!(
                    connection_id = %self.connection_id,
                    error = %err,
                    "无法识别的客户端帧"
                );
                return reply(cmd_tx, ServerFrame::error("unrecognized frame")).await;
            }
        };

        let failure = failure_text(&frame);
        let result = match frame {
            ClientFrame::ChangeName { name } => self.change_name(&name, cmd_tx).await,
            ClientFrame::SendMessage { text } => self.send_message(&text, cmd_tx).await,
            ClientFrame::GetHistory { count } => self.get_history(count, cmd_tx).await,
        };

        match result {
            Ok(flow) => flow,
            Err(err) => {
                tracing::warn!(
                    connection_id = %self.connection_id,
                    error = %err,
                    "消息存储故障，保持连接"
                );
                reply(cmd_tx, ServerFrame::error(failure)).await
            }
        }
    }

    async fn change_name(
        &self,
        raw_name: &str,
        cmd_tx: &mpsc::Sender<WsCommand>,
    ) -> Result<Flow, ApplicationError> {
        let coordinator = &self.state.coordinator;
        let outcome = coordinator
            .change_name(self.connection_id, &self.origin, raw_name)
            .await?;

        let flow = match outcome {
            ChangeNameOutcome::Applied { name, changed } => {
                let flow = reply(
                    cmd_tx,
                    ServerFrame::NameChanged {
                        name: name.as_str().to_owned(),
                    },
                )
                .await;
                // 名称未变时在线列表也不变，无需广播
                if changed {
                    self.state.broadcast_users();
                }
                flow
            }
            ChangeNameOutcome::Ignored => Flow::Continue,
            ChangeNameOutcome::NameTaken => {
                let name = coordinator.sanitizer().sanitize_name(raw_name);
                reply(cmd_tx, ServerFrame::NameTaken { name }).await
            }
            ChangeNameOutcome::Banned { retry_after } => banned(cmd_tx, retry_after).await,
        };
        Ok(flow)
    }

    async fn send_message(
        &self,
        raw_text: &str,
        cmd_tx: &mpsc::Sender<WsCommand>,
    ) -> Result<Flow, ApplicationError> {
        let outcome = self
            .state
            .coordinator
            .send_message(self.connection_id, &self.origin, raw_text)
            .await?;

        Ok(match outcome {
            SendMessageOutcome::Stored { message } => {
                self.state.broadcast(ServerFrame::Message(message));
                Flow::Continue
            }
            SendMessageOutcome::Ignored => Flow::Continue,
            SendMessageOutcome::Banned { retry_after } => banned(cmd_tx, retry_after).await,
        })
    }

    async fn get_history(
        &self,
        requested: i64,
        cmd_tx: &mpsc::Sender<WsCommand>,
    ) -> Result<Flow, ApplicationError> {
        let outcome = self
            .state
            .coordinator
            .get_history(self.connection_id, &self.origin, requested)
            .await?;

        Ok(match outcome {
            HistoryOutcome::Results { messages } => {
                reply(cmd_tx, ServerFrame::History { messages }).await
            }
            HistoryOutcome::Banned { retry_after } => banned(cmd_tx, retry_after).await,
        })
    }
}

async fn write_loop(
    mut sender: SplitSink<WebSocket, WsMessage>,
    mut commands: mpsc::Receiver<WsCommand>,
    mut events: broadcast::Receiver<ServerFrame>,
    connection_id: ConnectionId,
) {
    loop {
        let message = tokio::select! {
            command = commands.recv() => match command {
                Some(WsCommand::Frame(frame)) => match encode(&frame) {
                    Some(text) => WsMessage::Text(text.into()),
                    None => continue,
                },
                Some(WsCommand::Pong(data)) => WsMessage::Pong(data),
                Some(WsCommand::Close(reason)) => {
                    let _ = sender.send(close_message(reason)).await;
                    break;
                }
                None => break,
            },
            event = events.recv() => match event {
                Ok(frame) => match encode(&frame) {
                    Some(text) => WsMessage::Text(text.into()),
                    None => continue,
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(connection_id = %connection_id, skipped, "连接处理过慢，丢弃广播帧");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        };

        if sender.send(message).await.is_err() {
            tracing::debug!(connection_id = %connection_id, "发送WebSocket帧失败");
            break;
        }
    }
    tracing::debug!(connection_id = %connection_id, "WebSocket发送任务结束");
}

async fn reply(cmd_tx: &mpsc::Sender<WsCommand>, frame: ServerFrame) -> Flow {
    match cmd_tx.send(WsCommand::Frame(frame)).await {
        Ok(()) => Flow::Continue,
        Err(_) => Flow::Close,
    }
}

/// 发送封禁通知并关闭连接
async fn banned(cmd_tx: &mpsc::Sender<WsCommand>, retry_after: Duration) -> Flow {
    let frame = ServerFrame::Banned(BanNotice::new(Some(retry_after)));
    let _ = cmd_tx.send(WsCommand::Frame(frame)).await;
    let _ = cmd_tx.send(WsCommand::Close("banned")).await;
    Flow::Close
}

/// 存储故障时回给客户端的提示，按请求类型区分
fn failure_text(frame: &ClientFrame) -> &'static str {
    match frame {
        ClientFrame::ChangeName { .. } => "name change failed, please retry",
        ClientFrame::SendMessage { .. } => "message could not be delivered, please retry",
        ClientFrame::GetHistory { .. } => "message history is temporarily unavailable",
    }
}

fn encode(frame: &ServerFrame) -> Option<String> {
    serde_json::to_string(frame)
        .map_err(|err| tracing::warn!(error = %err, "序列化WebSocket帧失败"))
        .ok()
}

fn close_message(reason: &'static str) -> WsMessage {
    WsMessage::Close(Some(CloseFrame {
        code: close_code::POLICY,
        reason: reason.to_owned().into(),
    }))
}
