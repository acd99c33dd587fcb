use std::sync::Arc;
use std::time::Duration;

use config::{AppConfig, LimitsConfig};
use domain::{ActionKind, ChatMessage, ConnectionId, DisplayName, Origin};

use crate::{
    ban_registry::{BanRegistry, BanStatus},
    clock::Clock,
    connection_registry::{ConnectionRegistry, RegistryError},
    error::ApplicationError,
    outcome::{ChangeNameOutcome, ConnectOutcome, HistoryOutcome, SendMessageOutcome},
    rate_limiter::{RateLimitRules, RateLimiter},
    sanitizer::TextSanitizer,
    store::MessageStore,
};

/// 单次历史查询允许的条数范围
pub const MIN_HISTORY_COUNT: usize = 1;
pub const MAX_HISTORY_COUNT: usize = 200;

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub limits: LimitsConfig,
    /// 改名成功后是否改写历史消息的作者名
    pub propagate_renames: bool,
}

impl From<&AppConfig> for CoordinatorSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            limits: config.limits.clone(),
            propagate_renames: config.history.propagate_renames,
        }
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

pub struct ChatCoordinatorDependencies {
    pub message_store: Arc<dyn MessageStore>,
    pub sanitizer: Arc<dyn TextSanitizer>,
    pub clock: Arc<dyn Clock>,
}

enum Admission {
    Admitted,
    Banned(Duration),
}

/// 连接、身份与防滥用的协调器
///
/// 每个入站动作依次经过：封禁检查 -> 限流检查 -> 动作本身，遇到第一个失败即返回。
/// 限流违规立即升级为封禁。预期内的拒绝都以结果枚举返回，
/// 只有消息存储的故障才以 [`ApplicationError`] 传出。
pub struct ChatCoordinator {
    deps: ChatCoordinatorDependencies,
    rate_limiter: RateLimiter,
    bans: BanRegistry,
    connections: ConnectionRegistry,
    ban_duration: Duration,
    propagate_renames: bool,
}

impl ChatCoordinator {
    pub fn new(settings: CoordinatorSettings, deps: ChatCoordinatorDependencies) -> Self {
        let rate_limiter = RateLimiter::new(
            RateLimitRules::from(&settings.limits),
            deps.clock.clone(),
        );
        let bans = BanRegistry::new(deps.clock.clone());
        let connections = ConnectionRegistry::new(settings.limits.max_connections_per_origin);

        Self {
            deps,
            rate_limiter,
            bans,
            connections,
            ban_duration: settings.limits.ban_duration(),
            propagate_renames: settings.propagate_renames,
        }
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn bans(&self) -> &BanRegistry {
        &self.bans
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    pub fn sanitizer(&self) -> &dyn TextSanitizer {
        self.deps.sanitizer.as_ref()
    }

    fn admit(&self, origin: &Origin, kind: ActionKind) -> Admission {
        if let BanStatus::Banned { remaining, .. } = self.bans.check(origin) {
            tracing::debug!(origin = %origin, action = %kind, "rejected banned origin");
            return Admission::Banned(remaining);
        }

        if !self.rate_limiter.register_action(origin, kind) {
            self.bans.ban(origin, self.ban_duration);
            tracing::warn!(
                origin = %origin,
                action = %kind,
                "rate limit exceeded, origin banned"
            );
            return Admission::Banned(self.ban_duration);
        }

        Admission::Admitted
    }

    /// 只做封禁与限流检查，供非实时入口（HTTP）复用
    pub fn check_action(&self, origin: &Origin, kind: ActionKind) -> Option<Duration> {
        match self.admit(origin, kind) {
            Admission::Admitted => None,
            Admission::Banned(retry_after) => Some(retry_after),
        }
    }

    pub fn on_connect(&self, connection_id: ConnectionId, origin: Origin) -> ConnectOutcome {
        if let Admission::Banned(retry_after) = self.admit(&origin, ActionKind::Connect) {
            return ConnectOutcome::Banned { retry_after };
        }

        let (registered, active) = self
            .connections
            .try_register_connection(connection_id, origin.clone());
        if !registered {
            tracing::warn!(
                origin = %origin,
                connection_id = %connection_id,
                active,
                max = self.connections.max_connections_per_origin(),
                "too many connections from origin"
            );
            return ConnectOutcome::CapacityExceeded;
        }

        tracing::info!(
            origin = %origin,
            connection_id = %connection_id,
            active,
            "connection accepted"
        );
        ConnectOutcome::Allowed
    }

    pub fn on_disconnect(&self, connection_id: ConnectionId) {
        if let Some(removed) = self.connections.unregister_connection(connection_id) {
            tracing::info!(
                origin = %removed.origin,
                connection_id = %connection_id,
                display_name = removed.display_name.as_ref().map(|n| n.as_str()).unwrap_or(""),
                "connection closed"
            );
        }
    }

    pub async fn change_name(
        &self,
        connection_id: ConnectionId,
        origin: &Origin,
        raw_name: &str,
    ) -> Result<ChangeNameOutcome, ApplicationError> {
        if let Admission::Banned(retry_after) = self.admit(origin, ActionKind::ChangeName) {
            return Ok(ChangeNameOutcome::Banned { retry_after });
        }

        let Ok(name) = DisplayName::parse(self.deps.sanitizer.sanitize_name(raw_name)) else {
            tracing::debug!(connection_id = %connection_id, "ignored empty display name");
            return Ok(ChangeNameOutcome::Ignored);
        };

        match self.connections.change_display_name(connection_id, &name) {
            Ok(true) => {
                tracing::info!(
                    connection_id = %connection_id,
                    display_name = %name,
                    "display name changed"
                );
                if self.propagate_renames {
                    if let Err(err) = self
                        .deps
                        .message_store
                        .rename_author(connection_id, name.clone())
                        .await
                    {
                        tracing::error!(
                            error = %err,
                            connection_id = %connection_id,
                            "failed to rename author in history"
                        );
                    }
                }
                Ok(ChangeNameOutcome::Applied {
                    name,
                    changed: true,
                })
            }
            Ok(false) => {
                let current = self.connections.display_name_of(connection_id).unwrap_or(name);
                Ok(ChangeNameOutcome::Applied {
                    name: current,
                    changed: false,
                })
            }
            Err(RegistryError::NameTaken) => {
                tracing::debug!(
                    connection_id = %connection_id,
                    display_name = %name,
                    "display name already taken"
                );
                Ok(ChangeNameOutcome::NameTaken)
            }
            Err(RegistryError::UnknownConnection) => {
                tracing::debug!(connection_id = %connection_id, "rename from unregistered connection");
                Ok(ChangeNameOutcome::Ignored)
            }
        }
    }

    pub async fn send_message(
        &self,
        connection_id: ConnectionId,
        origin: &Origin,
        raw_text: &str,
    ) -> Result<SendMessageOutcome, ApplicationError> {
        if let Admission::Banned(retry_after) = self.admit(origin, ActionKind::SendMessage) {
            return Ok(SendMessageOutcome::Banned { retry_after });
        }

        let Some(author) = self.connections.display_name_of(connection_id) else {
            tracing::debug!(connection_id = %connection_id, "ignored message from unnamed connection");
            return Ok(SendMessageOutcome::Ignored);
        };

        let text = self.deps.sanitizer.sanitize_message(raw_text);
        if text.is_empty() {
            tracing::debug!(connection_id = %connection_id, "ignored empty message");
            return Ok(SendMessageOutcome::Ignored);
        }

        let message = ChatMessage::new(connection_id, &author, text, self.deps.clock.now());
        self.deps.message_store.append(message.clone()).await?;
        Ok(SendMessageOutcome::Stored { message })
    }

    pub async fn get_history(
        &self,
        connection_id: ConnectionId,
        origin: &Origin,
        requested: i64,
    ) -> Result<HistoryOutcome, ApplicationError> {
        tracing::debug!(connection_id = %connection_id, requested, "history requested");
        self.recent_messages(origin, requested).await
    }

    /// 不依附实时连接的历史查询，与 [`Self::get_history`] 共用同一个限流桶
    pub async fn recent_messages(
        &self,
        origin: &Origin,
        requested: i64,
    ) -> Result<HistoryOutcome, ApplicationError> {
        if let Some(retry_after) = self.check_action(origin, ActionKind::GetHistory) {
            return Ok(HistoryOutcome::Banned { retry_after });
        }

        let count = clamp_history_count(requested);
        let messages = self.deps.message_store.get_last(count).await?;
        Ok(HistoryOutcome::Results { messages })
    }

    /// 已命名连接的快照，按名称排序
    pub fn current_users(&self) -> Vec<(ConnectionId, DisplayName)> {
        let mut users: Vec<_> = self
            .connections
            .current_users_snapshot()
            .into_iter()
            .collect();
        users.sort_by_key(|(_, name)| name.key().as_str().to_owned());
        users
    }
}

pub fn clamp_history_count(requested: i64) -> usize {
    requested.clamp(MIN_HISTORY_COUNT as i64, MAX_HISTORY_COUNT as i64) as usize
}
