use std::sync::Arc;

use config::{LimitsConfig, RateLimitRule};
use dashmap::DashMap;
use domain::{ActionKind, Origin, Timestamp};

use crate::clock::Clock;

/// 各动作类型的限流规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRules {
    pub connect: RateLimitRule,
    pub change_name: RateLimitRule,
    pub send_message: RateLimitRule,
    pub get_history: RateLimitRule,
}

impl RateLimitRules {
    pub fn rule(&self, kind: ActionKind) -> RateLimitRule {
        match kind {
            ActionKind::Connect => self.connect,
            ActionKind::ChangeName => self.change_name,
            ActionKind::SendMessage => self.send_message,
            ActionKind::GetHistory => self.get_history,
        }
    }
}

impl From<&LimitsConfig> for RateLimitRules {
    fn from(limits: &LimitsConfig) -> Self {
        Self {
            connect: limits.connect,
            change_name: limits.change_name,
            send_message: limits.send_message,
            get_history: limits.get_history,
        }
    }
}

impl Default for RateLimitRules {
    fn default() -> Self {
        Self::from(&LimitsConfig::default())
    }
}

/// 单个 (来源, 动作) 的窗口计数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitState {
    /// 当前时间窗口内的动作数量
    pub count: u32,
    /// 当前时间窗口的开始时间
    pub window_start: Timestamp,
}

/// 固定窗口限流器
///
/// 每个 (来源, 动作) 一个计数器，只在调用时按时钟判断窗口是否过期，
/// 没有后台清理任务。计数器按键分片加锁，不同来源互不阻塞。
pub struct RateLimiter {
    rules: RateLimitRules,
    clock: Arc<dyn Clock>,
    states: DashMap<(Origin, ActionKind), RateLimitState>,
}

impl RateLimiter {
    pub fn new(rules: RateLimitRules, clock: Arc<dyn Clock>) -> Self {
        Self {
            rules,
            clock,
            states: DashMap::new(),
        }
    }

    /// 记录一次动作，返回该动作是否仍在限额内
    pub fn register_action(&self, origin: &Origin, kind: ActionKind) -> bool {
        let rule = self.rules.rule(kind);
        let window = chrono::Duration::from_std(rule.window()).unwrap_or(chrono::Duration::MAX);
        let now = self.clock.now();

        let count = {
            let mut state = self
                .states
                .entry((origin.clone(), kind))
                .or_insert_with(|| RateLimitState {
                    count: 0,
                    window_start: now,
                });

            if now.signed_duration_since(state.window_start) > window {
                state.window_start = now;
                state.count = 0;
            }

            state.count = state.count.saturating_add(1);
            state.count
        };

        let allowed = count <= rule.limit;
        if !allowed {
            tracing::debug!(
                origin = %origin,
                action = %kind,
                count,
                limit = rule.limit,
                "rate limit exceeded"
            );
        }
        allowed
    }

    /// 读取计数器当前状态（不做窗口重置）
    pub fn state(&self, origin: &Origin, kind: ActionKind) -> Option<RateLimitState> {
        self.states
            .get(&(origin.clone(), kind))
            .map(|state| *state)
    }
}
