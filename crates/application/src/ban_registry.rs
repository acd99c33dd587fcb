use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use domain::{Origin, Timestamp};

use crate::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanStatus {
    NotBanned,
    Banned {
        until: Timestamp,
        remaining: Duration,
    },
}

impl BanStatus {
    pub fn is_banned(&self) -> bool {
        matches!(self, BanStatus::Banned { .. })
    }

    pub fn remaining(&self) -> Option<Duration> {
        match self {
            BanStatus::NotBanned => None,
            BanStatus::Banned { remaining, .. } => Some(*remaining),
        }
    }
}

/// 按来源记录的封禁到期时间
///
/// 过期条目只在读取时惰性删除。
pub struct BanRegistry {
    clock: Arc<dyn Clock>,
    bans: DashMap<Origin, Timestamp>,
}

impl BanRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            bans: DashMap::new(),
        }
    }

    pub fn check(&self, origin: &Origin) -> BanStatus {
        let now = self.clock.now();

        if let Some(until) = self.bans.get(origin).map(|entry| *entry) {
            if until > now {
                return BanStatus::Banned {
                    until,
                    remaining: until.signed_duration_since(now).to_std().unwrap_or_default(),
                };
            }
        }

        self.bans.remove_if(origin, |_, until| *until <= now);
        BanStatus::NotBanned
    }

    /// 封禁来源，覆盖已有的封禁（即使旧封禁更长）
    pub fn ban(&self, origin: &Origin, duration: Duration) -> Timestamp {
        let now = self.clock.now();
        let until = chrono::Duration::from_std(duration)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        self.bans.insert(origin.clone(), until);
        tracing::warn!(
            origin = %origin,
            banned_until = %until,
            duration_secs = duration.as_secs(),
            "origin banned"
        );
        until
    }

    /// 仍保存在表中的条目数（含尚未被读取清理的过期条目）
    pub fn len(&self) -> usize {
        self.bans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bans.is_empty()
    }
}
