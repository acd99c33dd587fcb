use std::collections::HashMap;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use domain::{ConnectionId, DisplayName, NameKey, Origin};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("display name is already taken")]
    NameTaken,
    #[error("connection is not registered")]
    UnknownConnection,
}

/// 注销时移除的连接信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredConnection {
    pub origin: Origin,
    pub display_name: Option<DisplayName>,
}

/// 活跃连接登记表
///
/// 记录每个来源的活跃连接数、连接所属来源、连接当前显示名称，以及名称归属。
/// 所有表都是按键分片加锁的并发哈希表，不同来源、不同连接的更新互不阻塞。
///
/// 唯一的嵌套加锁顺序是 `origin_counts` -> `connections`；`names` 从不与其他表嵌套持锁。
pub struct ConnectionRegistry {
    max_connections_per_origin: usize,
    origin_counts: DashMap<Origin, usize>,
    connections: DashMap<ConnectionId, Origin>,
    display_names: DashMap<ConnectionId, DisplayName>,
    names: DashMap<NameKey, ConnectionId>,
}

impl ConnectionRegistry {
    pub fn new(max_connections_per_origin: usize) -> Self {
        Self {
            max_connections_per_origin,
            origin_counts: DashMap::new(),
            connections: DashMap::new(),
            display_names: DashMap::new(),
            names: DashMap::new(),
        }
    }

    pub fn max_connections_per_origin(&self) -> usize {
        self.max_connections_per_origin
    }

    /// 登记新连接，返回 (是否成功, 该来源当前活跃连接数)
    ///
    /// 达到上限时不留下任何状态。重复登记同一连接视为成功且不重复计数。
    pub fn try_register_connection(&self, id: ConnectionId, origin: Origin) -> (bool, usize) {
        if self.connections.contains_key(&id) {
            return (true, self.active_connections(&origin));
        }

        let mut count = self.origin_counts.entry(origin.clone()).or_insert(0);
        if *count >= self.max_connections_per_origin {
            let current = *count;
            drop(count);
            self.origin_counts.remove_if(&origin, |_, c| *c == 0);
            return (false, current);
        }

        self.connections.insert(id, origin);
        *count += 1;
        (true, *count)
    }

    /// 注销连接并释放其显示名称；未知连接直接忽略
    pub fn unregister_connection(&self, id: ConnectionId) -> Option<RegisteredConnection> {
        let (_, origin) = self.connections.remove(&id)?;

        if let Entry::Occupied(mut entry) = self.origin_counts.entry(origin.clone()) {
            let count = entry.get_mut();
            *count = count.saturating_sub(1);
            if *count == 0 {
                entry.remove();
            }
        }

        let display_name = self.release_name(id);
        Some(RegisteredConnection {
            origin,
            display_name,
        })
    }

    pub fn origin_of(&self, id: ConnectionId) -> Option<Origin> {
        self.connections.get(&id).map(|origin| origin.clone())
    }

    pub fn display_name_of(&self, id: ConnectionId) -> Option<DisplayName> {
        self.display_names.get(&id).map(|name| name.clone())
    }

    pub fn is_registered(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn active_connections(&self, origin: &Origin) -> usize {
        self.origin_counts.get(origin).map(|count| *count).unwrap_or(0)
    }

    pub fn total_connections(&self) -> usize {
        self.connections.len()
    }

    /// 修改显示名称，返回是否真的发生了变化
    ///
    /// 先占用新名称再释放旧名称：任何时刻新名称都不会同时属于两个连接，
    /// 也不会出现旧名称仍被持有而新名称无人占用的状态。
    pub fn change_display_name(
        &self,
        id: ConnectionId,
        new_name: &DisplayName,
    ) -> Result<bool, RegistryError> {
        if !self.connections.contains_key(&id) {
            return Err(RegistryError::UnknownConnection);
        }

        let key = new_name.key();
        match self.names.entry(key.clone()) {
            Entry::Occupied(owner) => {
                return if *owner.get() == id {
                    Ok(false)
                } else {
                    Err(RegistryError::NameTaken)
                };
            }
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let previous = self.display_names.insert(id, new_name.clone());
        if let Some(previous) = previous {
            let previous_key = previous.key();
            if previous_key != key {
                self.names.remove_if(&previous_key, |_, owner| *owner == id);
            }
        }

        // 与注销并发时回滚，避免留下无主名称
        if !self.connections.contains_key(&id) {
            self.release_name(id);
            return Err(RegistryError::UnknownConnection);
        }

        Ok(true)
    }

    /// 当前在线用户快照（连接 -> 名称），只包含已命名的连接
    pub fn current_users_snapshot(&self) -> HashMap<ConnectionId, DisplayName> {
        self.display_names
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    fn release_name(&self, id: ConnectionId) -> Option<DisplayName> {
        let (_, name) = self.display_names.remove(&id)?;
        self.names.remove_if(&name.key(), |_, owner| *owner == id);
        Some(name)
    }
}
