use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::RegistryError;

/// 服务类型标识，例如 "LogService"
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceName(String);

impl ServiceName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for ServiceName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

// 服务注册信息，以 service_url 作为唯一标识
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub service_name: ServiceName,
    pub service_url: String,
    // 依赖的其他服务
    #[serde(default)]
    pub required_services: HashSet<ServiceName>,
    // 接收依赖变更的地址
    pub service_update_url: String,
    #[serde(default)]
    pub heartbeat_url: String,
}

impl Registration {
    /// 解析并校验序列化的注册信息
    pub fn from_json(payload: &[u8]) -> Result<Self, RegistryError> {
        let registration: Registration =
            serde_json::from_slice(payload).map_err(|e| RegistryError::Decode(e.to_string()))?;
        registration.validate()?;
        Ok(registration)
    }

    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.service_name.as_str().trim().is_empty() {
            return Err(RegistryError::Decode("service_name must not be empty".into()));
        }
        if self.service_url.trim().is_empty() {
            return Err(RegistryError::Decode("service_url must not be empty".into()));
        }
        if self.service_update_url.trim().is_empty() {
            return Err(RegistryError::Decode(
                "service_update_url must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn requires(&self, name: &ServiceName) -> bool {
        self.required_services.contains(name)
    }

    pub fn entry(&self) -> PatchEntry {
        PatchEntry {
            name: self.service_name.clone(),
            url: self.service_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchEntry {
    pub name: ServiceName,
    pub url: String,
}

// 依赖变更增量
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    #[serde(default)]
    pub added: Vec<PatchEntry>,
    #[serde(default)]
    pub removed: Vec<PatchEntry>,
}

impl Patch {
    pub fn added(entries: Vec<PatchEntry>) -> Self {
        Self {
            added: entries,
            removed: Vec::new(),
        }
    }

    pub fn removed(entries: Vec<PatchEntry>) -> Self {
        Self {
            added: Vec::new(),
            removed: entries,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// 只保留接收方声明依赖的条目
    pub fn scoped_to(&self, required: &HashSet<ServiceName>) -> Patch {
        let keep = |entries: &[PatchEntry]| {
            entries
                .iter()
                .filter(|entry| required.contains(&entry.name))
                .cloned()
                .collect::<Vec<_>>()
        };

        Patch {
            added: keep(&self.added),
            removed: keep(&self.removed),
        }
    }
}
