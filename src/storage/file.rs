use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::KeyValueStore;
use crate::error::{EnvError, Result};

/// 存储引擎：内存中的键值表 + JSON 文件持久化
pub struct JsonFileStore {
    entries: Map<String, Value>,
    file_path: PathBuf,
}

impl JsonFileStore {
    /// 从 JSON 文件加载。文件不存在则初始化空表，文件损坏则记录警告并初始化空表。
    pub fn load(file_path: &Path) -> Result<Self> {
        let entries = if file_path.exists() {
            match std::fs::read_to_string(file_path) {
                Ok(content) if content.trim().is_empty() => Map::new(),
                Ok(content) => match serde_json::from_str::<Map<String, Value>>(&content) {
                    Ok(entries) => entries,
                    Err(e) => {
                        tracing::warn!("存储文件损坏，初始化空状态: {}", e);
                        Map::new()
                    }
                },
                Err(e) => {
                    tracing::warn!("无法读取存储文件，初始化空状态: {}", e);
                    Map::new()
                }
            }
        } else {
            Map::new()
        };

        Ok(Self {
            entries,
            file_path: file_path.to_path_buf(),
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// 将内存状态序列化为 JSON 写入文件
    fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| EnvError::StorageError(e.to_string()))?;

        // 确保父目录存在
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(&self.file_path, json)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>> {
        Ok(keys
            .iter()
            .filter_map(|k| self.entries.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    /// 写时持久化：先修改内存，保存失败则回滚
    fn set(&mut self, items: Map<String, Value>) -> Result<()> {
        let previous: Vec<(String, Option<Value>)> = items
            .iter()
            .map(|(k, _)| (k.clone(), self.entries.get(k).cloned()))
            .collect();

        self.entries.extend(items);

        if let Err(e) = self.save() {
            for (key, old) in previous {
                match old {
                    Some(v) => self.entries.insert(key, v),
                    None => self.entries.remove(&key),
                };
            }
            return Err(e);
        }

        Ok(())
    }
}
