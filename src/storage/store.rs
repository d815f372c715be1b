use serde_json::{Map, Value};

use super::KeyValueStore;
use crate::error::Result;
use crate::models::{default_projects, Configuration, Project};

const PROJECTS_KEY: &str = "projects";
const SELECTED_KEY: &str = "selectedProjectId";

/// 在键值存储之上读写项目列表与当前选中项目
pub struct ProjectStore<S> {
    store: S,
}

impl<S: KeyValueStore> ProjectStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    /// 读取配置。项目列表缺失、为空或无法解析时使用内置默认项目；
    /// 选中项目缺失或已不存在时取第一个项目。
    pub fn load(&self) -> Result<Configuration> {
        let stored = self.store.get(&[PROJECTS_KEY, SELECTED_KEY])?;

        let projects = match stored.get(PROJECTS_KEY) {
            Some(value) => match serde_json::from_value::<Vec<Project>>(value.clone()) {
                Ok(projects) if !projects.is_empty() => projects,
                Ok(_) => default_projects(),
                Err(e) => {
                    tracing::warn!("存储中的项目列表无法解析，使用默认配置: {}", e);
                    default_projects()
                }
            },
            None => default_projects(),
        };

        let selected = stored
            .get(SELECTED_KEY)
            .and_then(|v| v.as_str())
            .filter(|id| projects.iter().any(|p| p.id == *id))
            .map(|id| id.to_string())
            .unwrap_or_else(|| first_id(&projects));

        Ok(Configuration {
            projects,
            selected_project_id: selected,
        })
    }

    /// 整体保存项目列表，之后校验选中项目仍然存在，必要时修正并持久化。
    /// 返回修正后的选中项目 id。
    pub fn save(&mut self, projects: &[Project]) -> Result<String> {
        let previous = self.stored_selection()?.unwrap_or_default();

        self.store.set(single(PROJECTS_KEY, serde_json::to_value(projects)?))?;
        tracing::info!("已保存 {} 个项目", projects.len());

        if projects.iter().any(|p| p.id == previous) {
            return Ok(previous);
        }

        let corrected = first_id(projects);
        self.set_selected(&corrected)?;
        Ok(corrected)
    }

    /// 存储中原样保存的选中项目 id，不做修正
    pub fn stored_selection(&self) -> Result<Option<String>> {
        Ok(self
            .store
            .get(&[SELECTED_KEY])?
            .get(SELECTED_KEY)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()))
    }

    pub fn set_selected(&mut self, id: &str) -> Result<()> {
        self.store.set(single(SELECTED_KEY, Value::String(id.to_string())))?;
        tracing::debug!("选中项目: {:?}", id);
        Ok(())
    }
}

fn first_id(projects: &[Project]) -> String {
    projects.first().map(|p| p.id.clone()).unwrap_or_default()
}

fn single(key: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    map
}
