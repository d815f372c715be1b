//! 配置导入导出（JSON 文件）

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::Value;

use crate::error::{EnvError, Result};
use crate::models::{ExportFile, Project};
use crate::storage::{KeyValueStore, ProjectStore};

pub const EXPORT_VERSION: &str = "1.0";

pub fn export_file(projects: &[Project], now: DateTime<Utc>) -> ExportFile {
    ExportFile {
        projects: projects.to_vec(),
        export_date: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        version: EXPORT_VERSION.to_string(),
    }
}

/// project-env-manager-config-YYYY-MM-DD.json
pub fn default_export_file_name(date: NaiveDate) -> String {
    format!("project-env-manager-config-{}.json", date.format("%Y-%m-%d"))
}

/// 写出导出文件；`output` 为目录或缺省时使用默认文件名
pub fn write_export(projects: &[Project], output: Option<&Path>) -> Result<PathBuf> {
    let now = Utc::now();
    let default_name = default_export_file_name(now.date_naive());
    let path = match output {
        Some(p) if p.is_dir() => p.join(default_name),
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(default_name),
    };

    let json = serde_json::to_string_pretty(&export_file(projects, now))?;
    std::fs::write(&path, json)?;
    tracing::info!("已导出 {} 个项目到 {:?}", projects.len(), path);
    Ok(path)
}

/// 解析并校验导入内容。任何一处不合法都拒绝整个文件。
pub fn parse_import(content: &str) -> Result<Vec<Project>> {
    let root: Value = serde_json::from_str(content)
        .map_err(|e| EnvError::InvalidImport(format!("not valid JSON: {}", e)))?;

    let projects = root
        .get("projects")
        .and_then(Value::as_array)
        .ok_or_else(|| EnvError::InvalidImport("missing projects array".to_string()))?;

    let mut seen_ids = HashSet::new();
    for (i, project) in projects.iter().enumerate() {
        let id = project
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                EnvError::InvalidImport(format!("project at index {} is missing a valid id", i))
            })?;
        if !seen_ids.insert(id) {
            return Err(EnvError::InvalidImport(format!("duplicate project id '{}'", id)));
        }

        let environments = project
            .get("environments")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                EnvError::InvalidImport(format!("project '{}' has no environments array", id))
            })?;

        let mut seen_names = HashSet::new();
        for (j, env) in environments.iter().enumerate() {
            for field in ["name", "url"] {
                let valid = env
                    .get(field)
                    .and_then(Value::as_str)
                    .is_some_and(|v| !v.is_empty());
                if !valid {
                    return Err(EnvError::InvalidImport(format!(
                        "environment at index {} in project '{}' is missing a valid {}",
                        j, id, field
                    )));
                }
            }
            if let Some(name) = env.get("name").and_then(Value::as_str) {
                if !seen_names.insert(name) {
                    return Err(EnvError::InvalidImport(format!(
                        "duplicate environment '{}' in project '{}'",
                        name, id
                    )));
                }
            }
        }
    }

    let projects: Vec<Project> = serde_json::from_value(Value::Array(projects.clone()))
        .map_err(|e| EnvError::InvalidImport(e.to_string()))?;
    Ok(projects)
}

/// 从文件导入并整体替换已保存的项目列表
pub fn import_file<S: KeyValueStore>(store: &mut ProjectStore<S>, path: &Path) -> Result<Vec<Project>> {
    let content = std::fs::read_to_string(path)?;
    let projects = parse_import(&content)?;
    store.save(&projects)?;
    tracing::info!("已从 {:?} 导入 {} 个项目", path, projects.len());
    Ok(projects)
}
