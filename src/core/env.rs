use url::Url;

use super::project::find_project_mut;
use crate::error::{EnvError, Result};
use crate::models::{Environment, Project};

/// 在项目下创建环境。名称和 URL 不能为空，名称在项目内唯一，URL 必须是绝对地址。
pub fn create_environment(
    projects: &mut [Project],
    project: &str,
    env_name: &str,
    url: &str,
) -> Result<Environment> {
    let env_name = env_name.trim();
    if env_name.is_empty() {
        return Err(EnvError::Validation("environment name cannot be empty".to_string()));
    }
    let url = validate_url(url)?;

    let proj = find_project_mut(projects, project)?;

    // 检查环境名称唯一性
    if proj.environments.iter().any(|e| e.name == env_name) {
        return Err(EnvError::EnvironmentAlreadyExists(env_name.to_string()));
    }

    let env = Environment::new(env_name, url);
    proj.environments.push(env.clone());
    Ok(env)
}

/// 列出项目下所有环境
pub fn list_environments<'a>(projects: &'a [Project], project: &str) -> Result<Vec<&'a Environment>> {
    let proj = projects
        .iter()
        .find(|p| p.id == project)
        .ok_or_else(|| EnvError::ProjectNotFound(project.to_string()))?;

    Ok(proj.environments.iter().collect())
}

/// 修改环境的基础 URL
pub fn update_environment_url(
    projects: &mut [Project],
    project: &str,
    env_name: &str,
    url: &str,
) -> Result<Environment> {
    let url = validate_url(url)?;
    let proj = find_project_mut(projects, project)?;
    let env = proj
        .environments
        .iter_mut()
        .find(|e| e.name == env_name)
        .ok_or_else(|| EnvError::EnvironmentNotFound(env_name.to_string()))?;
    env.url = url;
    Ok(env.clone())
}

/// 修改环境名称，校验规则与创建相同
pub fn rename_environment(
    projects: &mut [Project],
    project: &str,
    env_name: &str,
    new_name: &str,
) -> Result<Environment> {
    let new_name = new_name.trim();
    if new_name.is_empty() {
        return Err(EnvError::Validation("environment name cannot be empty".to_string()));
    }
    let proj = find_project_mut(projects, project)?;
    if new_name != env_name && proj.environments.iter().any(|e| e.name == new_name) {
        return Err(EnvError::EnvironmentAlreadyExists(new_name.to_string()));
    }
    let env = proj
        .environments
        .iter_mut()
        .find(|e| e.name == env_name)
        .ok_or_else(|| EnvError::EnvironmentNotFound(env_name.to_string()))?;
    env.name = new_name.to_string();
    Ok(env.clone())
}

/// 删除环境
pub fn delete_environment(projects: &mut [Project], project: &str, env_name: &str) -> Result<Environment> {
    let proj = find_project_mut(projects, project)?;
    let pos = proj
        .environments
        .iter()
        .position(|e| e.name == env_name)
        .ok_or_else(|| EnvError::EnvironmentNotFound(env_name.to_string()))?;
    Ok(proj.environments.remove(pos))
}

/// 原样保留用户输入（仅去除首尾空白），只校验能否解析
fn validate_url(raw: &str) -> Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(EnvError::Validation("environment url cannot be empty".to_string()));
    }
    Url::parse(raw).map_err(|e| EnvError::InvalidUrl(format!("{}: {}", raw, e)))?;
    Ok(raw.to_string())
}
