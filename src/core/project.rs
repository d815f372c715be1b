use crate::error::{EnvError, Result};
use crate::models::Project;

/// 在工作副本中创建项目（不含环境）。id 去除首尾空白后不能为空，且必须唯一。
pub fn create_project(
    projects: &mut Vec<Project>,
    id: &str,
    login_url: Option<&str>,
    destination_param: Option<&str>,
) -> Result<Project> {
    let id = id.trim();
    if id.is_empty() {
        return Err(EnvError::Validation("project id cannot be empty".to_string()));
    }

    // 检查 id 唯一性
    if projects.iter().any(|p| p.id == id) {
        return Err(EnvError::ProjectAlreadyExists(id.to_string()));
    }

    let mut project = Project::new(id, vec![]);
    project.login_url = non_empty(login_url);
    project.destination_param = non_empty(destination_param);

    projects.push(project.clone());
    Ok(project)
}

/// 更新登录路径与跳转参数名，空值表示恢复默认
pub fn update_project_settings(
    projects: &mut [Project],
    id: &str,
    login_url: Option<&str>,
    destination_param: Option<&str>,
) -> Result<Project> {
    let project = find_project_mut(projects, id)?;
    project.login_url = non_empty(login_url);
    project.destination_param = non_empty(destination_param);
    Ok(project.clone())
}

/// 修改项目 id，校验规则与创建相同
pub fn rename_project(projects: &mut [Project], id: &str, new_id: &str) -> Result<Project> {
    let new_id = new_id.trim();
    if new_id.is_empty() {
        return Err(EnvError::Validation("project id cannot be empty".to_string()));
    }
    if new_id != id && projects.iter().any(|p| p.id == new_id) {
        return Err(EnvError::ProjectAlreadyExists(new_id.to_string()));
    }

    let project = find_project_mut(projects, id)?;
    project.id = new_id.to_string();
    Ok(project.clone())
}

/// 删除项目及其所有环境
pub fn delete_project(projects: &mut Vec<Project>, id: &str) -> Result<Project> {
    let pos = projects
        .iter()
        .position(|p| p.id == id)
        .ok_or_else(|| EnvError::ProjectNotFound(id.to_string()))?;
    Ok(projects.remove(pos))
}

pub fn find_project_mut<'a>(projects: &'a mut [Project], id: &str) -> Result<&'a mut Project> {
    projects
        .iter_mut()
        .find(|p| p.id == id)
        .ok_or_else(|| EnvError::ProjectNotFound(id.to_string()))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}
