use serde::{Deserialize, Serialize};

/// 未配置时使用的登录路径
pub const DEFAULT_LOGIN_PATH: &str = "/user/login";
/// 未配置时使用的跳转参数名
pub const DEFAULT_DESTINATION_PARAM: &str = "destination";

/// 完整配置：项目列表 + 当前选中的项目
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub projects: Vec<Project>,
    /// 必须引用已存在的项目 id，或为空字符串
    pub selected_project_id: String,
}

impl Configuration {
    pub fn find_project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn selected_project(&self) -> Option<&Project> {
        self.find_project(&self.selected_project_id)
    }
}

/// 项目：id 同时是主键和显示名
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub environments: Vec<Environment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_param: Option<String>,
}

impl Project {
    pub fn new(id: impl Into<String>, environments: Vec<Environment>) -> Self {
        Self {
            id: id.into(),
            environments,
            login_url: None,
            destination_param: None,
        }
    }

    pub fn find_environment(&self, name: &str) -> Option<&Environment> {
        self.environments.iter().find(|e| e.name == name)
    }

    /// 登录路径，保证以 '/' 开头
    pub fn login_path(&self) -> String {
        let path = self
            .login_url
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_LOGIN_PATH);
        if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        }
    }

    pub fn destination_param(&self) -> &str {
        self.destination_param
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_DESTINATION_PARAM)
    }
}

/// 环境：名称 + 基础 URL
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Environment {
    pub name: String,
    pub url: String,
}

impl Environment {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// 导出文件格式
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportFile {
    pub projects: Vec<Project>,
    pub export_date: String,
    pub version: String,
}

/// 存储为空时的内置默认项目
pub fn default_projects() -> Vec<Project> {
    vec![Project::new(
        "Example Site",
        vec![
            Environment::new("dev", "https://dev.example.com/"),
            Environment::new("staging", "https://staging.example.com/"),
            Environment::new("prod", "https://www.example.com/"),
        ],
    )]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_path_defaults() {
        let mut project = Project::new("p", vec![]);
        assert_eq!(project.login_path(), "/user/login");
        assert_eq!(project.destination_param(), "destination");

        project.login_url = Some("account/signin".to_string());
        project.destination_param = Some("returnTo".to_string());
        assert_eq!(project.login_path(), "/account/signin");
        assert_eq!(project.destination_param(), "returnTo");
    }

    #[test]
    fn test_project_json_shape() {
        let mut project = Project::new("site", vec![Environment::new("dev", "https://dev.site.com")]);
        let json = serde_json::to_value(&project).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "site",
                "environments": [{"name": "dev", "url": "https://dev.site.com"}]
            })
        );

        project.login_url = Some("/login".to_string());
        let json = serde_json::to_value(&project).unwrap();
        assert_eq!(json["loginUrl"], serde_json::json!("/login"));
    }

    #[test]
    fn test_project_missing_environments_defaults_empty() {
        let project: Project = serde_json::from_str(r#"{"id": "bare"}"#).unwrap();
        assert!(project.environments.is_empty());
        assert!(project.login_url.is_none());
    }
}
