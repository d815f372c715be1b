//! 快速跳转会话：一次弹出窗口（或一次命令行调用）的状态。

use url::Url;

use super::resolver::{active_environment, belongs_to_project, launch_url, select_best_project};
use crate::browser::Navigator;
use crate::error::{EnvError, Result};
use crate::models::{Configuration, Project, DEFAULT_DESTINATION_PARAM, DEFAULT_LOGIN_PATH};
use crate::storage::{KeyValueStore, ProjectStore};

/// 环境按钮
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvButton {
    pub name: String,
    pub label: String,
    /// 当前页面正处于该环境
    pub active: bool,
}

pub struct PopupSession<'a, S> {
    store: &'a mut ProjectStore<S>,
    config: Configuration,
}

impl<'a, S: KeyValueStore> PopupSession<'a, S> {
    /// 加载配置并自动选择项目：先按当前 URL 匹配，匹配不到则沿用已保存的选择
    /// （或第一个项目）。结果与存储中的原始值不同时写回存储，
    /// 失效的选择因此也会被修正。
    pub fn open(store: &'a mut ProjectStore<S>, current_url: Option<&str>) -> Result<Self> {
        let mut config = store.load()?;
        let raw = store.stored_selection()?;

        let auto = current_url
            .and_then(|url| select_best_project(url, &config.projects))
            .map(|p| p.id.clone())
            .unwrap_or_else(|| config.selected_project_id.clone());

        if !auto.is_empty() && raw.as_deref() != Some(auto.as_str()) {
            tracing::info!("选中项目变为: {}", auto);
            store.set_selected(&auto)?;
        }
        config.selected_project_id = auto;

        Ok(Self { store, config })
    }

    pub fn selected_project(&self) -> Option<&Project> {
        self.config.selected_project()
    }

    /// 手动选择项目并持久化
    pub fn select(&mut self, id: &str) -> Result<()> {
        if self.config.find_project(id).is_none() {
            return Err(EnvError::ProjectNotFound(id.to_string()));
        }
        self.store.set_selected(id)?;
        self.config.selected_project_id = id.to_string();
        Ok(())
    }

    /// 当前项目的环境按钮；没有项目或没有环境时为空
    pub fn environment_buttons(&self, current_url: Option<&str>) -> Vec<EnvButton> {
        let project = match self.selected_project() {
            Some(p) => p,
            None => return Vec::new(),
        };
        let active = current_url.and_then(|url| active_environment(url, project));

        project
            .environments
            .iter()
            .map(|env| EnvButton {
                name: env.name.clone(),
                label: capitalize(&env.name),
                active: active.is_some_and(|a| a.name == env.name),
            })
            .collect()
    }

    /// 计算目标环境上的 URL 并在新标签页打开
    pub fn open_env<N: Navigator>(
        &self,
        env_name: &str,
        current_url: &str,
        navigator: &mut N,
    ) -> Result<String> {
        let target = self.target_url(env_name, current_url)?;
        navigator.open_new(&target)?;
        Ok(target)
    }

    pub fn target_url(&self, env_name: &str, current_url: &str) -> Result<String> {
        let project = self
            .selected_project()
            .ok_or_else(|| EnvError::ProjectNotFound(self.config.selected_project_id.clone()))?;
        if project.environments.is_empty() {
            return Err(EnvError::NoEnvironments(project.id.clone()));
        }
        let env = project
            .find_environment(env_name)
            .filter(|e| !e.url.is_empty())
            .ok_or_else(|| EnvError::EnvironmentNotFound(env_name.to_string()))?;

        let target = launch_url(project, env, current_url);
        tracing::debug!("{} -> {}", current_url, target);
        Ok(target)
    }

    /// 当前站点的登录页。页面属于当前项目时附带跳转参数，登录后回到原页面。
    pub fn login_url(&self, current_url: &str) -> Result<String> {
        let url = Url::parse(current_url)
            .map_err(|e| EnvError::InvalidUrl(format!("{}: {}", current_url, e)))?;
        let project = self.selected_project();

        let login_path = project
            .map(|p| p.login_path())
            .unwrap_or_else(|| DEFAULT_LOGIN_PATH.to_string());
        let origin = url.origin().ascii_serialization();

        let on_project = project.is_some_and(|p| belongs_to_project(current_url, p));
        if !on_project {
            return Ok(format!("{}{}", origin, login_path));
        }

        let param = project
            .map(|p| p.destination_param())
            .unwrap_or(DEFAULT_DESTINATION_PARAM);
        let destination = urlencoding::encode(&page_location(&url)).into_owned();
        Ok(format!("{}{}?{}={}", origin, login_path, param, destination))
    }

    /// 在当前标签页跳转到登录页
    pub fn go_to_login<N: Navigator>(&self, current_url: &str, navigator: &mut N) -> Result<String> {
        let target = self.login_url(current_url)?;
        navigator.update_current(&target)?;
        Ok(target)
    }
}

/// path + query + fragment
fn page_location(url: &Url) -> String {
    let mut location = url.path().to_string();
    if let Some(q) = url.query().filter(|q| !q.is_empty()) {
        location.push('?');
        location.push_str(q);
    }
    if let Some(f) = url.fragment().filter(|f| !f.is_empty()) {
        location.push('#');
        location.push_str(f);
    }
    location
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
