//! 从 Upsun 导入项目与环境。
//!
//! 流程：登录拿到 token → 依次读取用户、组织、项目、环境 → 只保留 active 环境 →
//! 按项目 id 合并进已保存的列表。任何一步失败整次导入作废，存储不受影响。

mod api;
mod signin;

pub use api::{ProviderApi, UpsunApi};
pub use signin::{
    LoopbackSignIn, SignIn, SignInConfig, StaticToken, DEFAULT_CLIENT_ID, DEFAULT_SIGN_IN_TIMEOUT,
};

use std::sync::atomic::{AtomicBool, Ordering};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{EnvError, Result};
use crate::models::{Environment, Project};
use crate::storage::{KeyValueStore, ProjectStore};

#[derive(Debug, Deserialize)]
struct User {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Organization {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RemoteProject {
    id: String,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RemoteEnvironment {
    id: String,
    #[serde(default)]
    status: String,
    default_domain: Option<String>,
    edge_hostname: Option<String>,
}

/// 同一时间只允许一次导入
#[derive(Debug, Default)]
pub struct ImportSession {
    in_flight: AtomicBool,
}

/// 持有期间视为导入进行中，释放时自动复位
pub struct ImportGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for ImportGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl ImportSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> Result<ImportGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| EnvError::ImportInProgress)?;
        Ok(ImportGuard {
            flag: &self.in_flight,
        })
    }

    /// 登录并拉取远端项目，不修改存储
    pub async fn fetch<I, F, A>(&self, sign_in: &mut I, connect: F) -> Result<Vec<Project>>
    where
        I: SignIn,
        F: FnOnce(String) -> Result<A>,
        A: ProviderApi,
    {
        let _guard = self.begin()?;
        let token = sign_in.acquire_token().await?;
        let api = connect(token)?;
        fetch_projects(&api).await
    }
}

/// 顺序读取远端数据并映射为项目列表
pub async fn fetch_projects<A: ProviderApi>(api: &A) -> Result<Vec<Project>> {
    let user: User = read(api, "/users/me").await?;
    let organizations: Page<Organization> =
        read(api, &format!("/users/{}/organizations", user.id)).await?;

    let mut projects = Vec::new();
    for organization in organizations.items {
        let remote_projects: Page<RemoteProject> =
            read(api, &format!("/organizations/{}/projects", organization.id)).await?;

        for remote in remote_projects.items {
            let remote_envs: Vec<RemoteEnvironment> =
                read(api, &format!("/projects/{}/environments", remote.id)).await?;

            let environments: Vec<Environment> = remote_envs
                .into_iter()
                .filter(|e| e.status == "active")
                .filter_map(|e| map_environment(&remote.id, e))
                .collect();

            if environments.is_empty() {
                continue;
            }

            let id = remote.title.filter(|t| !t.is_empty()).unwrap_or(remote.id);
            projects.push(Project::new(id, environments));
        }
    }

    tracing::info!("从远端读取到 {} 个项目", projects.len());
    Ok(projects)
}

/// 自定义域名优先，否则使用平台分配的主机名
fn map_environment(project_id: &str, env: RemoteEnvironment) -> Option<Environment> {
    let domain = env
        .default_domain
        .filter(|d| !d.is_empty())
        .or(env.edge_hostname.filter(|h| !h.is_empty()));
    match domain {
        Some(domain) => Some(Environment::new(env.id, format!("https://{}", domain))),
        None => {
            tracing::warn!("环境 {}/{} 没有可用域名，跳过", project_id, env.id);
            None
        }
    }
}

async fn read<A: ProviderApi, T: DeserializeOwned>(api: &A, path: &str) -> Result<T> {
    let value: Value = api.get_json(path).await?;
    serde_json::from_value(value)
        .map_err(|e| EnvError::RemoteApi(format!("unexpected response from {}: {}", path, e)))
}

/// 按 id 合并：已存在的项目替换环境（保留登录设置），否则追加到末尾
pub fn merge_projects(current: &mut Vec<Project>, imported: Vec<Project>) {
    for incoming in imported {
        match current.iter_mut().find(|p| p.id == incoming.id) {
            Some(existing) => existing.environments = incoming.environments,
            None => current.push(incoming),
        }
    }
}

/// 合并进已保存的配置并整体写回
pub fn apply_import<S: KeyValueStore>(
    store: &mut ProjectStore<S>,
    imported: Vec<Project>,
) -> Result<Vec<Project>> {
    let mut projects = store.load()?.projects;
    merge_projects(&mut projects, imported);
    store.save(&projects)?;
    Ok(projects)
}
