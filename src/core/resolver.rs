//! 环境匹配与 URL 改写。
//!
//! 所有函数都是纯函数：URL 解析失败时退化为"不匹配"或"原样返回"，从不报错。

use url::Url;

use super::host::{host_with_port, normalize_host, normalized_host_of};
use crate::models::{Environment, Project};

/// 判断 URL 是否属于项目：规范化 host 与任一环境的规范化 host 完全相等
pub fn belongs_to_project(url: &str, project: &Project) -> bool {
    let src = match Url::parse(url) {
        Ok(u) => u,
        Err(_) => return false,
    };
    let src_host = normalize_host(host_with_port(&src).as_deref());

    project
        .environments
        .iter()
        .filter_map(|env| normalized_host_of(&env.url))
        .filter(|h| !h.is_empty())
        .any(|h| h == src_host)
}

/// 把 current_url 改写到目标环境上：scheme/host/port 取自目标，
/// path 按基础路径规则拼接，query 和 fragment 取自当前 URL。
pub fn rewrite_url(target_base_url: &str, current_url: &str) -> String {
    let (src, mut tgt) = match (Url::parse(current_url), Url::parse(target_base_url)) {
        (Ok(s), Ok(t)) => (s, t),
        _ => return target_base_url.to_string(),
    };

    let desired_path = src.path();
    let base_path = match tgt.path() {
        "/" => "",
        p => p.strip_suffix('/').unwrap_or(p),
    };

    let final_path = if !base_path.is_empty() && !has_base_path(desired_path, base_path) {
        join_paths(base_path, desired_path)
    } else {
        desired_path.to_string()
    };

    tgt.set_path(&final_path);
    // 目标自身的 query/fragment 一律丢弃
    tgt.set_query(src.query().filter(|q| !q.is_empty()));
    tgt.set_fragment(src.fragment().filter(|f| !f.is_empty()));
    tgt.to_string()
}

fn has_base_path(path: &str, base_path: &str) -> bool {
    path == base_path
        || path
            .strip_prefix(base_path)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// 用单个 '/' 连接，并折叠连续的斜杠
fn join_paths(base: &str, path: &str) -> String {
    let joined = format!("{}/{}", base, path.strip_prefix('/').unwrap_or(path));
    let mut out = String::with_capacity(joined.len() + 1);
    for ch in joined.chars() {
        if ch == '/' && out.ends_with('/') {
            continue;
        }
        out.push(ch);
    }
    if !out.starts_with('/') {
        out.insert(0, '/');
    }
    out
}

/// 自动选择项目。
///
/// 第一层：任一环境的规范化 host 是当前 host 的子串（子串包含，非完全相等）。
/// 第二层：第一层没有结果时，当前 path 以任一环境的 path 开头。
/// 每层都按列表顺序取第一个命中的项目。
pub fn select_best_project<'a>(url: &str, projects: &'a [Project]) -> Option<&'a Project> {
    let current = Url::parse(url).ok()?;
    let host = host_with_port(&current).unwrap_or_default();

    let by_host = projects.iter().find(|p| {
        p.environments.iter().any(|env| match normalized_host_of(&env.url) {
            Some(env_host) => !env_host.is_empty() && host.contains(&env_host),
            None => false,
        })
    });
    if let Some(project) = by_host {
        tracing::debug!("按 host 匹配到项目: {}", project.id);
        return Some(project);
    }

    let by_path = projects.iter().find(|p| {
        p.environments.iter().any(|env| match Url::parse(&env.url) {
            Ok(env_url) => current.path().starts_with(env_url.path()),
            Err(_) => false,
        })
    });
    if let Some(project) = by_path {
        tracing::debug!("按 path 前缀匹配到项目: {}", project.id);
    }
    by_path
}

/// 当前 URL 以环境 URL 字面量开头时，视为处于该环境
pub fn active_environment<'a>(current_url: &str, project: &'a Project) -> Option<&'a Environment> {
    project
        .environments
        .iter()
        .find(|env| !env.url.is_empty() && current_url.starts_with(&env.url))
}

/// 快速跳转目标：当前页面属于项目时改写路径，否则直接打开环境的基础 URL
pub fn launch_url(project: &Project, env: &Environment, current_url: &str) -> String {
    if belongs_to_project(current_url, project) {
        rewrite_url(&env.url, current_url)
    } else {
        env.url.clone()
    }
}
