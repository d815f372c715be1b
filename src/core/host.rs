use url::Url;

/// 去掉主机名开头的 "www."，用于比较
pub fn normalize_host(host: Option<&str>) -> String {
    let host = host.unwrap_or("");
    host.strip_prefix("www.").unwrap_or(host).to_string()
}

/// 浏览器语义的 host：主机名 + 非默认端口
pub fn host_with_port(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// 解析 URL 并返回规范化后的 host，解析失败返回 None
pub fn normalized_host_of(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    Some(normalize_host(host_with_port(&url).as_deref()))
}
