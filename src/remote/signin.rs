//! 交互式登录：本地回调 + 授权码换取 access token

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::sync::{oneshot, Mutex};
use url::Url;
use uuid::Uuid;

use crate::browser::Navigator;
use crate::error::{EnvError, Result};

pub const UPSUN_AUTHORIZE_URL: &str = "https://auth.upsun.com/oauth2/authorize";
pub const UPSUN_TOKEN_URL: &str = "https://auth.upsun.com/oauth2/token";
pub const DEFAULT_CLIENT_ID: &str = "project-env-manager";
pub const DEFAULT_SIGN_IN_TIMEOUT: Duration = Duration::from_secs(300);

/// 产出一个 bearer token，或失败
#[allow(async_fn_in_trait)]
pub trait SignIn {
    async fn acquire_token(&mut self) -> Result<String>;
}

/// 直接使用已有的 token
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl SignIn for StaticToken {
    async fn acquire_token(&mut self) -> Result<String> {
        if self.0.trim().is_empty() {
            return Err(EnvError::SignIn("empty token".to_string()));
        }
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone)]
pub struct SignInConfig {
    pub authorize_url: String,
    pub token_url: String,
    pub client_id: String,
    pub timeout: Duration,
}

impl Default for SignInConfig {
    fn default() -> Self {
        Self {
            authorize_url: UPSUN_AUTHORIZE_URL.to_string(),
            token_url: UPSUN_TOKEN_URL.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            timeout: DEFAULT_SIGN_IN_TIMEOUT,
        }
    }
}

/// 在 127.0.0.1 上临时监听回调，用浏览器打开授权页，
/// 收到授权码后换取 access token。回调只会被接受一次。
pub struct LoopbackSignIn<N> {
    config: SignInConfig,
    navigator: N,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

type CodeSender = oneshot::Sender<Result<String>>;

#[derive(Clone)]
struct CallbackState {
    expected_state: String,
    sender: Arc<Mutex<Option<CodeSender>>>,
}

impl<N: Navigator> LoopbackSignIn<N> {
    pub fn new(config: SignInConfig, navigator: N) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            config,
            navigator,
            http,
        })
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", self.config.client_id.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(EnvError::SignIn(format!(
                "token endpoint returned status {}",
                response.status()
            )));
        }
        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }
}

impl<N: Navigator> SignIn for LoopbackSignIn<N> {
    async fn acquire_token(&mut self) -> Result<String> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let redirect_uri = format!("http://{}/callback", listener.local_addr()?);
        let state = Uuid::new_v4().to_string();

        let (code_tx, code_rx) = oneshot::channel();
        let app = callback_router(CallbackState {
            expected_state: state.clone(),
            sender: Arc::new(Mutex::new(Some(code_tx))),
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = server.await {
                tracing::warn!("登录回调服务异常退出: {}", e);
            }
        });

        let authorize = authorize_url(&self.config, &redirect_uri, &state)?;
        tracing::info!("等待浏览器完成登录: {}", authorize);
        self.navigator.open_new(&authorize)?;

        let outcome = tokio::time::timeout(self.config.timeout, code_rx).await;
        let _ = shutdown_tx.send(());

        let code = match outcome {
            Err(_) => return Err(EnvError::SignInTimeout(self.config.timeout.as_secs())),
            Ok(Err(_)) => return Err(EnvError::SignIn("callback closed".to_string())),
            Ok(Ok(result)) => result?,
        };

        self.exchange_code(&code, &redirect_uri).await
    }
}

fn authorize_url(config: &SignInConfig, redirect_uri: &str, state: &str) -> Result<String> {
    let mut url = Url::parse(&config.authorize_url)
        .map_err(|e| EnvError::InvalidUrl(format!("{}: {}", config.authorize_url, e)))?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("state", state);
    Ok(url.to_string())
}

fn callback_router(state: CallbackState) -> Router {
    Router::new()
        .route("/callback", get(handle_callback))
        .with_state(state)
}

async fn handle_callback(
    State(callback): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    // state 不匹配的请求直接拒绝，不消耗回调
    if params.state.as_deref() != Some(callback.expected_state.as_str()) {
        return (StatusCode::BAD_REQUEST, "state mismatch").into_response();
    }

    let result = match (params.code, params.error) {
        (_, Some(error)) => Err(EnvError::SignIn(match params.error_description {
            Some(desc) => format!("{}: {}", error, desc),
            None => error,
        })),
        (Some(code), None) if !code.is_empty() => Ok(code),
        _ => Err(EnvError::SignIn("callback without code".to_string())),
    };
    let succeeded = result.is_ok();

    match callback.sender.lock().await.take() {
        Some(sender) => {
            let _ = sender.send(result);
        }
        None => return (StatusCode::GONE, "sign-in already completed").into_response(),
    }

    if succeeded {
        Html("<p>Signed in. You can close this window.</p>").into_response()
    } else {
        (StatusCode::BAD_REQUEST, Html("<p>Sign-in failed.</p>")).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::{Form, Json};
    use std::collections::HashMap;

    fn callback_state() -> (CallbackState, oneshot::Receiver<Result<String>>) {
        let (tx, rx) = oneshot::channel();
        (
            CallbackState {
                expected_state: "s1".to_string(),
                sender: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    fn params(code: Option<&str>, state: Option<&str>, error: Option<&str>) -> CallbackParams {
        CallbackParams {
            code: code.map(str::to_string),
            state: state.map(str::to_string),
            error: error.map(str::to_string),
            error_description: None,
        }
    }

    #[test]
    fn test_authorize_url() {
        let url = authorize_url(&SignInConfig::default(), "http://127.0.0.1:5555/callback", "abc").unwrap();
        let parsed = Url::parse(&url).unwrap();
        let query: HashMap<_, _> = parsed.query_pairs().into_owned().collect();

        assert!(url.starts_with(UPSUN_AUTHORIZE_URL));
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["client_id"], DEFAULT_CLIENT_ID);
        assert_eq!(query["redirect_uri"], "http://127.0.0.1:5555/callback");
        assert_eq!(query["state"], "abc");
    }

    #[tokio::test]
    async fn test_callback_resolves_once() {
        let (state, rx) = callback_state();

        let first = handle_callback(State(state.clone()), Query(params(Some("c1"), Some("s1"), None))).await;
        assert_eq!(first.status(), StatusCode::OK);
        let second = handle_callback(State(state), Query(params(Some("c2"), Some("s1"), None))).await;
        assert_eq!(second.status(), StatusCode::GONE);

        assert_eq!(rx.await.unwrap().unwrap(), "c1");
    }

    #[tokio::test]
    async fn test_callback_ignores_wrong_state() {
        let (state, rx) = callback_state();

        let resp = handle_callback(State(state.clone()), Query(params(Some("evil"), Some("other"), None))).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        handle_callback(State(state), Query(params(Some("good"), Some("s1"), None))).await;
        assert_eq!(rx.await.unwrap().unwrap(), "good");
    }

    #[tokio::test]
    async fn test_callback_reports_provider_error() {
        let (state, rx) = callback_state();
        handle_callback(State(state), Query(params(None, Some("s1"), Some("access_denied")))).await;

        let err = rx.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("access_denied"));
    }

    #[tokio::test]
    async fn test_static_token() {
        assert_eq!(StaticToken::new("t").acquire_token().await.unwrap(), "t");
        assert!(StaticToken::new(" ").acquire_token().await.is_err());
    }

    /// 模拟浏览器：打开授权页后立刻带着授权码访问回调地址
    struct FakeBrowser;

    impl Navigator for FakeBrowser {
        fn open_new(&mut self, url: &str) -> Result<()> {
            let parsed = Url::parse(url).unwrap();
            let query: HashMap<_, _> = parsed.query_pairs().into_owned().collect();
            let callback = format!(
                "{}?code=auth-code&state={}",
                query["redirect_uri"], query["state"]
            );
            tokio::spawn(async move {
                reqwest::get(callback).await.unwrap();
            });
            Ok(())
        }

        fn update_current(&mut self, _url: &str) -> Result<()> {
            Ok(())
        }
    }

    /// 从不完成登录
    struct IdleBrowser;

    impl Navigator for IdleBrowser {
        fn open_new(&mut self, _url: &str) -> Result<()> {
            Ok(())
        }

        fn update_current(&mut self, _url: &str) -> Result<()> {
            Ok(())
        }
    }

    async fn token_endpoint(Form(form): Form<HashMap<String, String>>) -> Json<serde_json::Value> {
        assert_eq!(form["grant_type"], "authorization_code");
        Json(serde_json::json!({"access_token": format!("token-for-{}", form["code"])}))
    }

    #[tokio::test]
    async fn test_loopback_flow_exchanges_code() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let app = Router::new().route("/oauth2/token", post(token_endpoint));
            axum::serve(listener, app).await.unwrap();
        });

        let config = SignInConfig {
            authorize_url: format!("http://{}/oauth2/authorize", addr),
            token_url: format!("http://{}/oauth2/token", addr),
            timeout: Duration::from_secs(10),
            ..SignInConfig::default()
        };
        let mut sign_in = LoopbackSignIn::new(config, FakeBrowser).unwrap();
        assert_eq!(sign_in.acquire_token().await.unwrap(), "token-for-auth-code");
    }

    #[tokio::test]
    async fn test_loopback_flow_times_out() {
        let config = SignInConfig {
            timeout: Duration::from_millis(50),
            ..SignInConfig::default()
        };
        let mut sign_in = LoopbackSignIn::new(config, IdleBrowser).unwrap();
        let err = sign_in.acquire_token().await.unwrap_err();
        assert!(matches!(err, EnvError::SignInTimeout(_)));
    }
}
