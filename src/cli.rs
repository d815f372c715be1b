use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use directories::ProjectDirs;
use tracing_subscriber::EnvFilter;

use crate::browser::{PrintNavigator, SystemBrowser};
use crate::core::popup::PopupSession;
use crate::core::{env, transfer};
use crate::error::Result;
use crate::models::Project;
use crate::remote::{self, ImportSession, LoopbackSignIn, SignIn, SignInConfig, StaticToken, UpsunApi};
use crate::storage::{JsonFileStore, ProjectStore};
use crate::tui;

const DATA_FILE_NAME: &str = "storage.json";

#[derive(Parser, Debug)]
#[command(
    name = "project-env-manager",
    version,
    about = "Jump between the environments of your web projects",
    long_about = None
)]
pub struct Cli {
    /// Storage file holding projects and the selected project.
    #[arg(long, global = true, env = "PEM_DATA", value_name = "PATH")]
    pub data: Option<PathBuf>,

    /// Increase logging verbosity.
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Edit projects and environments in a terminal UI (default).
    Edit,

    /// List projects and their environments.
    List,

    /// Select the current project.
    Select {
        /// Project id.
        id: String,
    },

    /// Detect which project a page belongs to and show its environments.
    Detect {
        /// URL of the page you are on.
        #[arg(long)]
        url: String,
    },

    /// Open the current page on another environment.
    Open {
        /// Environment name, e.g. `prod`.
        env: String,

        /// URL of the page you are on.
        #[arg(long)]
        url: String,

        /// Use this project instead of the detected one.
        #[arg(long)]
        project: Option<String>,

        /// Print the target URL instead of opening a browser.
        #[arg(long, action = ArgAction::SetTrue)]
        print: bool,
    },

    /// Go to the login page of the current site, returning to the current page afterwards.
    Login {
        /// URL of the page you are on.
        #[arg(long)]
        url: String,

        /// Use this project instead of the detected one.
        #[arg(long)]
        project: Option<String>,

        /// Print the login URL instead of opening a browser.
        #[arg(long, action = ArgAction::SetTrue)]
        print: bool,
    },

    /// Export all projects to a JSON file.
    Export {
        /// Output file or directory (defaults to a dated file in the current directory).
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Replace all projects with the contents of an exported JSON file.
    Import {
        /// File produced by `export`.
        file: PathBuf,
    },

    /// Import projects and active environments from Upsun.
    ImportUpsun {
        /// API token; skips the browser sign-in.
        #[arg(long, env = "UPSUN_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// OAuth client id used for the browser sign-in.
        #[arg(long, default_value = remote::DEFAULT_CLIENT_ID)]
        client_id: String,

        /// Seconds to wait for the browser sign-in to complete.
        #[arg(long, value_name = "SECS", default_value_t = remote::DEFAULT_SIGN_IN_TIMEOUT.as_secs())]
        timeout: u64,
    },
}

impl Cli {
    /// 编辑器占用终端
    pub fn is_interactive(&self) -> bool {
        matches!(self.command, None | Some(Command::Edit))
    }

    pub fn data_path(&self) -> PathBuf {
        self.data.clone().unwrap_or_else(default_data_path)
    }
}

fn default_data_path() -> PathBuf {
    ProjectDirs::from("", "", "project-env-manager")
        .map(|dirs| dirs.config_dir().join(DATA_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(DATA_FILE_NAME))
}

/// 日志写到 stderr。编辑器运行时默认只输出警告，避免干扰界面。
pub fn init_tracing(verbose: bool, interactive: bool) {
    let default_level = match (verbose, interactive) {
        (true, _) => "project_env_manager=debug",
        (false, true) => "project_env_manager=warn",
        (false, false) => "project_env_manager=info",
    };
    let filter = if verbose {
        EnvFilter::new(default_level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn open_store(path: &Path) -> Result<ProjectStore<JsonFileStore>> {
    let store = ProjectStore::new(JsonFileStore::load(path)?);
    tracing::debug!("存储文件: {}", store.inner().file_path().display());
    Ok(store)
}

pub async fn run(cli: Cli) -> Result<()> {
    let data_path = cli.data_path();

    match cli.command.unwrap_or(Command::Edit) {
        Command::Edit => {
            let mut app = tui::App::new(&data_path)?;
            app.run()?;
        }
        Command::List => {
            let config = open_store(&data_path)?.load()?;
            print!("{}", render_list(&config.projects, &config.selected_project_id));
        }
        Command::Select { id } => {
            let mut store = open_store(&data_path)?;
            let mut session = PopupSession::open(&mut store, None)?;
            session.select(&id)?;
            println!("Selected project: {}", id);
        }
        Command::Detect { url } => {
            let mut store = open_store(&data_path)?;
            let session = PopupSession::open(&mut store, Some(url.as_str()))?;
            match session.selected_project() {
                Some(project) => {
                    println!("Project: {}", project.id);
                    for button in session.environment_buttons(Some(url.as_str())) {
                        let marker = if button.active { "*" } else { " " };
                        println!("{} {}", marker, button.label);
                    }
                }
                None => println!("No projects configured"),
            }
        }
        Command::Open {
            env,
            url,
            project,
            print,
        } => {
            let mut store = open_store(&data_path)?;
            let mut session = PopupSession::open(&mut store, Some(url.as_str()))?;
            if let Some(id) = project {
                session.select(&id)?;
            }
            if print {
                session.open_env(&env, &url, &mut PrintNavigator)?;
            } else {
                session.open_env(&env, &url, &mut SystemBrowser)?;
            }
        }
        Command::Login {
            url,
            project,
            print,
        } => {
            let mut store = open_store(&data_path)?;
            let mut session = PopupSession::open(&mut store, Some(url.as_str()))?;
            if let Some(id) = project {
                session.select(&id)?;
            }
            if print {
                session.go_to_login(&url, &mut PrintNavigator)?;
            } else {
                session.go_to_login(&url, &mut SystemBrowser)?;
            }
        }
        Command::Export { output } => {
            let store = open_store(&data_path)?;
            let config = store.load()?;
            let path = transfer::write_export(&config.projects, output.as_deref())?;
            println!(
                "Exported {} projects to {}",
                config.projects.len(),
                path.display()
            );
        }
        Command::Import { file } => {
            let mut store = open_store(&data_path)?;
            let projects = transfer::import_file(&mut store, &file)?;
            println!("Imported {} projects from {}", projects.len(), file.display());
        }
        Command::ImportUpsun {
            token,
            client_id,
            timeout,
        } => {
            let session = ImportSession::new();
            let imported = match token {
                Some(token) => fetch_upsun(&session, &mut StaticToken::new(token)).await?,
                None => {
                    let config = SignInConfig {
                        client_id,
                        timeout: Duration::from_secs(timeout),
                        ..SignInConfig::default()
                    };
                    let mut sign_in = LoopbackSignIn::new(config, SystemBrowser)?;
                    fetch_upsun(&session, &mut sign_in).await?
                }
            };

            let count = imported.len();
            let mut store = open_store(&data_path)?;
            let projects = remote::apply_import(&mut store, imported)?;
            println!(
                "Imported {} projects from Upsun ({} projects total)",
                count,
                projects.len()
            );
        }
    }

    Ok(())
}

async fn fetch_upsun<I: SignIn>(session: &ImportSession, sign_in: &mut I) -> Result<Vec<Project>> {
    session.fetch(sign_in, |token| UpsunApi::new(token)).await
}

/// 每个项目一行，环境缩进列出；当前选中的项目以 '*' 标记
fn render_list(projects: &[Project], selected: &str) -> String {
    let mut out = String::new();
    for project in projects {
        let marker = if project.id == selected { "*" } else { " " };
        out.push_str(&format!("{} {}\n", marker, project.id));
        let environments = env::list_environments(projects, &project.id).unwrap_or_default();
        if environments.is_empty() {
            out.push_str("    (no environments)\n");
        }
        for environment in environments {
            out.push_str(&format!("    {:<10} {}\n", environment.name, environment.url));
        }
    }
    out
}
