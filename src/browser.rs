use std::process::{Command, Stdio};

use crate::error::Result;

/// 标签页/窗口导航
pub trait Navigator {
    /// 在新标签页中打开
    fn open_new(&mut self, url: &str) -> Result<()>;

    /// 在当前标签页中跳转
    fn update_current(&mut self, url: &str) -> Result<()>;
}

/// 调用系统默认浏览器；设置了 $BROWSER 时优先使用。
///
/// 命令行无法控制已打开的标签页，`update_current` 同样打开一个新页面。
pub struct SystemBrowser;

impl SystemBrowser {
    fn launch(url: &str) -> Result<()> {
        let mut command = browser_command(url);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        tracing::info!("已在浏览器中打开 {}", url);
        Ok(())
    }
}

impl Navigator for SystemBrowser {
    fn open_new(&mut self, url: &str) -> Result<()> {
        Self::launch(url)
    }

    fn update_current(&mut self, url: &str) -> Result<()> {
        Self::launch(url)
    }
}

/// 只把目标 URL 打印到 stdout
pub struct PrintNavigator;

impl Navigator for PrintNavigator {
    fn open_new(&mut self, url: &str) -> Result<()> {
        println!("{}", url);
        Ok(())
    }

    fn update_current(&mut self, url: &str) -> Result<()> {
        println!("{}", url);
        Ok(())
    }
}

fn browser_command(url: &str) -> Command {
    if let Ok(custom) = std::env::var("BROWSER") {
        if !custom.trim().is_empty() {
            let mut cmd = Command::new(custom.trim());
            cmd.arg(url);
            return cmd;
        }
    }

    #[cfg(target_os = "windows")]
    {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", "", url]);
        cmd
    }
    #[cfg(target_os = "macos")]
    {
        let mut cmd = Command::new("open");
        cmd.arg(url);
        cmd
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(url);
        cmd
    }
}

/// 测试用：记录所有导航请求
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    pub opened: Vec<String>,
    pub updated: Vec<String>,
}

#[cfg(test)]
impl Navigator for RecordingNavigator {
    fn open_new(&mut self, url: &str) -> Result<()> {
        self.opened.push(url.to_string());
        Ok(())
    }

    fn update_current(&mut self, url: &str) -> Result<()> {
        self.updated.push(url.to_string());
        Ok(())
    }
}
