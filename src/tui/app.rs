use std::io;
use std::path::Path;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};
use ratatui::Terminal;

use crate::core::{env, project, resolver};
use crate::models::Project;
use crate::storage::{JsonFileStore, ProjectStore};

/// 菜单面板
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuPanel {
    Projects,
    Environments,
    Preview,
}

impl MenuPanel {
    const ALL: [MenuPanel; 3] = [
        MenuPanel::Projects,
        MenuPanel::Environments,
        MenuPanel::Preview,
    ];

    fn label(self) -> &'static str {
        match self {
            MenuPanel::Projects => "Projects",
            MenuPanel::Environments => "Environments",
            MenuPanel::Preview => "Preview",
        }
    }
}

/// 焦点区域：菜单 or 内容
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Menu,
    Content,
}

/// 内容区域的输入模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// 浏览列表
    Normal,
    /// 填写创建/编辑表单
    Creating,
    /// 确认删除
    Deleting,
}

/// 配置编辑器。所有修改只作用于内存中的工作副本，按 's' 时整体保存。
pub struct App {
    store: ProjectStore<JsonFileStore>,
    projects: Vec<Project>,
    /// 有未保存的修改
    dirty: bool,
    selected_menu: usize,
    focus: Focus,
    status_message: String,
    running: bool,
    content_items: Vec<String>,
    content_selected: usize,
    input_mode: InputMode,
    input_field: usize,
    /// 表单字段：(标签, 值)
    input_fields: Vec<(String, String)>,
    /// 正在编辑的条目（项目 id 或环境名）；None 表示新建
    editing: Option<String>,
    /// 当前项目（Environments/Preview 面板使用）
    current_project: Option<String>,
    /// Preview 面板中模拟的当前页面 URL
    preview_url: Option<String>,
}

impl App {
    /// 从存储文件创建编辑器
    pub fn new(data_path: &Path) -> crate::error::Result<Self> {
        let store = ProjectStore::new(JsonFileStore::load(data_path)?);
        Self::with_store(store)
    }

    pub fn with_store(store: ProjectStore<JsonFileStore>) -> crate::error::Result<Self> {
        let config = store.load()?;
        let current_project = Some(config.selected_project_id.clone()).filter(|id| !id.is_empty());
        let mut app = Self {
            store,
            projects: config.projects,
            dirty: false,
            selected_menu: 0,
            focus: Focus::Menu,
            status_message: "Ready".to_string(),
            running: true,
            content_items: Vec::new(),
            content_selected: 0,
            input_mode: InputMode::Normal,
            input_field: 0,
            input_fields: Vec::new(),
            editing: None,
            current_project,
            preview_url: None,
        };
        app.refresh_content();
        Ok(app)
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn selected_panel(&self) -> MenuPanel {
        MenuPanel::ALL[self.selected_menu]
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = msg.into();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn input_mode(&self) -> InputMode {
        self.input_mode
    }

    pub fn content_items(&self) -> &[String] {
        &self.content_items
    }

    pub fn input_fields(&self) -> &[(String, String)] {
        &self.input_fields
    }

    pub fn current_project(&self) -> Option<&str> {
        self.current_project.as_deref()
    }

    /// 当前项目不存在时取第一个项目
    fn ensure_current_project(&mut self) {
        let exists = self
            .current_project
            .as_deref()
            .is_some_and(|id| self.projects.iter().any(|p| p.id == id));
        if !exists {
            self.current_project = self.projects.first().map(|p| p.id.clone());
        }
    }

    fn current(&self) -> Option<&Project> {
        let id = self.current_project.as_deref()?;
        self.projects.iter().find(|p| p.id == id)
    }

    /// 切换到下一个项目
    fn cycle_project(&mut self) {
        if self.projects.is_empty() {
            return;
        }
        let current = self.current_project.as_deref().unwrap_or("");
        let idx = self.projects.iter().position(|p| p.id == current).unwrap_or(0);
        let next = (idx + 1) % self.projects.len();
        self.current_project = Some(self.projects[next].id.clone());
        self.refresh_content();
        self.set_status(format!(
            "Switched to project: {}",
            self.current_project.as_deref().unwrap_or("")
        ));
    }

    /// 根据当前面板刷新内容列表
    pub fn refresh_content(&mut self) {
        self.ensure_current_project();
        self.content_items = match self.selected_panel() {
            MenuPanel::Projects => self
                .projects
                .iter()
                .map(|p| {
                    let marker = if Some(p.id.as_str()) == self.current_project.as_deref() {
                        "* "
                    } else {
                        ""
                    };
                    format!("{}{} ({} envs)", marker, p.id, p.environments.len())
                })
                .collect(),
            MenuPanel::Environments => match self.current() {
                Some(p) => p
                    .environments
                    .iter()
                    .map(|e| format!("{} → {}", e.name, e.url))
                    .collect(),
                None => Vec::new(),
            },
            MenuPanel::Preview => match (self.current(), self.preview_url.as_deref()) {
                (Some(p), Some(url)) => {
                    let on_project = resolver::belongs_to_project(url, p);
                    let mut items = vec![format!(
                        "{} {}",
                        if on_project { "on project:" } else { "not on project:" },
                        url
                    )];
                    items.extend(p.environments.iter().map(|e| {
                        format!("{} → {}", e.name, resolver::launch_url(p, e, url))
                    }));
                    items
                }
                _ => Vec::new(),
            },
        };
        // 修正选中索引
        if self.content_items.is_empty() {
            self.content_selected = 0;
        } else if self.content_selected >= self.content_items.len() {
            self.content_selected = self.content_items.len() - 1;
        }
    }

    /// 启动 TUI 事件循环
    pub fn run(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> io::Result<()> {
        while self.running {
            terminal.draw(|frame| self.render(frame))?;

            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                self.handle_key(key.code);
            }
        }
        Ok(())
    }

    /// 处理键盘输入
    fn handle_key(&mut self, code: KeyCode) {
        // 创建/删除模式下优先处理
        match self.input_mode {
            InputMode::Creating => {
                self.handle_create_key(code);
                return;
            }
            InputMode::Deleting => {
                self.handle_delete_key(code);
                return;
            }
            InputMode::Normal => {}
        }

        match code {
            KeyCode::Char('q') => self.running = false,
            KeyCode::Char('s') => self.save(),
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Focus::Menu => Focus::Content,
                    Focus::Content => Focus::Menu,
                };
            }
            _ if self.focus == Focus::Menu => self.handle_menu_key(code),
            _ if self.focus == Focus::Content => self.handle_content_key(code),
            _ => {}
        }
    }

    /// 整体保存工作副本
    fn save(&mut self) {
        match self.store.save(&self.projects) {
            Ok(selected) => {
                self.dirty = false;
                tracing::info!("编辑器保存完成，选中项目: {:?}", selected);
                self.set_status(format!("Saved {} projects", self.projects.len()));
            }
            Err(e) => self.set_status(format!("Error: {}", e)),
        }
    }

    /// 菜单区域按键处理
    fn handle_menu_key(&mut self, code: KeyCode) {
        let prev = self.selected_menu;
        match code {
            KeyCode::Up => {
                if self.selected_menu > 0 {
                    self.selected_menu -= 1;
                }
            }
            KeyCode::Down => {
                if self.selected_menu < MenuPanel::ALL.len() - 1 {
                    self.selected_menu += 1;
                }
            }
            KeyCode::Enter => {
                let panel = self.selected_panel();
                self.set_status(format!("Selected: {}", panel.label()));
            }
            _ => {}
        }
        // 面板切换时刷新内容
        if self.selected_menu != prev {
            self.content_selected = 0;
            self.refresh_content();
        }
    }

    /// 内容区域 Normal 模式按键处理
    fn handle_content_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Up => {
                if self.content_selected > 0 {
                    self.content_selected -= 1;
                }
            }
            KeyCode::Down => {
                if !self.content_items.is_empty()
                    && self.content_selected < self.content_items.len() - 1
                {
                    self.content_selected += 1;
                }
            }
            KeyCode::Enter => {
                // Projects 面板：设为当前项目
                if self.selected_panel() == MenuPanel::Projects {
                    if let Some(p) = self.projects.get(self.content_selected) {
                        self.current_project = Some(p.id.clone());
                        self.set_status(format!("Current project: {}", p.id));
                        self.refresh_content();
                    }
                }
            }
            KeyCode::Char('n') => self.start_creating(),
            KeyCode::Char('e') => self.start_editing(),
            KeyCode::Char('d') => {
                if !self.content_items.is_empty() && self.selected_panel() != MenuPanel::Preview {
                    self.input_mode = InputMode::Deleting;
                    self.set_status("Delete? y=confirm, n/Esc=cancel");
                }
            }
            KeyCode::Char('p') => self.cycle_project(),
            _ => {}
        }
    }

    fn open_form(&mut self, fields: Vec<(&str, String)>, editing: Option<String>, focus: usize) {
        self.input_fields = fields
            .into_iter()
            .map(|(label, value)| (label.to_string(), value))
            .collect();
        self.input_field = focus;
        self.editing = editing;
        self.input_mode = InputMode::Creating;
    }

    /// 开始创建流程，初始化表单字段
    fn start_creating(&mut self) {
        match self.selected_panel() {
            MenuPanel::Projects => {
                self.open_form(
                    vec![
                        ("Id", String::new()),
                        ("Login URL", String::new()),
                        ("Destination param", String::new()),
                    ],
                    None,
                    0,
                );
            }
            MenuPanel::Environments => {
                if self.current_project.is_none() {
                    self.set_status("Error: no project selected, create a project first");
                    return;
                }
                self.open_form(vec![("Name", String::new()), ("URL", String::new())], None, 0);
            }
            MenuPanel::Preview => {
                let url = self.preview_url.clone().unwrap_or_default();
                self.open_form(vec![("Current URL", url)], None, 0);
            }
        }
        self.set_status("Creating... Tab=next field, Enter=confirm, Esc=cancel");
    }

    /// 开始编辑流程：项目设置、环境 URL、预览 URL
    fn start_editing(&mut self) {
        match self.selected_panel() {
            MenuPanel::Projects => {
                let Some(p) = self.projects.get(self.content_selected) else {
                    return;
                };
                let fields = vec![
                    ("Id", p.id.clone()),
                    ("Login URL", p.login_url.clone().unwrap_or_default()),
                    ("Destination param", p.destination_param.clone().unwrap_or_default()),
                ];
                let id = p.id.clone();
                self.open_form(fields, Some(id), 1);
            }
            MenuPanel::Environments => {
                let Some(e) = self
                    .current()
                    .and_then(|p| p.environments.get(self.content_selected))
                else {
                    return;
                };
                let fields = vec![("Name", e.name.clone()), ("URL", e.url.clone())];
                let name = e.name.clone();
                // 默认聚焦到 URL 字段
                self.open_form(fields, Some(name), 1);
            }
            MenuPanel::Preview => {
                self.start_creating();
                return;
            }
        }
        self.set_status("Editing... Tab=next field, Enter=confirm, Esc=cancel");
    }

    /// 创建模式按键处理
    fn handle_create_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.close_form();
                self.set_status("Cancelled");
            }
            KeyCode::Tab | KeyCode::BackTab => {
                if !self.input_fields.is_empty() {
                    if code == KeyCode::BackTab && self.input_field > 0 {
                        self.input_field -= 1;
                    } else if code == KeyCode::Tab {
                        self.input_field = (self.input_field + 1) % self.input_fields.len();
                    }
                }
            }
            KeyCode::Enter => self.confirm_create(),
            KeyCode::Backspace => {
                if let Some((_label, value)) = self.input_fields.get_mut(self.input_field) {
                    value.pop();
                }
            }
            KeyCode::Char(c) => {
                if let Some((_label, value)) = self.input_fields.get_mut(self.input_field) {
                    value.push(c);
                }
            }
            _ => {}
        }
    }

    /// 确认创建/编辑。失败时保留表单，便于修正后重试。
    fn confirm_create(&mut self) {
        let proj = self.current_project.clone().unwrap_or_default();
        let result = match self.selected_panel() {
            MenuPanel::Projects => {
                let id = self.field_value(0);
                let login = self.field_value(1);
                let dest = self.field_value(2);
                match self.editing.clone() {
                    Some(existing) => self.apply_edit(|projects| {
                        let renamed = project::rename_project(projects, &existing, &id)?;
                        project::update_project_settings(
                            projects,
                            &renamed.id,
                            Some(&login),
                            Some(&dest),
                        )
                    })
                    .map(|p| {
                        if self.current_project.as_deref() == Some(existing.as_str()) {
                            self.current_project = Some(p.id.clone());
                        }
                        format!("Project '{}' updated", p.id)
                    }),
                    None => project::create_project(&mut self.projects, &id, Some(&login), Some(&dest))
                        .map(|p| {
                            if self.current_project.is_none() {
                                self.current_project = Some(p.id.clone());
                            }
                            format!("Project '{}' created", p.id)
                        }),
                }
            }
            MenuPanel::Environments => {
                let name = self.field_value(0);
                let url = self.field_value(1);
                match self.editing.clone() {
                    Some(existing) => self
                        .apply_edit(|projects| {
                            let renamed = env::rename_environment(projects, &proj, &existing, &name)?;
                            env::update_environment_url(projects, &proj, &renamed.name, &url)
                        })
                        .map(|e| format!("Environment '{}' updated", e.name)),
                    None => env::create_environment(&mut self.projects, &proj, &name, &url)
                        .map(|e| format!("Environment '{}' created", e.name)),
                }
            }
            MenuPanel::Preview => {
                let url = self.field_value(0);
                self.preview_url = Some(url).filter(|u| !u.is_empty());
                self.close_form();
                self.refresh_content();
                self.set_status("Preview updated");
                return;
            }
        };

        match result {
            Ok(msg) => {
                self.dirty = true;
                self.close_form();
                self.set_status(msg);
            }
            Err(e) => self.set_status(format!("Error: {}", e)),
        }
        self.refresh_content();
    }

    /// 在副本上执行多步修改，全部成功才提交
    fn apply_edit<T>(
        &mut self,
        edit: impl FnOnce(&mut Vec<Project>) -> crate::error::Result<T>,
    ) -> crate::error::Result<T> {
        let mut draft = self.projects.clone();
        let value = edit(&mut draft)?;
        self.projects = draft;
        Ok(value)
    }

    fn close_form(&mut self) {
        self.input_mode = InputMode::Normal;
        self.input_fields.clear();
        self.editing = None;
    }

    /// 从表单字段获取 trimmed 值
    fn field_value(&self, idx: usize) -> String {
        self.input_fields
            .get(idx)
            .map(|(_, v)| v.trim().to_string())
            .unwrap_or_default()
    }

    /// 删除模式按键处理
    fn handle_delete_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('y') => self.confirm_delete(),
            KeyCode::Char('n') | KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                self.set_status("Cancelled");
            }
            _ => {}
        }
    }

    /// 确认删除
    fn confirm_delete(&mut self) {
        let result = match self.selected_panel() {
            MenuPanel::Projects => match self.projects.get(self.content_selected).map(|p| p.id.clone()) {
                Some(id) => project::delete_project(&mut self.projects, &id)
                    .map(|p| format!("Project '{}' deleted", p.id)),
                None => Ok(String::new()),
            },
            MenuPanel::Environments => {
                let proj = self.current_project.clone().unwrap_or_default();
                let name = self
                    .current()
                    .and_then(|p| p.environments.get(self.content_selected))
                    .map(|e| e.name.clone());
                match name {
                    Some(name) => env::delete_environment(&mut self.projects, &proj, &name)
                        .map(|e| format!("Environment '{}' deleted", e.name)),
                    None => Ok(String::new()),
                }
            }
            MenuPanel::Preview => Ok(String::new()),
        };
        match result {
            Ok(msg) if !msg.is_empty() => {
                self.dirty = true;
                self.set_status(msg);
            }
            Ok(_) => {}
            Err(e) => self.set_status(format!("Error: {}", e)),
        }
        self.input_mode = InputMode::Normal;
        self.refresh_content();
    }

    /// 渲染整个界面
    fn render(&self, frame: &mut ratatui::Frame) {
        let area = frame.area();

        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(1),
                Constraint::Length(3),
            ])
            .split(area);

        self.render_title(frame, outer[0]);
        self.render_body(frame, outer[1]);
        self.render_status(frame, outer[2]);
    }

    fn render_title(&self, frame: &mut ratatui::Frame, area: Rect) {
        let text = if self.dirty {
            "Project Env Manager - Editor [unsaved]"
        } else {
            "Project Env Manager - Editor"
        };
        let title = Paragraph::new(text)
            .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(title, area);
    }

    fn render_body(&self, frame: &mut ratatui::Frame, area: Rect) {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(20), Constraint::Min(1)])
            .split(area);

        self.render_menu(frame, cols[0]);
        self.render_content(frame, cols[1]);
    }

    fn render_menu(&self, frame: &mut ratatui::Frame, area: Rect) {
        let items: Vec<ListItem> = MenuPanel::ALL
            .iter()
            .enumerate()
            .map(|(i, panel)| {
                let style = if i == self.selected_menu {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                let prefix = if i == self.selected_menu { "> " } else { "  " };
                ListItem::new(format!("{}{}", prefix, panel.label())).style(style)
            })
            .collect();

        let border_style = if self.focus == Focus::Menu {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        let menu = List::new(items).block(
            Block::default()
                .title(" Menu ")
                .borders(Borders::ALL)
                .border_style(border_style),
        );
        frame.render_widget(menu, area);
    }

    fn render_content(&self, frame: &mut ratatui::Frame, area: Rect) {
        let panel = self.selected_panel();
        let border_style = if self.focus == Focus::Content {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        let block = Block::default()
            .title(self.content_title(panel))
            .borders(Borders::ALL)
            .border_style(border_style);

        match self.input_mode {
            InputMode::Normal => {
                if self.content_items.is_empty() {
                    let hint = match panel {
                        MenuPanel::Environments => "No environments configured. Press 'n' to create.",
                        MenuPanel::Preview => "Press 'n' to enter the URL of the page you are on.",
                        MenuPanel::Projects => "No items. Press 'n' to create.",
                    };
                    frame.render_widget(Paragraph::new(hint).block(block), area);
                } else {
                    let items: Vec<ListItem> = self
                        .content_items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| {
                            let style = if i == self.content_selected {
                                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                            } else {
                                Style::default()
                            };
                            let prefix = if i == self.content_selected { "> " } else { "  " };
                            ListItem::new(format!("{}{}", prefix, item)).style(style)
                        })
                        .collect();
                    frame.render_widget(List::new(items).block(block), area);
                }
            }
            InputMode::Creating => {
                let mut lines: Vec<Line> = vec![
                    Line::from(Span::styled(
                        format!("Create/Edit {}:", panel.label()),
                        Style::default().add_modifier(Modifier::BOLD),
                    )),
                    Line::from(""),
                ];

                for (i, (label, value)) in self.input_fields.iter().enumerate() {
                    let is_active = i == self.input_field;
                    let indicator = if is_active { "▶ " } else { "  " };
                    let label_style = if is_active {
                        Style::default().fg(Color::Cyan)
                    } else {
                        Style::default().fg(Color::DarkGray)
                    };
                    lines.push(Line::from(vec![
                        Span::raw(indicator),
                        Span::styled(format!("{}: ", label), label_style),
                        Span::styled(value.as_str(), Style::default().fg(Color::White)),
                        if is_active {
                            Span::styled("█", Style::default().fg(Color::Cyan))
                        } else {
                            Span::raw("")
                        },
                    ]));
                }

                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    "Tab=next field  Enter=confirm  Esc=cancel",
                    Style::default().fg(Color::DarkGray),
                )));

                frame.render_widget(Paragraph::new(lines).block(block), area);
            }
            InputMode::Deleting => {
                let item_name = self
                    .content_items
                    .get(self.content_selected)
                    .cloned()
                    .unwrap_or_default();
                let lines = vec![
                    Line::from(Span::styled(
                        "Confirm delete?",
                        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                    )),
                    Line::from(""),
                    Line::from(format!("  {}", item_name)),
                    Line::from(""),
                    Line::from(Span::styled(
                        "y=confirm  n/Esc=cancel",
                        Style::default().fg(Color::DarkGray),
                    )),
                ];
                frame.render_widget(Paragraph::new(lines).block(block), area);
            }
        }
    }

    /// 构建内容面板标题（含上下文信息）
    fn content_title(&self, panel: MenuPanel) -> String {
        let proj = self.current_project.as_deref().unwrap_or("none");
        match panel {
            MenuPanel::Projects => " Projects (Enter=make current) ".to_string(),
            MenuPanel::Environments => format!(" Environments [project: {}] (p=project) ", proj),
            MenuPanel::Preview => format!(" Preview [project: {}] (p=project) ", proj),
        }
    }

    fn render_status(&self, frame: &mut ratatui::Frame, area: Rect) {
        let status = Line::from(vec![
            Span::styled("Status: ", Style::default().fg(Color::DarkGray)),
            Span::styled(&self.status_message, Style::default().fg(Color::Green)),
            Span::raw(" | "),
            Span::styled(
                "q:Quit  Tab:Switch  ↑↓:Navigate  n:New  d:Delete  e:Edit  p:Project  s:Save",
                Style::default().fg(Color::DarkGray),
            ),
        ]);
        let bar = Paragraph::new(status).block(Block::default().borders(Borders::ALL));
        frame.render_widget(bar, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Environment;
    use tempfile::NamedTempFile;

    fn test_app() -> (App, NamedTempFile) {
        let tmp = NamedTempFile::new().unwrap();
        let app = App::new(tmp.path()).unwrap();
        (app, tmp)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(KeyCode::Char(c));
        }
    }

    fn reload(tmp: &NamedTempFile) -> crate::models::Configuration {
        ProjectStore::new(JsonFileStore::load(tmp.path()).unwrap())
            .load()
            .unwrap()
    }

    #[test]
    fn test_initial_state() {
        let (app, _tmp) = test_app();
        assert_eq!(app.selected_panel(), MenuPanel::Projects);
        assert_eq!(app.focus(), Focus::Menu);
        assert_eq!(app.status_message(), "Ready");
        assert!(app.is_running());
        assert!(!app.is_dirty());
        assert_eq!(app.input_mode(), InputMode::Normal);
        assert_eq!(app.content_items(), &["* Example Site (3 envs)".to_string()]);
        assert_eq!(app.current_project(), Some("Example Site"));
    }

    #[test]
    fn test_menu_navigation() {
        let (mut app, _tmp) = test_app();
        app.handle_key(KeyCode::Down);
        assert_eq!(app.selected_panel(), MenuPanel::Environments);
        app.handle_key(KeyCode::Down);
        assert_eq!(app.selected_panel(), MenuPanel::Preview);
        app.handle_key(KeyCode::Down);
        assert_eq!(app.selected_panel(), MenuPanel::Preview);
        for _ in 0..5 {
            app.handle_key(KeyCode::Up);
        }
        assert_eq!(app.selected_panel(), MenuPanel::Projects);
    }

    #[test]
    fn test_tab_switches_focus() {
        let (mut app, _tmp) = test_app();
        app.handle_key(KeyCode::Tab);
        assert_eq!(app.focus(), Focus::Content);
        app.handle_key(KeyCode::Tab);
        assert_eq!(app.focus(), Focus::Menu);
    }

    #[test]
    fn test_quit() {
        let (mut app, _tmp) = test_app();
        app.handle_key(KeyCode::Char('q'));
        assert!(!app.is_running());
    }

    #[test]
    fn test_create_project_and_save() {
        let (mut app, tmp) = test_app();
        app.handle_key(KeyCode::Tab);
        app.handle_key(KeyCode::Char('n'));
        assert_eq!(app.input_mode(), InputMode::Creating);

        type_text(&mut app, "Shop");
        app.handle_key(KeyCode::Tab);
        type_text(&mut app, "/admin");
        app.handle_key(KeyCode::Enter);

        assert_eq!(app.input_mode(), InputMode::Normal);
        assert!(app.is_dirty());
        assert_eq!(app.projects().len(), 2);
        assert_eq!(app.projects()[1].login_url.as_deref(), Some("/admin"));
        assert_eq!(app.projects()[1].destination_param, None);

        // 未保存前存储不变
        assert_eq!(reload(&tmp).projects.len(), 1);

        app.handle_key(KeyCode::Char('s'));
        assert!(!app.is_dirty());
        assert_eq!(app.status_message(), "Saved 2 projects");
        let config = reload(&tmp);
        assert_eq!(config.projects.len(), 2);
        assert_eq!(config.projects[1].id, "Shop");
        assert!(config.projects[1].environments.is_empty());
    }

    #[test]
    fn test_create_project_empty_id_keeps_form() {
        let (mut app, _tmp) = test_app();
        app.handle_key(KeyCode::Tab);
        app.handle_key(KeyCode::Char('n'));
        type_text(&mut app, "   ");
        app.handle_key(KeyCode::Enter);

        assert_eq!(app.input_mode(), InputMode::Creating);
        assert!(app.status_message().starts_with("Error:"));
        assert_eq!(app.projects().len(), 1);

        app.handle_key(KeyCode::Esc);
        assert_eq!(app.input_mode(), InputMode::Normal);
        assert_eq!(app.status_message(), "Cancelled");
    }

    #[test]
    fn test_create_duplicate_project() {
        let (mut app, _tmp) = test_app();
        app.handle_key(KeyCode::Tab);
        app.handle_key(KeyCode::Char('n'));
        type_text(&mut app, "Example Site");
        app.handle_key(KeyCode::Enter);

        assert!(app.status_message().contains("already exists"));
        assert_eq!(app.projects().len(), 1);
        assert!(!app.is_dirty());
    }

    #[test]
    fn test_edit_project_settings() {
        let (mut app, _tmp) = test_app();
        app.handle_key(KeyCode::Tab);
        app.handle_key(KeyCode::Char('e'));
        assert_eq!(app.input_fields()[0].1, "Example Site");

        // 聚焦在 Login URL
        type_text(&mut app, "/signin");
        app.handle_key(KeyCode::Tab);
        type_text(&mut app, "next");
        app.handle_key(KeyCode::Enter);

        let project = &app.projects()[0];
        assert_eq!(project.id, "Example Site");
        assert_eq!(project.login_path(), "/signin");
        assert_eq!(project.destination_param(), "next");
        assert_eq!(app.status_message(), "Project 'Example Site' updated");
    }

    fn clear_field(app: &mut App) {
        for _ in 0..64 {
            app.handle_key(KeyCode::Backspace);
        }
    }

    #[test]
    fn test_edit_renames_project() {
        let (mut app, tmp) = test_app();
        app.handle_key(KeyCode::Tab);
        app.handle_key(KeyCode::Char('e'));
        app.handle_key(KeyCode::BackTab);
        clear_field(&mut app);
        type_text(&mut app, "Renamed");
        app.handle_key(KeyCode::Enter);

        assert_eq!(app.input_mode(), InputMode::Normal);
        assert_eq!(app.status_message(), "Project 'Renamed' updated");
        assert_eq!(app.projects()[0].id, "Renamed");
        assert_eq!(app.projects()[0].environments.len(), 3);
        assert_eq!(app.current_project(), Some("Renamed"));
        assert_eq!(app.content_items()[0], "* Renamed (3 envs)".to_string());

        app.handle_key(KeyCode::Char('s'));
        let config = reload(&tmp);
        assert_eq!(config.projects[0].id, "Renamed");
        assert_eq!(config.selected_project_id, "Renamed");
    }

    #[test]
    fn test_edit_rename_to_existing_id_keeps_form() {
        let (mut app, _tmp) = test_app();
        app.handle_key(KeyCode::Tab);
        app.handle_key(KeyCode::Char('n'));
        type_text(&mut app, "Shop");
        app.handle_key(KeyCode::Enter);

        app.handle_key(KeyCode::Char('e'));
        app.handle_key(KeyCode::BackTab);
        clear_field(&mut app);
        type_text(&mut app, "Shop");
        app.handle_key(KeyCode::Tab);
        type_text(&mut app, "/admin");
        app.handle_key(KeyCode::Enter);

        assert_eq!(app.input_mode(), InputMode::Creating);
        assert!(app.status_message().contains("already exists"));
        // 失败时不做部分修改
        assert_eq!(app.projects()[0].id, "Example Site");
        assert_eq!(app.projects()[0].login_url, None);
    }

    #[test]
    fn test_edit_renames_environment() {
        let (mut app, _tmp) = test_app();
        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Tab);
        app.handle_key(KeyCode::Char('e'));
        app.handle_key(KeyCode::BackTab);
        clear_field(&mut app);
        type_text(&mut app, "qa");
        app.handle_key(KeyCode::Enter);

        assert_eq!(app.status_message(), "Environment 'qa' updated");
        let envs = &app.projects()[0].environments;
        assert_eq!(envs[0], Environment::new("qa", "https://dev.example.com/"));
        assert!(app.projects()[0].find_environment("dev").is_none());
        assert_eq!(app.content_items()[0], "qa → https://dev.example.com/".to_string());
    }

    #[test]
    fn test_edit_environment_invalid_url_keeps_name() {
        let (mut app, _tmp) = test_app();
        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Tab);
        app.handle_key(KeyCode::Char('e'));
        clear_field(&mut app);
        type_text(&mut app, "not a url");
        app.handle_key(KeyCode::BackTab);
        clear_field(&mut app);
        type_text(&mut app, "qa");
        app.handle_key(KeyCode::Enter);

        assert_eq!(app.input_mode(), InputMode::Creating);
        assert!(app.status_message().starts_with("Error:"));
        assert_eq!(app.projects()[0].environments[0].name, "dev");
    }

    #[test]
    fn test_delete_project_and_save_corrects_selection() {
        let (mut app, tmp) = test_app();
        app.handle_key(KeyCode::Tab);
        app.handle_key(KeyCode::Char('n'));
        type_text(&mut app, "Shop");
        app.handle_key(KeyCode::Enter);
        app.handle_key(KeyCode::Char('s'));
        assert_eq!(reload(&tmp).selected_project_id, "Example Site");

        app.handle_key(KeyCode::Char('d'));
        assert_eq!(app.input_mode(), InputMode::Deleting);
        app.handle_key(KeyCode::Char('y'));
        assert_eq!(app.input_mode(), InputMode::Normal);
        assert_eq!(app.projects().len(), 1);
        assert_eq!(app.current_project(), Some("Shop"));

        app.handle_key(KeyCode::Char('s'));
        let config = reload(&tmp);
        assert_eq!(config.projects.len(), 1);
        assert_eq!(config.selected_project_id, "Shop");
    }

    #[test]
    fn test_delete_cancel() {
        let (mut app, _tmp) = test_app();
        app.handle_key(KeyCode::Tab);
        app.handle_key(KeyCode::Char('d'));
        app.handle_key(KeyCode::Char('n'));
        assert_eq!(app.input_mode(), InputMode::Normal);
        assert_eq!(app.projects().len(), 1);
        assert!(!app.is_dirty());
    }

    #[test]
    fn test_environments_panel() {
        let (mut app, _tmp) = test_app();
        app.handle_key(KeyCode::Down);
        assert_eq!(
            app.content_items()[0],
            "dev → https://dev.example.com/".to_string()
        );
        assert_eq!(app.content_items().len(), 3);

        app.handle_key(KeyCode::Tab);
        app.handle_key(KeyCode::Char('n'));
        type_text(&mut app, "qa");
        app.handle_key(KeyCode::Tab);
        type_text(&mut app, "https://qa.example.com/");
        app.handle_key(KeyCode::Enter);

        assert_eq!(app.content_items().len(), 4);
        assert_eq!(
            app.projects()[0].find_environment("qa"),
            Some(&Environment::new("qa", "https://qa.example.com/"))
        );
    }

    #[test]
    fn test_environment_invalid_url() {
        let (mut app, _tmp) = test_app();
        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Tab);
        app.handle_key(KeyCode::Char('n'));
        type_text(&mut app, "qa");
        app.handle_key(KeyCode::Tab);
        type_text(&mut app, "not a url");
        app.handle_key(KeyCode::Enter);

        assert_eq!(app.input_mode(), InputMode::Creating);
        assert!(app.status_message().starts_with("Error:"));
        assert_eq!(app.projects()[0].environments.len(), 3);
    }

    #[test]
    fn test_edit_and_delete_environment() {
        let (mut app, _tmp) = test_app();
        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Tab);

        app.handle_key(KeyCode::Char('e'));
        // 清空 URL 字段后重新输入
        for _ in 0.."https://dev.example.com/".len() {
            app.handle_key(KeyCode::Backspace);
        }
        type_text(&mut app, "http://localhost:8080/");
        app.handle_key(KeyCode::Enter);
        assert_eq!(
            app.projects()[0].find_environment("dev").map(|e| e.url.as_str()),
            Some("http://localhost:8080/")
        );

        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Char('d'));
        app.handle_key(KeyCode::Char('y'));
        assert!(app.projects()[0].find_environment("staging").is_none());
        assert_eq!(app.content_items().len(), 2);
    }

    #[test]
    fn test_environment_requires_project() {
        let (mut app, _tmp) = test_app();
        app.handle_key(KeyCode::Tab);
        app.handle_key(KeyCode::Char('d'));
        app.handle_key(KeyCode::Char('y'));
        assert!(app.projects().is_empty());

        app.handle_key(KeyCode::Tab);
        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Tab);
        app.handle_key(KeyCode::Char('n'));
        assert_eq!(app.input_mode(), InputMode::Normal);
        assert!(app.status_message().contains("no project selected"));
    }

    #[test]
    fn test_cycle_project() {
        let (mut app, _tmp) = test_app();
        app.handle_key(KeyCode::Tab);
        app.handle_key(KeyCode::Char('n'));
        type_text(&mut app, "Shop");
        app.handle_key(KeyCode::Enter);

        app.handle_key(KeyCode::Char('p'));
        assert_eq!(app.current_project(), Some("Shop"));
        assert_eq!(app.content_items()[1], "* Shop (0 envs)".to_string());
        app.handle_key(KeyCode::Char('p'));
        assert_eq!(app.current_project(), Some("Example Site"));
    }

    #[test]
    fn test_preview_rewrites_on_project_url() {
        let (mut app, _tmp) = test_app();
        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Down);
        assert!(app.content_items().is_empty());

        app.handle_key(KeyCode::Tab);
        app.handle_key(KeyCode::Char('n'));
        type_text(&mut app, "https://dev.example.com/node/1?x=1");
        app.handle_key(KeyCode::Enter);

        let items = app.content_items();
        assert_eq!(items.len(), 4);
        assert_eq!(items[0], "on project: https://dev.example.com/node/1?x=1");
        assert_eq!(items[2], "staging → https://staging.example.com/node/1?x=1");
        // 预览不算修改
        assert!(!app.is_dirty());
    }

    #[test]
    fn test_preview_off_project_uses_base_url() {
        let (mut app, _tmp) = test_app();
        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Tab);
        app.handle_key(KeyCode::Char('n'));
        type_text(&mut app, "https://elsewhere.org/a");
        app.handle_key(KeyCode::Enter);

        let items = app.content_items();
        assert!(items[0].starts_with("not on project:"));
        assert_eq!(items[3], "prod → https://www.example.com/");
    }
}
