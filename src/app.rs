use crate::api::types::User;
use crate::api::Services;
use crate::commands::{self, Action};
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::query::Query;
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, ConfirmModal, KeyResult};
use crate::ui::feedback::{Toast, ToastLevel};
use crate::ui::renderfns::extract_domain;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{RepoListView, SecretListView, SecretScope, UserListView};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::collections::VecDeque;
use std::io::stdout;
use tracing::{debug, info};

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  views: Vec<Box<dyn View>>,

  command_input: CommandInput,

  /// Pending confirmations, front one is on screen
  confirms: VecDeque<ConfirmModal>,

  toast: Option<Toast>,

  viewer: Query<User>,

  config: Config,

  /// Header title: configured, or the server host
  title: String,

  services: Services,

  should_quit: bool,
}

impl App {
  pub fn new(config: Config, services: Services) -> Self {
    let title = config
      .title
      .clone()
      .unwrap_or_else(|| extract_domain(&config.server.url).to_string());

    let viewer_services = services.clone();
    let viewer = Query::start(move || {
      let services = viewer_services.clone();
      async move { services.viewer().await.map_err(|e| e.message()) }
    });

    let root = RepoListView::new(services.clone(), config.default_namespace.clone());

    Self {
      views: vec![Box::new(root)],
      command_input: CommandInput::new(),
      confirms: VecDeque::new(),
      toast: None,
      viewer,
      config,
      title,
      services,
      should_quit: false,
    }
  }

  pub async fn run(&mut self, mut events: EventHandler) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = self.event_loop(&mut terminal, &mut events).await;

    // Restore the terminal even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    result
  }

  async fn event_loop<B: Backend>(
    &mut self,
    terminal: &mut Terminal<B>,
    events: &mut EventHandler,
  ) -> Result<()> {
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }
    Ok(())
  }

  pub fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => self.tick(),
      Event::Toast(toast) => self.toast = Some(toast),
      Event::Confirm(request) => self.confirms.push_back(ConfirmModal::new(request)),
    }
  }

  fn tick(&mut self) {
    if let Some(view) = self.views.last_mut() {
      view.tick();
    }
    if self.viewer.poll() {
      if let Some(error) = self.viewer.error() {
        debug!(error, "viewer lookup failed");
      }
    }
    if self.toast.as_ref().is_some_and(Toast::is_expired) {
      self.toast = None;
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    // A pending confirmation blocks everything else
    if let Some(modal) = self.confirms.pop_front() {
      if let Err(modal) = modal.handle_key(key) {
        self.confirms.push_front(modal);
      }
      return;
    }

    let typing = self.views.last().is_some_and(|v| v.captures_input());
    if !typing || self.command_input.is_active() {
      match self.command_input.handle_key(key) {
        KeyResult::Event(CommandEvent::Submitted(line)) => {
          self.run_command(&line);
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
        KeyResult::NotHandled => {}
      }
    }

    let Some(view) = self.views.last_mut() else {
      return;
    };
    match view.handle_key(key) {
      ViewAction::None => {}
      ViewAction::Push(next) => self.views.push(next),
      ViewAction::Pop => self.pop_view(),
    }
  }

  fn pop_view(&mut self) {
    if self.views.len() > 1 {
      self.views.pop();
      if let Some(view) = self.views.last_mut() {
        view.resume();
      }
    } else {
      self.should_quit = true;
    }
  }

  fn notify_error(&mut self, message: impl Into<String>) {
    self.toast = Some(Toast::new(ToastLevel::Error, message));
  }

  fn run_command(&mut self, line: &str) {
    let Some(action) = commands::parse(line) else {
      self.notify_error(format!("Unknown command: {}", line));
      return;
    };
    info!(?action, "command");

    match action {
      Action::Repos => {
        let root = RepoListView::new(self.services.clone(), self.config.default_namespace.clone());
        self.views = vec![Box::new(root)];
      }
      Action::Users => {
        self.views.truncate(1);
        self.views.push(Box::new(UserListView::new(self.services.clone())));
      }
      Action::OrgSecrets(namespace) => {
        let Some(namespace) = namespace.or_else(|| self.config.default_namespace.clone()) else {
          self.notify_error("Usage: orgsecrets <namespace>");
          return;
        };
        let view = SecretListView::new(self.services.clone(), SecretScope::Org { namespace });
        self.views.push(Box::new(view));
      }
      Action::Sync => {
        // Sync may change what the server knows about the viewer too
        self.viewer.refetch();
        let services = self.services.clone();
        tokio::spawn(async move {
          let _ = services.sync_account().await;
        });
      }
      Action::Quit => self.should_quit = true,
    }
  }

  // Accessors for ui::draw

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn viewer(&self) -> Option<&User> {
    self.viewer.data()
  }

  pub fn toast(&self) -> Option<&Toast> {
    self.toast.as_ref()
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self.views.iter().map(|v| v.breadcrumb_label()).collect()
  }

  pub fn shortcuts(&self) -> Vec<ShortcutInfo> {
    self
      .views
      .last()
      .map(|v| v.shortcuts())
      .unwrap_or_default()
  }

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.views.last_mut()
  }

  pub fn command_input(&self) -> &CommandInput {
    &self.command_input
  }

  pub fn confirm_modal(&self) -> Option<&ConfirmModal> {
    self.confirms.front()
  }
}
