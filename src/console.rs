//! Line-oriented front-end hosting the session and the feed.
//!
//! One [`Console`] plays the role of a page: it mounts both stores under a
//! single scope and renders their state as text.

use std::fmt::Write as _;
use std::str::FromStr;
use std::sync::Arc;

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::feed::{FeedSettings, Idea, IdeaFeedStore, IdeaInput};
use crate::navigation::{Navigator, RecordingNavigator};
use crate::scope::{Scope, ScopeGuard};
use crate::session::SessionManager;

pub const HELP: &str = "\
commands:
  register <email> <password>   create an account and log in
  login <email> <password>      log in
  logout                        log out
  whoami                        show the signed-in user
  list                          show the feed
  refresh                       reload the feed
  add <title> | <description>   post an idea
  remove <id>                   delete one of your ideas
  help                          this text
  quit                          leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Register { email: String, password: String },
    Login { email: String, password: String },
    Logout,
    Whoami,
    List,
    Refresh,
    Add { title: String, description: String },
    Remove { id: String },
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        let credentials = |verb: &str| -> std::result::Result<(String, String), String> {
            let mut parts = rest.split_whitespace();
            match (parts.next(), parts.next(), parts.next()) {
                (Some(email), Some(password), None) => {
                    Ok((email.to_string(), password.to_string()))
                }
                _ => Err(format!("usage: {verb} <email> <password>")),
            }
        };

        match verb {
            "register" => {
                let (email, password) = credentials(verb)?;
                Ok(Self::Register { email, password })
            }
            "login" => {
                let (email, password) = credentials(verb)?;
                Ok(Self::Login { email, password })
            }
            "logout" => Ok(Self::Logout),
            "whoami" => Ok(Self::Whoami),
            "list" | "ls" => Ok(Self::List),
            "refresh" => Ok(Self::Refresh),
            "add" => {
                let (title, description) = rest.split_once('|').unwrap_or((rest, ""));
                if title.trim().is_empty() {
                    return Err("usage: add <title> | <description>".to_string());
                }
                Ok(Self::Add {
                    title: title.trim().to_string(),
                    description: description.trim().to_string(),
                })
            }
            "remove" | "rm" => match rest.split_whitespace().next() {
                Some(id) => Ok(Self::Remove { id: id.to_string() }),
                None => Err("usage: remove <id>".to_string()),
            },
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            "" => Err("empty command".to_string()),
            other => Err(format!("unknown command: {other} (try `help`)")),
        }
    }
}

/// A session manager and a feed store mounted under one scope.
///
/// Dropping the console closes the scope; requests still in flight resolve
/// without touching either store.
#[derive(Debug)]
pub struct Console {
    session: SessionManager,
    feed: IdeaFeedStore,
    navigator: Arc<RecordingNavigator>,
    _guard: ScopeGuard,
}

impl Console {
    /// Mount both stores. Starts the session probe and the first feed load.
    pub fn mount(backend: Arc<dyn Backend>, settings: FeedSettings) -> Self {
        let scope = Scope::new();
        let navigator = Arc::new(RecordingNavigator::new());
        let session = SessionManager::mount(
            Arc::clone(&backend),
            Arc::clone(&navigator) as Arc<dyn Navigator>,
            scope.child(),
        );
        let feed = IdeaFeedStore::mount(backend, settings, scope.child());
        Self {
            session,
            feed,
            navigator,
            _guard: scope.guard(),
        }
    }

    #[must_use]
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    #[must_use]
    pub fn feed(&self) -> &IdeaFeedStore {
        &self.feed
    }

    /// Navigation requests made since the last call.
    pub fn take_navigation(&self) -> Vec<String> {
        self.navigator.take()
    }

    /// Run one command and render its outcome.
    pub async fn execute(&self, command: ConsoleCommand) -> Result<String> {
        match command {
            ConsoleCommand::Register { email, password } => {
                let user = self.session.register(&email, &password).await?;
                Ok(format!("registered and logged in as {} ({})", user.email, user.id))
            }
            ConsoleCommand::Login { email, password } => {
                let user = self.session.login(&email, &password).await?;
                Ok(format!("logged in as {} ({})", user.email, user.id))
            }
            ConsoleCommand::Logout => {
                self.session.logout().await?;
                Ok("logged out".to_string())
            }
            ConsoleCommand::Whoami => {
                let state = self.session.wait_until_ready().await;
                Ok(match state.current {
                    Some(user) => format!("{} ({})", user.email, user.id),
                    None => "not logged in".to_string(),
                })
            }
            ConsoleCommand::List => Ok(render_feed(&self.feed.items())),
            ConsoleCommand::Refresh => {
                let items = self.feed.fetch().await?;
                Ok(render_feed(&items))
            }
            ConsoleCommand::Add { title, description } => {
                let user = self
                    .session
                    .current()
                    .ok_or_else(|| Error::auth("log in to post ideas"))?;
                let idea = self
                    .feed
                    .add(IdeaInput::new(title, description, user.id))
                    .await?;
                Ok(format!("added {}", idea.id))
            }
            ConsoleCommand::Remove { id } => {
                self.feed.remove(&id).await?;
                Ok(format!("removed {id}"))
            }
            ConsoleCommand::Help | ConsoleCommand::Quit => Ok(HELP.to_string()),
        }
    }
}

/// Numbered listing of the feed, newest first.
#[must_use]
pub fn render_feed(items: &[Idea]) -> String {
    if items.is_empty() {
        return "no ideas yet".to_string();
    }
    let mut out = String::new();
    for (i, idea) in items.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>2}. {} [{}] {}",
            i + 1,
            idea.title,
            idea.id,
            idea.created_at.format("%Y-%m-%d %H:%M")
        );
        if !idea.description.is_empty() {
            let _ = writeln!(out, "    {}", idea.description);
        }
    }
    out.trim_end().to_string()
}
