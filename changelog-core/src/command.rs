//! Command registry behind the shared global dispatcher.
//!
//! Several widgets may live on one page. Each installs a handler here; a command
//! is routed to the most recently installed handler that accepts it, optionally
//! narrowed to one board by public key. Commands nobody claims are reported as
//! [`Dispatch::PassThrough`] so the platform adapter can hand them to whatever
//! dispatcher was installed before this module.

/// Commands understood by changelog widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangelogCommand {
    Open,
    Close,
    GetUnreadCount,
    MarkRead,
}

impl ChangelogCommand {
    pub const ALL: [ChangelogCommand; 4] = [
        ChangelogCommand::Open,
        ChangelogCommand::Close,
        ChangelogCommand::GetUnreadCount,
        ChangelogCommand::MarkRead,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|command| command.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Open => "open_changelog",
            Self::Close => "close_changelog",
            Self::GetUnreadCount => "get_unread_changelog_count",
            Self::MarkRead => "mark_changelog_read",
        }
    }
}

/// A command received on the shared entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Changelog {
        command: ChangelogCommand,
        target: Option<String>,
    },
    Other(String),
}

impl Command {
    pub fn parse(name: &str, target: Option<&str>) -> Self {
        match ChangelogCommand::parse(name) {
            Some(command) => Self::Changelog {
                command,
                target: target
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .map(str::to_string),
            },
            None => Self::Other(name.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandReply {
    Done,
    UnreadCount(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Handled(CommandReply),
    PassThrough,
}

/// Receiver of changelog commands. Returns `None` when it can no longer act,
/// e.g. after its widget was destroyed.
pub trait CommandHandler {
    fn handle(&self, command: ChangelogCommand) -> Option<CommandReply>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct Registration {
    id: HandlerId,
    public_key: String,
    handler: Box<dyn CommandHandler>,
}

#[derive(Default)]
pub struct CommandRegistry {
    handlers: Vec<Registration>,
    next_id: u64,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(
        &mut self,
        public_key: impl Into<String>,
        handler: impl CommandHandler + 'static,
    ) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        let public_key = public_key.into();
        log::debug!("command handler {id:?} installed for {public_key}");
        self.handlers.push(Registration {
            id,
            public_key,
            handler: Box::new(handler),
        });
        id
    }

    pub fn uninstall(&mut self, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|registration| registration.id != id);
        before != self.handlers.len()
    }

    pub fn teardown(&mut self) {
        self.handlers.clear();
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn dispatch(&self, command: &Command) -> Dispatch {
        let Command::Changelog { command, target } = command else {
            return Dispatch::PassThrough;
        };

        self.handlers
            .iter()
            .rev()
            .filter(|registration| {
                target
                    .as_deref()
                    .map_or(true, |key| registration.public_key == key)
            })
            .find_map(|registration| registration.handler.handle(*command))
            .map_or(Dispatch::PassThrough, Dispatch::Handled)
    }
}
