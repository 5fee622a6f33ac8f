pub mod connection;
pub mod message;
pub mod outbox;
pub mod signals;

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::config::{
    AppSettings, ConfigError, MAIL_DEBUG, MAIL_DEFAULT_SENDER, MAIL_MAX_EMAILS, MAIL_PASSWORD,
    MAIL_PORT, MAIL_SERVER, MAIL_SUPPRESS, MAIL_USERNAME, MAIL_USE_SSL, MAIL_USE_TLS,
};
use crate::error::{MailError, Result};

pub use connection::Connection;
pub use message::{Message, MessageFields};
pub use outbox::{Outbox, Recorder};
pub use signals::{DispatchBus, SubscriptionId};

/// Mailer settings. `None` means "not configured" and is filled by
/// [`Mailer::init_app`]; an explicit `Some(false)` or `Some(0)` is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub server: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub port: Option<u16>,
    pub use_tls: Option<bool>,
    pub use_ssl: Option<bool>,
    pub default_sender: Option<String>,
    pub debug: Option<bool>,
    pub max_emails: Option<usize>,
    pub suppress: Option<bool>,
}

#[derive(Clone, Default)]
enum BusBinding {
    #[default]
    Global,
    Injected(Arc<DispatchBus>),
    Disabled,
}

/// Entry point for sending mail.
#[derive(Clone, Default)]
pub struct Mailer {
    config: MailConfig,
    bus: BusBinding,
}

impl Mailer {
    pub fn new(config: MailConfig) -> Self {
        Self {
            config,
            bus: BusBinding::Global,
        }
    }

    /// Dispatch through a private bus instead of the process-wide one.
    pub fn with_bus(mut self, bus: Arc<DispatchBus>) -> Self {
        self.bus = BusBinding::Injected(bus);
        self
    }

    /// Never publish dispatched messages; recording becomes unavailable.
    pub fn without_bus(mut self) -> Self {
        self.bus = BusBinding::Disabled;
        self
    }

    /// Fill every unset attribute from the host settings.
    ///
    /// Attributes that already hold a value are never overwritten, so calling
    /// this again with other settings leaves populated fields untouched.
    /// `debug` and `suppress` fall back to the host's debug and testing flags.
    /// On error the mailer is left unchanged.
    pub fn init_app(&mut self, settings: &AppSettings) -> std::result::Result<(), ConfigError> {
        let mut merged = self.config.clone();

        if merged.server.as_deref().map_or(true, str::is_empty) {
            merged.server = settings.get_string(MAIL_SERVER);
        }
        if merged.server.is_none() {
            return Err(ConfigError::MissingServer);
        }

        fill(&mut merged.username, || Ok(settings.get_string(MAIL_USERNAME)))?;
        fill(&mut merged.password, || Ok(settings.get_string(MAIL_PASSWORD)))?;
        fill(&mut merged.port, || settings.get_u16(MAIL_PORT))?;
        fill(&mut merged.use_tls, || settings.get_bool(MAIL_USE_TLS))?;
        fill(&mut merged.use_ssl, || settings.get_bool(MAIL_USE_SSL))?;
        fill(&mut merged.default_sender, || {
            Ok(settings.get_string(MAIL_DEFAULT_SENDER))
        })?;
        fill(&mut merged.max_emails, || settings.get_usize(MAIL_MAX_EMAILS))?;
        fill(&mut merged.suppress, || {
            Ok(Some(settings.get_bool(MAIL_SUPPRESS)?.unwrap_or(settings.testing)))
        })?;
        fill(&mut merged.debug, || {
            Ok(Some(settings.get_bool(MAIL_DEBUG)?.unwrap_or(settings.debug)))
        })?;

        self.config = merged;
        tracing::info!(
            server = self.server().unwrap_or_default(),
            use_tls = self.use_tls(),
            use_ssl = self.use_ssl(),
            suppress = self.suppress(),
            "Mailer initialised"
        );
        Ok(())
    }

    /// Open a connection bound to these settings.
    pub fn connect(&self) -> Result<Connection<'_>> {
        Connection::open(self)
    }

    /// Send one message over a fresh connection, closed on every exit path.
    pub async fn send(&self, message: &Message) -> Result<()> {
        let mut connection = self.connect()?;
        let result = connection.send(message).await;
        connection.close();

        if let Err(e) = &result {
            tracing::warn!(error = %e, subject = message.subject(), "Mail send failed");
        }
        result
    }

    /// Shortcut for `send(&Message::new(fields)?)`.
    pub async fn send_message(&self, fields: MessageFields) -> Result<()> {
        self.send(&Message::new(fields)?).await
    }

    /// Capture dispatched messages for as long as the returned guard lives.
    ///
    /// The capture is bus-wide: with the default global bus, messages sent by
    /// any mailer in the process land in the outbox, not only this one's.
    /// Concurrent recorders on one bus see each other's traffic; tests that
    /// run in parallel should each inject their own bus.
    pub fn record_messages(&self) -> Result<Recorder> {
        let bus = self.bus().ok_or(MailError::FeatureUnavailable)?;
        Ok(Recorder::start(bus))
    }

    pub(crate) fn bus(&self) -> Option<Arc<DispatchBus>> {
        match &self.bus {
            BusBinding::Global => signals::global(),
            BusBinding::Injected(bus) => Some(Arc::clone(bus)),
            BusBinding::Disabled => None,
        }
    }

    pub fn config(&self) -> &MailConfig {
        &self.config
    }

    pub fn server(&self) -> Option<&str> {
        self.config.server.as_deref().filter(|s| !s.is_empty())
    }

    pub fn username(&self) -> Option<&str> {
        self.config.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.config.password.as_deref()
    }

    /// Explicit port; `None` lets the transport pick 465, 587 or 25.
    pub fn port(&self) -> Option<u16> {
        self.config.port
    }

    pub fn use_tls(&self) -> bool {
        self.config.use_tls.unwrap_or(false)
    }

    pub fn use_ssl(&self) -> bool {
        self.config.use_ssl.unwrap_or(false)
    }

    pub fn default_sender(&self) -> Option<&str> {
        self.config.default_sender.as_deref()
    }

    pub fn debug(&self) -> bool {
        self.config.debug.unwrap_or(false)
    }

    pub fn max_emails(&self) -> Option<usize> {
        self.config.max_emails
    }

    pub fn suppress(&self) -> bool {
        self.config.suppress.unwrap_or(false)
    }
}

impl fmt::Debug for Mailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailer")
            .field("server", &self.config.server)
            .field("username", &self.config.username)
            .field("password", &self.config.password.as_ref().map(|_| "***"))
            .field("port", &self.config.port)
            .field("use_tls", &self.config.use_tls)
            .field("use_ssl", &self.config.use_ssl)
            .field("default_sender", &self.config.default_sender)
            .field("debug", &self.config.debug)
            .field("max_emails", &self.config.max_emails)
            .field("suppress", &self.config.suppress)
            .finish()
    }
}

fn fill<T>(
    slot: &mut Option<T>,
    load: impl FnOnce() -> std::result::Result<Option<T>, ConfigError>,
) -> std::result::Result<(), ConfigError> {
    if slot.is_none() {
        *slot = load()?;
    }
    Ok(())
}
