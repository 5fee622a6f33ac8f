use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

use super::message::{Message, MessageFields};
use super::Mailer;
use crate::config::ConfigError;
use crate::error::{MailError, Result};

type Transport = AsyncSmtpTransport<Tokio1Executor>;

/// A transport session bound to one mailer's settings.
///
/// When the mailer is suppressed no transport is created and sends only fire
/// the dispatched notification. Nothing touches the network until the first
/// message goes out.
pub struct Connection<'a> {
    mailer: &'a Mailer,
    transport: Option<Transport>,
    num_emails: usize,
}

impl<'a> Connection<'a> {
    pub fn open(mailer: &'a Mailer) -> Result<Self> {
        let transport = if mailer.suppress() {
            None
        } else {
            Some(configure_transport(mailer)?)
        };

        tracing::debug!(
            server = mailer.server().unwrap_or_default(),
            suppressed = transport.is_none(),
            "Mail connection opened"
        );

        Ok(Self {
            mailer,
            transport,
            num_emails: 0,
        })
    }

    pub fn is_suppressed(&self) -> bool {
        self.transport.is_none()
    }

    pub async fn send(&mut self, message: &Message) -> Result<()> {
        let recipients = message.send_to().len();
        if recipients == 0 {
            return Err(MailError::NoRecipients);
        }

        let default_sender = self.default_sender()?;
        let wire = message.to_wire(default_sender.as_ref())?;

        if let Some(transport) = &self.transport {
            if self.mailer.debug() {
                tracing::debug!(
                    server = self.mailer.server().unwrap_or_default(),
                    recipients,
                    subject = message.subject(),
                    "Transmitting message"
                );
            }
            let response = transport.send(wire).await?;
            if self.mailer.debug() {
                tracing::debug!(code = %response.code(), "Server accepted message");
            }
        }

        if let Some(bus) = self.mailer.bus() {
            bus.emit(message, self.mailer);
        }

        self.num_emails += 1;
        if Some(self.num_emails) == self.mailer.max_emails() {
            self.num_emails = 0;
            if self.transport.is_some() {
                tracing::debug!("max_emails reached, reopening transport");
                self.transport = Some(configure_transport(self.mailer)?);
            }
        }

        Ok(())
    }

    pub async fn send_message(&mut self, fields: MessageFields) -> Result<()> {
        self.send(&Message::new(fields)?).await
    }

    /// Release the session. The transport is unpooled and ends every SMTP
    /// session with QUIT right after its message, so closing only drops the
    /// transport and is equivalent to dropping the connection.
    pub fn close(self) {
        tracing::debug!(
            sent = self.num_emails,
            suppressed = self.transport.is_none(),
            "Mail connection closed"
        );
    }

    fn default_sender(&self) -> Result<Option<Mailbox>> {
        self.mailer
            .default_sender()
            .map(|address| {
                address
                    .parse()
                    .map_err(|_| MailError::InvalidAddress(address.to_string()))
            })
            .transpose()
    }
}

fn configure_transport(mailer: &Mailer) -> Result<Transport> {
    let server = mailer.server().ok_or(ConfigError::MissingServer)?;

    let mut builder = if mailer.use_ssl() {
        Transport::relay(server)?
    } else if mailer.use_tls() {
        Transport::starttls_relay(server)?
    } else {
        Transport::builder_dangerous(server)
    };

    if let Some(port) = mailer.port() {
        builder = builder.port(port);
    }

    if let (Some(username), Some(password)) = (mailer.username(), mailer.password()) {
        builder = builder.credentials(Credentials::new(
            username.to_string(),
            password.to_string(),
        ));
    }

    Ok(builder.build())
}
