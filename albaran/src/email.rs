//! Email service for password reset codes and guest invitations.

use lettre::{
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::path::Path;

use crate::{
    config::{Config, EmailTransportConfig},
    errors::Error,
};

pub struct EmailService {
    transport: EmailTransport,
    from_email: String,
    from_name: String,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

impl EmailService {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let email_config = &config.email;

        let transport = match &email_config.transport {
            EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let smtp_builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(*port)
                .credentials(Credentials::new(username.clone(), password.clone()));

                EmailTransport::Smtp(smtp_builder.build())
            }
            EmailTransportConfig::File { path } => {
                let emails_dir = Path::new(path);
                if !emails_dir.exists() {
                    std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                        operation: format!("create emails directory: {e}"),
                    })?;
                }
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(emails_dir))
            }
        };

        Ok(Self {
            transport,
            from_email: email_config.from_email.clone(),
            from_name: email_config.from_name.clone(),
        })
    }

    /// Send the 6-digit code used by `PATCH /user/reset-password`.
    pub async fn send_reset_code(&self, to_email: &str, code: &str) -> Result<(), Error> {
        let body = self.create_reset_code_body(code);
        self.send_email(to_email, "Your password reset code", &body).await
    }

    /// Invite a guest into `company_name`, handing over the code that validates the account.
    pub async fn send_invitation(&self, to_email: &str, company_name: &str, code: &str) -> Result<(), Error> {
        let body = self.create_invitation_body(company_name, code);
        self.send_email(to_email, "You have been invited", &body).await
    }

    async fn send_email(&self, to_email: &str, subject: &str, body: &str) -> Result<(), Error> {
        let from = format!("{} <{}>", self.from_name, self.from_email)
            .parse::<Mailbox>()
            .map_err(|e| Error::Internal {
                operation: format!("parse from email: {e}"),
            })?;

        let to = to_email.parse::<Mailbox>().map_err(|e| Error::BadRequest {
            message: format!("Invalid email address: {e}"),
        })?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body.to_string())
            .map_err(|e| Error::Internal {
                operation: format!("build email message: {e}"),
            })?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send SMTP email: {e}"),
                })?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send file email: {e}"),
                })?;
            }
        }

        tracing::debug!(subject, "email sent");
        Ok(())
    }

    fn create_reset_code_body(&self, code: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Password reset</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <h2>Password reset</h2>
    <p>Your password reset code is: <strong>{code}</strong></p>
    <p>If you didn't request a reset, you can safely ignore this email.</p>
</body>
</html>"#
        )
    }

    fn create_invitation_body(&self, company_name: &str, code: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Invitation</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <h2>You have been invited to {company_name}</h2>
    <p>Your access code is: <strong>{code}</strong></p>
    <p>Register with this email address and confirm it with the code, then use the "forgot password" flow to choose a password before logging in.</p>
</body>
</html>"#,
            company_name = escape_html(company_name)
        )
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_config;

    #[tokio::test]
    async fn test_email_service_creation() {
        let dir = tempfile::tempdir().unwrap();
        let config = create_test_config(dir.path());
        assert!(EmailService::new(&config).is_ok());
    }

    #[tokio::test]
    async fn test_reset_code_body() {
        let dir = tempfile::tempdir().unwrap();
        let service = EmailService::new(&create_test_config(dir.path())).unwrap();

        let body = service.create_reset_code_body("042917");
        assert!(body.contains("<strong>042917</strong>"));
    }

    #[tokio::test]
    async fn test_invitation_escapes_company_name() {
        let dir = tempfile::tempdir().unwrap();
        let service = EmailService::new(&create_test_config(dir.path())).unwrap();

        let body = service.create_invitation_body("<b>Acme & \"Co\"</b>", "123456");
        assert!(body.contains("invited to &lt;b&gt;Acme &amp; &quot;Co&quot;&lt;/b&gt;</h2>"));
        assert!(!body.contains("<b>Acme"));
        assert!(body.contains("<strong>123456</strong>"));
    }

    #[tokio::test]
    async fn test_invitation_is_written_by_file_transport() {
        let dir = tempfile::tempdir().unwrap();
        let config = create_test_config(dir.path());
        let service = EmailService::new(&config).unwrap();

        service.send_invitation("guest@example.com", "Acme SL", "123456").await.unwrap();

        let EmailTransportConfig::File { path } = &config.email.transport else {
            panic!("test config uses the file transport");
        };
        let written = std::fs::read_dir(path).unwrap().count();
        assert_eq!(written, 1);
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let service = EmailService::new(&create_test_config(dir.path())).unwrap();

        let err = service.send_reset_code("not an address", "123456").await.unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
    }
}
