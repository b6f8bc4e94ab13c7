//! services/mail_transport.rs
//! Entrega de correos: Resend (HTTP), SMTP (lettre) o sólo log para desarrollo.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{
        header::{ContentDisposition, ContentType},
        Body, Mailbox, MultiPart, SinglePart,
    },
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::app_config::{MailConfig, MailProvider};
use crate::models::email_model::OutgoingEmail;

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Entrega el correo y devuelve el id que le asignó el proveedor.
    async fn send(&self, email: &OutgoingEmail) -> Result<String>;

    fn name(&self) -> &'static str;
}

/// Construye el transporte configurado en `MAIL_PROVIDER`.
pub fn build_transport(config: &MailConfig) -> Result<Arc<dyn MailTransport>> {
    let transport: Arc<dyn MailTransport> = match config.provider {
        MailProvider::Resend => Arc::new(ResendTransport::new(config)?),
        MailProvider::Smtp => Arc::new(SmtpTransport::new(config)?),
        MailProvider::Log => Arc::new(LogTransport),
    };
    log::info!("Transporte de correo: {}", transport.name());
    Ok(transport)
}

fn sender(config: &MailConfig) -> String {
    format!("{} <{}>", config.from_name, config.from_address)
}

// ----------------------------------------------------------------
// Resend
// ----------------------------------------------------------------

#[derive(Clone)]
pub struct ResendTransport {
    http_client: Client,
    api_key: String,
    base_url: String,
    from: String,
}

#[derive(Deserialize)]
struct ResendSendResponse {
    id: String,
}

impl ResendTransport {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let api_key = config
            .resend_api_key
            .clone()
            .ok_or_else(|| anyhow!("RESEND_API_KEY es obligatorio con MAIL_PROVIDER=resend"))?;
        let http_client = Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .context("No se pudo construir el cliente HTTP")?;
        Ok(Self {
            http_client,
            api_key,
            base_url: config.resend_base_url.trim_end_matches('/').to_string(),
            from: sender(config),
        })
    }
}

#[async_trait]
impl MailTransport for ResendTransport {
    async fn send(&self, email: &OutgoingEmail) -> Result<String> {
        let attachments: Vec<_> = email
            .attachments
            .iter()
            .map(|a| {
                json!({
                    "filename": a.filename,
                    "content": base64::encode(&a.data),
                    "content_type": a.content_type,
                })
            })
            .collect();

        let payload = json!({
            "from": self.from,
            "to": [email.to],
            "subject": email.subject,
            "html": email.html_body,
            "attachments": attachments,
        });

        let response = self
            .http_client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("Error de red enviando a Resend")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Resend respondió {}: {}", status, body));
        }

        let parsed: ResendSendResponse = response
            .json()
            .await
            .context("Respuesta de Resend sin id")?;
        Ok(parsed.id)
    }

    fn name(&self) -> &'static str {
        "resend"
    }
}

// ----------------------------------------------------------------
// SMTP
// ----------------------------------------------------------------

#[derive(Clone)]
pub struct SmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    domain: String,
}

impl SmtpTransport {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let host = config
            .smtp_host
            .clone()
            .ok_or_else(|| anyhow!("SMTP_HOST es obligatorio con MAIL_PROVIDER=smtp"))?;

        let tls_params = TlsParameters::new(host.clone())?;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&host)?
            .port(config.smtp_port)
            .tls(Tls::Required(tls_params))
            .timeout(Some(SEND_TIMEOUT));
        if let (Some(user), Some(pass)) = (&config.smtp_user, &config.smtp_pass) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let from: Mailbox = sender(config).parse().context("Invalid from address")?;
        let domain = config
            .from_address
            .rsplit('@')
            .next()
            .unwrap_or("localhost")
            .to_string();

        Ok(Self {
            mailer: builder.build(),
            from,
            domain,
        })
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn send(&self, email: &OutgoingEmail) -> Result<String> {
        let html_part = SinglePart::builder()
            .header(ContentType::parse("text/html; charset=utf-8")?)
            .body(email.html_body.clone());

        let mut multipart = MultiPart::mixed().singlepart(html_part);
        for attach in &email.attachments {
            let part = SinglePart::builder()
                .header(ContentType::parse(attach.content_type.as_str())?)
                .header(ContentDisposition::attachment(&attach.filename))
                .body(Body::new(attach.data.clone()));
            multipart = multipart.singlepart(part);
        }

        let to: Mailbox = email.to.parse().context("Invalid recipient address")?;
        let message_id = format!("<{}@{}>", uuid::Uuid::new_v4(), self.domain);
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&email.subject)
            .message_id(Some(message_id.clone()))
            .multipart(multipart)?;

        tokio::time::timeout(SEND_TIMEOUT, self.mailer.send(message))
            .await
            .context("Timeout enviando por SMTP")??;
        Ok(message_id)
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

// ----------------------------------------------------------------
// Log (desarrollo)
// ----------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn send(&self, email: &OutgoingEmail) -> Result<String> {
        let id = format!("log-{}", uuid::Uuid::new_v4());
        log::info!(
            "(LogTransport) correo {} a {} | asunto: {} | adjuntos: {}",
            id,
            email.to,
            email.subject,
            email.attachments.len()
        );
        Ok(id)
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resend_config(base_url: String) -> MailConfig {
        MailConfig {
            provider: MailProvider::Resend,
            resend_api_key: Some("re_test".to_string()),
            resend_base_url: base_url,
            ..MailConfig::default()
        }
    }

    fn email() -> OutgoingEmail {
        OutgoingEmail {
            to: "cliente@example.com".to_string(),
            subject: "Seguimiento".to_string(),
            html_body: "<p>Hola</p>".to_string(),
            attachments: vec![],
        }
    }

    #[actix_rt::test]
    async fn resend_returns_provider_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("authorization", "Bearer re_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "msg_123"})))
            .expect(1)
            .mount(&server)
            .await;

        let transport = ResendTransport::new(&resend_config(server.uri())).unwrap();
        let id = transport.send(&email()).await.unwrap();
        assert_eq!(id, "msg_123");
    }

    #[actix_rt::test]
    async fn resend_error_status_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .respond_with(ResponseTemplate::new(422).set_body_string("invalid to"))
            .mount(&server)
            .await;

        let transport = ResendTransport::new(&resend_config(server.uri())).unwrap();
        let err = transport.send(&email()).await.unwrap_err();
        assert!(err.to_string().contains("422"));
    }

    #[test]
    fn resend_requires_api_key() {
        let cfg = MailConfig {
            provider: MailProvider::Resend,
            ..MailConfig::default()
        };
        assert!(build_transport(&cfg).is_err());
    }
}
