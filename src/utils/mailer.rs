use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::model::announcement::Announcement;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Mail API error: status={status}, body={body}")]
    Api { status: u16, body: String },
}

#[derive(Serialize)]
struct OutgoingMail<'a> {
    from: &'a str,
    to: &'a [String],
    subject: String,
    html: String,
}

/// Sends notifications through an HTTP mail API (Resend-compatible payload).
/// Without an API key every send is logged and skipped.
#[derive(Clone)]
pub struct Mailer {
    http_client: Client,
    api_url: String,
    api_key: Option<String>,
    from: String,
    app_url: String,
}

impl Mailer {
    pub fn new(config: &Config) -> Result<Self, MailError> {
        let http_client = Client::builder().timeout(Duration::from_secs(15)).build()?;

        Ok(Self {
            http_client,
            api_url: config.mail_api_url.clone(),
            api_key: config.mail_api_key.clone(),
            from: config.mail_from.clone(),
            app_url: config.app_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Mails the announcement to every valid address. Returns how many
    /// recipients the API accepted.
    #[instrument(skip(self, announcement, recipients), fields(announcement_id = %announcement.id))]
    pub async fn notify_announcement<I, S>(
        &self,
        announcement: &Announcement,
        recipients: I,
    ) -> Result<usize, MailError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let to = valid_recipients(recipients);
        if to.is_empty() {
            info!("No recipients for announcement");
            return Ok(0);
        }

        let Some(api_key) = self.api_key.as_deref() else {
            info!(recipients = to.len(), "Mailer disabled, announcement not sent");
            return Ok(0);
        };

        let mail = OutgoingMail {
            from: &self.from,
            to: &to,
            subject: format!("New announcement: {}", announcement.title),
            html: announcement_html(announcement, &self.app_url),
        };

        let response = self
            .http_client
            .post(&self.api_url)
            .header(AUTHORIZATION, format!("Bearer {api_key}"))
            .header(CONTENT_TYPE, "application/json")
            .json(&mail)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Mail API rejected announcement");
            return Err(MailError::Api {
                status: status.as_u16(),
                body,
            });
        }

        info!(recipients = to.len(), "Announcement mailed");
        Ok(to.len())
    }
}

/// Trimmed, de-duplicated addresses that look like `local@domain.tld`.
pub fn valid_recipients<I, S>(addresses: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for address in addresses {
        let address = address.as_ref().trim();
        if is_valid_email(address) && !out.iter().any(|a| a.eq_ignore_ascii_case(address)) {
            out.push(address.to_string());
        }
    }
    out
}

fn is_valid_email(address: &str) -> bool {
    if address.chars().any(char::is_whitespace) {
        return false;
    }
    match address.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn announcement_html(announcement: &Announcement, app_url: &str) -> String {
    let message = escape_html(&announcement.message).replace('\n', "<br/>");
    format!(
        r#"<div style="font-family:sans-serif">
  <h2>{title}</h2>
  <p>{message}</p>
  <p style="color:#64748b;font-size:12px">Priority: <b>{priority}</b> · Published: {published}</p>
  <p><a href="{app_url}/announcements">Open announcements</a></p>
</div>"#,
        title = escape_html(&announcement.title),
        priority = announcement.priority,
        published = announcement.published_at.format("%d/%m/%Y %H:%M UTC"),
        app_url = escape_html(app_url),
    )
}
