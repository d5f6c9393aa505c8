// Transactional email via the Resend HTTP API
// Templates are compiled once at construction; send failures are logged and
// surfaced, callers decide whether the operation fails with them.

use handlebars::Handlebars;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmailError {
    #[error("Template error: {0}")]
    Template(String),

    #[error("Email request failed: {0}")]
    Request(String),

    #[error("Email rejected: {status} {body}")]
    Rejected { status: u16, body: String },
}

const OTP_TEMPLATE: &str = r#"
<div style="font-family: sans-serif; max-width: 480px;">
  <h2>Your verification code</h2>
  <p>Hello {{name}},</p>
  <p>Use the following code to continue. It expires shortly.</p>
  <p style="font-size: 28px; letter-spacing: 6px; font-weight: bold;">{{otp}}</p>
  <p>If you did not request this, you can ignore this email.</p>
</div>
"#;

const ENQUIRY_RECEIVED_TEMPLATE: &str = r#"
<div style="font-family: sans-serif; max-width: 480px;">
  <h2>We received your enquiry</h2>
  <p>Hello {{name}},</p>
  <p>Thank you for contacting us. Our team will get back to you soon.</p>
  <blockquote>{{message}}</blockquote>
</div>
"#;

const ENQUIRY_ALERT_TEMPLATE: &str = r#"
<div style="font-family: sans-serif; max-width: 480px;">
  <h2>New enquiry #{{enquiry_id}}</h2>
  <p>From: {{name}} &lt;{{email}}&gt;</p>
  <blockquote>{{message}}</blockquote>
</div>
"#;

const ENQUIRY_RESOLVED_TEMPLATE: &str = r#"
<div style="font-family: sans-serif; max-width: 480px;">
  <h2>Your enquiry has been resolved</h2>
  <p>Hello {{name}},</p>
  <p>Your enquiry has been marked as resolved. If anything is still unclear,
  just reply or open a new enquiry.</p>
  <blockquote>{{message}}</blockquote>
</div>
"#;

pub struct EmailSender {
    http: reqwest::Client,
    api_key: String,
    api_url: String,
    from: String,
    admin_email: String,
    templates: Handlebars<'static>,
}

impl EmailSender {
    pub fn new(
        api_key: String,
        api_url: String,
        from_email: &str,
        from_name: &str,
        admin_email: String,
    ) -> Result<Self, EmailError> {
        let mut templates = Handlebars::new();
        for (name, source) in [
            ("otp", OTP_TEMPLATE),
            ("enquiry_received", ENQUIRY_RECEIVED_TEMPLATE),
            ("enquiry_alert", ENQUIRY_ALERT_TEMPLATE),
            ("enquiry_resolved", ENQUIRY_RESOLVED_TEMPLATE),
        ] {
            templates
                .register_template_string(name, source)
                .map_err(|e| EmailError::Template(e.to_string()))?;
        }

        Ok(Self {
            http: reqwest::Client::new(),
            api_key,
            api_url,
            from: format!("{} <{}>", from_name, from_email),
            admin_email,
            templates,
        })
    }

    /// Create an email sender from centralized app configuration
    pub fn from_env() -> Result<Self, EmailError> {
        let settings = &crate::app_config::config().email;
        Self::new(
            settings.api_key.clone(),
            settings.api_url.clone(),
            &settings.from_email,
            &settings.from_name,
            settings.admin_email.clone(),
        )
    }

    async fn send(&self, to: &str, subject: &str, html: String) -> Result<(), EmailError> {
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": [to],
                "subject": subject,
                "html": html,
            }))
            .send()
            .await
            .map_err(|e| EmailError::Request(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(EmailError::Rejected { status, body })
        }
    }

    fn render(&self, template: &str, data: &serde_json::Value) -> Result<String, EmailError> {
        self.templates
            .render(template, data)
            .map_err(|e| EmailError::Template(e.to_string()))
    }

    pub async fn send_otp(&self, to: &str, name: &str, otp: &str) -> Result<(), EmailError> {
        let html = self.render("otp", &json!({ "name": name, "otp": otp }))?;
        self.send(to, "Your verification code", html).await
    }

    pub async fn send_enquiry_received(
        &self,
        to: &str,
        name: &str,
        message: &str,
    ) -> Result<(), EmailError> {
        let html = self.render(
            "enquiry_received",
            &json!({ "name": name, "message": message }),
        )?;
        self.send(to, "We received your enquiry", html).await
    }

    /// Notify the operations inbox about a new enquiry
    pub async fn send_enquiry_alert(
        &self,
        enquiry_id: i32,
        name: &str,
        email: &str,
        message: &str,
    ) -> Result<(), EmailError> {
        let html = self.render(
            "enquiry_alert",
            &json!({
                "enquiry_id": enquiry_id,
                "name": name,
                "email": email,
                "message": message,
            }),
        )?;
        self.send(
            &self.admin_email.clone(),
            &format!("New enquiry #{}", enquiry_id),
            html,
        )
        .await
    }

    pub async fn send_enquiry_resolved(
        &self,
        to: &str,
        name: &str,
        message: &str,
    ) -> Result<(), EmailError> {
        let html = self.render(
            "enquiry_resolved",
            &json!({ "name": name, "message": message }),
        )?;
        self.send(to, "Your enquiry has been resolved", html).await
    }
}
