//! Email template rendering.
//!
//! The service depends only on the [`Renderer`] trait. [`TemplateEngine`] is the
//! default Handlebars-backed implementation.

use crate::error::NotificationResult;
use crate::models::{
    BulkOperationEmailData, BulkOperationJob, EntityChangeEmailData, EntityChangeJob,
};
use handlebars::Handlebars;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Rendered email content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    /// Email subject line.
    pub subject: String,
    /// HTML body content.
    pub html: String,
}

/// Maps a typed job to a subject and HTML body.
///
/// Implementations must be deterministic and must not perform I/O.
pub trait Renderer: Send + Sync {
    fn render_entity_change(&self, job: &EntityChangeJob) -> NotificationResult<RenderedEmail>;

    fn render_bulk_operation(&self, job: &BulkOperationJob) -> NotificationResult<RenderedEmail>;
}

const ENTITY_CHANGE_HTML: &str = "entity_change_html";
const BULK_OPERATION_HTML: &str = "bulk_operation_html";

/// Template engine for rendering email templates.
#[derive(Clone)]
pub struct TemplateEngine {
    handlebars: Arc<Handlebars<'static>>,
}

impl TemplateEngine {
    /// Create a new template engine with all templates registered.
    pub fn new() -> NotificationResult<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);

        handlebars.register_template_string(ENTITY_CHANGE_HTML, ENTITY_CHANGE_HTML_TEMPLATE)?;
        handlebars.register_template_string(BULK_OPERATION_HTML, BULK_OPERATION_HTML_TEMPLATE)?;

        Ok(Self {
            handlebars: Arc::new(handlebars),
        })
    }

    fn render<T: Serialize>(&self, template_name: &str, data: &T) -> NotificationResult<String> {
        Ok(self.handlebars.render(template_name, data)?)
    }
}

impl Renderer for TemplateEngine {
    fn render_entity_change(&self, job: &EntityChangeJob) -> NotificationResult<RenderedEmail> {
        debug!(actor = %job.actor_name, entity = %job.entity_name, action = %job.action, "Rendering entity change email");

        let data = EntityChangeEmailData::from(job);
        let html = self.render(ENTITY_CHANGE_HTML, &data)?;

        Ok(RenderedEmail {
            subject: format!("License {}: {}", data.action, data.entity_name),
            html,
        })
    }

    fn render_bulk_operation(&self, job: &BulkOperationJob) -> NotificationResult<RenderedEmail> {
        debug!(actor = %job.actor_name, kind = %job.operation_kind, "Rendering bulk operation email");

        let data = BulkOperationEmailData::from(job);
        let html = self.render(BULK_OPERATION_HTML, &data)?;

        Ok(RenderedEmail {
            subject: format!(
                "{} import summary: {}/{} succeeded",
                data.operation_kind, data.success, data.total
            ),
            html,
        })
    }
}

// ============================================================================
// Email Templates
// ============================================================================

const ENTITY_CHANGE_HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <title>License {{action}}</title>
</head>
<body style="margin: 0; padding: 0; font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background-color: #f4f4f5;">
  <table role="presentation" width="100%" cellspacing="0" cellpadding="0" style="max-width: 600px; margin: 0 auto; padding: 40px 20px;">
    <tr>
      <td style="background-color: #ffffff; border-radius: 8px; padding: 32px;">
        <p style="color: #18181b; font-size: 16px; margin: 0 0 16px 0;">Hello {{actor_name}},</p>
        <p style="color: #52525b; font-size: 15px; line-height: 22px; margin: 0 0 24px 0;">
          The license <strong>{{entity_name}}</strong> was <strong>{{action}}</strong> by your account.
        </p>
        <table width="100%" cellspacing="0" cellpadding="0">
          <tr>
            <td style="background-color: #f4f4f5; border-radius: 6px; padding: 16px;">
              <p style="color: #52525b; font-size: 14px; margin: 0 0 8px 0;"><strong>License:</strong> {{entity_name}}</p>
              <p style="color: #52525b; font-size: 14px; margin: 0 0 8px 0;"><strong>Action:</strong> {{action}}</p>
              <p style="color: #52525b; font-size: 14px; margin: 0;"><strong>Time:</strong> {{timestamp}}</p>
            </td>
          </tr>
        </table>
        <p style="color: #71717a; font-size: 12px; margin: 24px 0 0 0;">
          If you did not make this change, please contact your administrator.
        </p>
      </td>
    </tr>
  </table>
</body>
</html>"#;

const BULK_OPERATION_HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <title>{{operation_kind}} import summary</title>
</head>
<body style="margin: 0; padding: 0; font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background-color: #f4f4f5;">
  <table role="presentation" width="100%" cellspacing="0" cellpadding="0" style="max-width: 600px; margin: 0 auto; padding: 40px 20px;">
    <tr>
      <td style="background-color: #ffffff; border-radius: 8px; padding: 32px;">
        <p style="color: #18181b; font-size: 16px; margin: 0 0 16px 0;">Hello {{actor_name}},</p>
        <p style="color: #52525b; font-size: 15px; line-height: 22px; margin: 0 0 24px 0;">
          Your <strong>{{operation_kind}}</strong> import finished at {{timestamp}}.
        </p>
        <table width="100%" cellspacing="0" cellpadding="8" style="border-collapse: collapse; font-size: 14px; color: #52525b;">
          <tr style="background-color: #f4f4f5;">
            <td><strong>Total</strong></td>
            <td style="text-align: right;">{{total}}</td>
          </tr>
          <tr>
            <td><strong>Succeeded</strong></td>
            <td style="text-align: right; color: #166534;">{{success}}</td>
          </tr>
          <tr style="background-color: #f4f4f5;">
            <td><strong>Failed</strong></td>
            <td style="text-align: right; color: #b91c1c;">{{failed}}</td>
          </tr>
        </table>
        {{#if has_failures}}
        <p style="color: #92400e; font-size: 13px; margin: 24px 0 0 0;">
          Some records could not be imported. Check the import log for details.
        </p>
        {{/if}}
      </td>
    </tr>
  </table>
</body>
</html>"#;
