//! HTML pages for the browser-facing installation routes.

use crate::oauth::REQUIRED_SCOPES;

/// Renders the install prompt and the post-installation page.
pub trait PageRenderer: Send + Sync {
    /// Page offering to install the app identified by `client_id`.
    fn install(&self, client_id: &str) -> String;

    /// Page confirming installation into `team_name`.
    fn authorized(&self, team_name: &str) -> String;
}

/// Minimal built-in pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlPages;

impl PageRenderer for HtmlPages {
    fn install(&self, client_id: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head><title>heybot - Install</title></head>
<body>
<h1>Install heybot</h1>
{}
</body>
</html>"#,
            add_to_slack_button(client_id, None)
        )
    }

    fn authorized(&self, team_name: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head><title>heybot - Installed</title></head>
<body>
<h1>heybot was installed to <strong>{}</strong></h1>
<p>You can close this window.</p>
</body>
</html>"#,
            escape_html(team_name)
        )
    }
}

/// Authorization URL the install button points at.
pub fn authorize_url(client_id: &str, scopes: Option<&[&str]>) -> String {
    let scopes = scopes.unwrap_or(REQUIRED_SCOPES).join(",");
    format!(
        "https://slack.com/oauth/authorize?client_id={}&scope={}",
        urlencoding::encode(client_id),
        urlencoding::encode(&scopes),
    )
}

/// Generate the "Add to Slack" button HTML.
pub fn add_to_slack_button(client_id: &str, scopes: Option<&[&str]>) -> String {
    format!(
        r#"<a href="{}">
<img alt="Add to Slack" height="40" width="139" src="https://platform.slack-edge.com/img/add_to_slack.png"
srcSet="https://platform.slack-edge.com/img/add_to_slack.png 1x, https://platform.slack-edge.com/img/add_to_slack@2x.png 2x" />
</a>"#,
        authorize_url(client_id, scopes).replace('&', "&amp;")
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
