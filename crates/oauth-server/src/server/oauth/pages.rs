//! HTML pages for the login and consent steps.
//!
//! All interpolated values are HTML-escaped.

use crate::service::{ConsentPrompt, ScopeDescription};

const STYLE: &str = r#"<style>
body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif; background: #f5f5f5; margin: 0; display: flex; justify-content: center; align-items: center; min-height: 100vh; }
.card { background: #fff; border-radius: 8px; box-shadow: 0 2px 8px rgba(0,0,0,0.1); padding: 32px; max-width: 400px; width: 100%; }
h1 { font-size: 20px; margin: 0 0 8px; color: #333; }
.subtitle { color: #666; font-size: 14px; margin: 0 0 24px; }
label { display: block; font-size: 14px; font-weight: 500; margin: 12px 0 6px; color: #333; }
input[type="text"], input[type="password"] { width: 100%; padding: 10px; border: 1px solid #ddd; border-radius: 4px; font-size: 14px; box-sizing: border-box; }
ul { padding-left: 20px; color: #333; font-size: 14px; }
button { width: 100%; padding: 10px; background: #4a90d9; color: #fff; border: none; border-radius: 4px; font-size: 14px; font-weight: 500; cursor: pointer; margin-top: 16px; }
button:hover { background: #357abd; }
</style>"#;

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width,initial-scale=1">
<title>{title}</title>
{STYLE}
</head>
<body>
<div class="card">
{body}
</div>
</body>
</html>"#,
        title = html_escape(title),
    )
}

/// Render the login form for a grant request.
pub fn render_login_page(request_id: &str, error_message: Option<&str>) -> String {
    let error_html = error_message
        .map(|msg| {
            format!(
                r#"<div style="background:#fee;border:1px solid #c00;color:#c00;padding:10px;border-radius:4px;margin-bottom:16px">{}</div>"#,
                html_escape(msg)
            )
        })
        .unwrap_or_default();

    page(
        "Sign in",
        &format!(
            r#"<h1>Sign in</h1>
<p class="subtitle">An application is requesting access to your account</p>
{error_html}
<form method="POST" action="/oauth/login">
<input type="hidden" name="request_id" value="{request_id}">
<label for="login">Login</label>
<input type="text" id="login" name="login" required autofocus>
<label for="password">Password</label>
<input type="password" id="password" name="password" required>
<button type="submit">Sign in</button>
</form>"#,
            request_id = html_escape(request_id),
        ),
    )
}

/// One list item per scope name, each submitting its name with the form.
fn scope_list(description: &ScopeDescription) -> String {
    description
        .descriptions
        .iter()
        .map(|(name, text)| {
            format!(
                "<li>{}<input type=\"hidden\" name=\"scope\" value=\"{}\"></li>\n",
                html_escape(text),
                html_escape(name)
            )
        })
        .collect()
}

/// Render the consent form listing already approved and newly requested scope.
pub fn render_approve_page(prompt: &ConsentPrompt) -> String {
    let existing = if prompt.existing.descriptions.is_empty() {
        String::new()
    } else {
        format!(
            "<p class=\"subtitle\">Already allowed:</p>\n<ul>\n{}</ul>",
            scope_list(&prompt.existing)
        )
    };

    page(
        "Authorize",
        &format!(
            r#"<h1>Authorize {client}</h1>
<p class="subtitle"><strong>{client}</strong> would like to:</p>
<form method="POST" action="/oauth/approve">
<input type="hidden" name="request_id" value="{request_id}">
<ul>
{additional}</ul>
{existing}
<button type="submit">Allow</button>
</form>"#,
            client = html_escape(&prompt.client_name),
            request_id = html_escape(&prompt.request_id),
            additional = scope_list(&prompt.additional),
        ),
    )
}

/// Escape HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
