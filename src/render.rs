//! Server-side HTML rendering.
//!
//! The page is rendered from a [`WorkspaceSnapshot`]. `static/chat.js`
//! swaps the `#workspace` fragment whenever the controller reports a
//! structural change and patches streaming text in place between swaps.

use std::sync::LazyLock;

use regex::Regex;

use crate::auth::UserProfile;
use crate::config::AuthConfig;
use crate::controller::{SessionView, WorkspaceSnapshot};
use crate::persona::Persona;
use crate::session::{ChatMessage, MessageRole};
use crate::usage::UsageSnapshot;

static STRONG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("STRONG is a valid static regex pattern"));
static EM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*(.*?)\*").expect("EM is a valid static regex pattern"));
static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[-*]\s+(.+)$").expect("BULLET is a valid static regex pattern"));
static NUMBERED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(\d+)\.\s+(.+)$").expect("NUMBERED is a valid static regex pattern")
});

/// Escape text for inclusion in HTML content or attribute values.
#[must_use]
pub fn escape_html(text: &str) -> String {
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

/// Light markdown for message bubbles.
///
/// Bold, italics and list items become tags, blank lines split paragraphs,
/// and single newlines become `<br>`. Input is escaped first, so message
/// text can never inject markup.
#[must_use]
pub fn format_message(content: &str) -> String {
    let escaped = escape_html(content);
    let html = STRONG.replace_all(&escaped, "<strong>$1</strong>");
    let html = EM.replace_all(&html, "<em>$1</em>");
    let html = BULLET.replace_all(&html, "<li>$1</li>");
    let html = NUMBERED.replace_all(&html, "<li>$2</li>");
    html.replace("\n\n", "</p><p>").replace('\n', "<br>")
}

fn plural(n: u32) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// Generate the HTML shell for the application.
#[must_use]
pub fn html_shell(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="description" content="Career guidance from specialised mentor agents">
    <title>{title}</title>
    <link rel="stylesheet" href="/static/app.css">
    <script defer src="/static/chat.js"></script>
</head>
<body>
{content}
</body>
</html>"#,
        title = escape_html(title),
    )
}

/// Full page for a freshly created workspace.
#[must_use]
pub fn render_page(
    snapshot: &WorkspaceSnapshot,
    profile: Option<&UserProfile>,
    auth: &AuthConfig,
) -> String {
    let body = format!(
        r#"<div id="workspace" class="workspace" data-workspace-id="{id}">{inner}</div>"#,
        id = escape_html(&snapshot.workspace_id),
        inner = render_workspace(snapshot, profile, auth),
    );
    html_shell("Career Mentor", &body)
}

/// Inner HTML of `#workspace`.
#[must_use]
pub fn render_workspace(
    snapshot: &WorkspaceSnapshot,
    profile: Option<&UserProfile>,
    auth: &AuthConfig,
) -> String {
    let active = snapshot
        .active_session_id
        .as_deref()
        .and_then(|id| snapshot.sessions.iter().find(|s| s.id == id));
    let usage = &snapshot.usage;

    let mut html = String::new();
    if usage.show_banner {
        html.push_str(&render_banner(usage, auth));
    }
    html.push_str(r#"<div class="layout">"#);
    html.push_str(&render_sidebar(snapshot, active));
    html.push_str(r#"<main class="chat">"#);
    html.push_str(&render_top_bar(active, snapshot.signed_in, usage, profile, auth));
    html.push_str(&render_messages(active, snapshot.is_loading));
    html.push_str(&render_input(snapshot.is_loading, usage));
    html.push_str("</main></div>");
    if usage.show_popup {
        html.push_str(&render_popup(usage, auth));
    }
    html
}

fn render_banner(usage: &UsageSnapshot, auth: &AuthConfig) -> String {
    let (headline, tagline) = if usage.exhausted {
        (
            "Unlock Unlimited Access".to_string(),
            "Sign up to continue your career journey with unlimited access",
        )
    } else {
        (
            format!(
                "Only {} free interaction{} left!",
                usage.remaining,
                plural(usage.remaining)
            ),
            "Sign up now to unlock unlimited conversations with all agents",
        )
    };
    let dismiss = if usage.banner_dismissible {
        r#"<button class="banner-dismiss" data-action="dismiss-banner" aria-label="Dismiss">&times;</button>"#
    } else {
        ""
    };

    format!(
        r#"<div class="auth-banner" role="alert">
  <div class="banner-text"><h3>{headline}</h3><p>{tagline}</p></div>
  <div class="banner-actions">
    <a class="btn btn-light" href="{sign_up}">Sign Up Free</a>
    <a class="btn btn-outline" href="{sign_in}">Sign In</a>
    {dismiss}
  </div>
</div>"#,
        sign_up = escape_html(&auth.sign_up_url),
        sign_in = escape_html(&auth.sign_in_url),
    )
}

fn render_sidebar(snapshot: &WorkspaceSnapshot, active: Option<&SessionView>) -> String {
    let current = active.map(|s| s.persona);

    let mut html = String::from(
        r#"<aside class="sidebar"><div class="sidebar-header"><h1>Career Mentor</h1></div>
<section class="agents"><h3>Choose Your Agent</h3>"#,
    );
    for persona in Persona::ALL {
        let selected = current == Some(persona);
        html.push_str(&format!(
            r#"<button class="agent {color}{selected}" data-action="select-persona" data-persona="{tag}"><span class="agent-name">{name}</span><span class="agent-description">{description}</span></button>"#,
            color = persona.color(),
            selected = if selected { " selected" } else { "" },
            tag = persona.tag(),
            name = persona.name(),
            description = persona.description(),
        ));
    }
    html.push_str("</section>");

    if snapshot.sessions.len() > 1 {
        html.push_str(r#"<section class="sessions"><h3>Chat Sessions</h3><ul>"#);
        for session in &snapshot.sessions {
            html.push_str(&format!(
                r#"<li class="session{active}" data-action="activate-session" data-session-id="{id}"><span class="dot {color}"></span><span class="session-name">{name}</span><button class="session-delete" data-action="delete-session" data-session-id="{id}" aria-label="Delete session">&times;</button></li>"#,
                active = if session.is_active { " active" } else { "" },
                id = escape_html(&session.id),
                color = session.persona.color(),
                name = session.persona_name,
            ));
        }
        html.push_str("</ul></section>");
    }

    html.push_str("</aside>");
    html
}

fn render_top_bar(
    active: Option<&SessionView>,
    signed_in: bool,
    usage: &UsageSnapshot,
    profile: Option<&UserProfile>,
    auth: &AuthConfig,
) -> String {
    let title = active.map_or_else(String::new, |s| {
        format!(
            r#"<div class="title"><span class="badge {color}"></span><div><h2>{name}</h2><p>Career Mentor Agent</p></div></div>"#,
            color = s.persona.color(),
            name = s.persona_name,
        )
    });

    let counter = if signed_in {
        String::new()
    } else if usage.remaining > 0 {
        format!(
            r#"<span class="counter">{} free interaction{} left</span>"#,
            usage.remaining,
            plural(usage.remaining)
        )
    } else {
        r#"<span class="counter exhausted">Sign up to continue</span>"#.to_string()
    };

    let account = match profile {
        Some(p) => format!(
            r#"<span class="profile" title="{email}">{name}</span>"#,
            email = escape_html(p.email.as_deref().unwrap_or_default()),
            name = escape_html(p.display_name()),
        ),
        None => format!(
            r#"<a class="btn btn-small" href="{}">Sign In</a>"#,
            escape_html(&auth.sign_in_url)
        ),
    };

    format!(r#"<header class="top-bar">{title}<div class="top-right">{counter}{account}</div></header>"#)
}

fn render_message(session_id: &str, index: usize, message: &ChatMessage, fallback: Persona) -> String {
    let (role, color) = match message.role {
        MessageRole::User => ("user", "blue"),
        MessageRole::Assistant => ("assistant", message.persona.unwrap_or(fallback).color()),
    };
    let indicator = if message.is_streaming {
        r#"<span class="streaming">...</span>"#
    } else {
        ""
    };

    format!(
        r#"<div class="message {role}" data-message="{session_id}:{index}"><div class="avatar {color}"></div><div class="body"><div class="bubble"><span class="content">{content}</span>{indicator}</div><time datetime="{iso}">{time}</time></div></div>"#,
        session_id = escape_html(session_id),
        content = format_message(&message.content),
        iso = message.timestamp.to_rfc3339(),
        time = message.timestamp.format("%H:%M:%S"),
    )
}

fn render_messages(active: Option<&SessionView>, is_loading: bool) -> String {
    let mut html = String::from(r#"<div class="messages" id="messages">"#);
    if let Some(session) = active {
        for (index, message) in session.messages.iter().enumerate() {
            html.push_str(&render_message(&session.id, index, message, session.persona));
        }
        let streaming = session.messages.last().is_some_and(|m| m.is_streaming);
        if is_loading && !streaming {
            html.push_str(&format!(
                r#"<div class="message assistant loading"><div class="avatar {}"></div><div class="bubble"><span class="dots"><i></i><i></i><i></i></span></div></div>"#,
                session.persona.color()
            ));
        }
    }
    html.push_str("</div>");
    html
}

fn render_input(is_loading: bool, usage: &UsageSnapshot) -> String {
    let placeholder = if usage.input_enabled {
        "Message Career Mentor Agent..."
    } else {
        "Sign up to continue chatting..."
    };
    let disabled = if is_loading || !usage.input_enabled {
        " disabled"
    } else {
        ""
    };

    format!(
        r#"<form class="composer" data-action="send">
  <textarea name="message" rows="1" placeholder="{placeholder}"{disabled}></textarea>
  <button type="submit"{disabled} aria-label="Send">Send</button>
</form>
<p class="disclaimer">Career Mentor Agent can make mistakes. Consider checking important information.</p>"#
    )
}

fn render_popup(usage: &UsageSnapshot, auth: &AuthConfig) -> String {
    let remaining = usage.remaining;
    let lead = if remaining > 0 {
        format!(
            "You have {remaining} more free interaction{} before signing up.",
            plural(remaining)
        )
    } else {
        "Sign up to continue your career journey!".to_string()
    };
    let continue_link = if remaining > 0 {
        format!(
            r#"<button class="link" data-action="dismiss-popup">Continue with {remaining} free interaction{}</button>"#,
            plural(remaining)
        )
    } else {
        String::new()
    };

    format!(
        r#"<div class="popup-backdrop"><div class="popup" role="dialog" aria-modal="true">
  <button class="popup-close" data-action="dismiss-popup" aria-label="Close">&times;</button>
  <h2>Unlock Full Access</h2>
  <p>{lead}</p>
  <ul class="benefits">
    <li>Unlimited conversations with all agents</li>
    <li>Save and review your career insights</li>
    <li>Personalized recommendations</li>
    <li>Track your career progress</li>
  </ul>
  <a class="btn btn-primary" href="{sign_up}">Sign Up - Its Free</a>
  <a class="btn btn-outline" href="{sign_in}">Sign In</a>
  {continue_link}
</div></div>"#,
        sign_up = escape_html(&auth.sign_up_url),
        sign_in = escape_html(&auth.sign_in_url),
    )
}
