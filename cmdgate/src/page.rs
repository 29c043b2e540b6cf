//! Rendering of the challenge page served on the loopback listener.
//!
//! One rendering function over the challenge state variant. Everything
//! user-controlled (the command, rule descriptions) is HTML-escaped; the
//! expected answer / target word reach the client as JSON-typed literals
//! inside the page script, never as raw markup.

use serde_json::json;

use crate::challenge::{ChallengeData, ChallengeState};

/// Escape `& < > " '` into HTML entities.
#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

const STYLE: &str = "\
body { font-family: -apple-system, 'Segoe UI', Roboto, sans-serif; background: #f4f5f7; \
margin: 0; display: flex; justify-content: center; padding: 48px 16px; color: #1f2430; }\n\
.card { background: #fff; border-radius: 10px; box-shadow: 0 2px 12px rgba(0,0,0,.12); \
max-width: 640px; width: 100%; padding: 28px 32px; }\n\
h1 { font-size: 20px; margin: 0 0 4px; }\n\
h1.warn { color: #b45309; }\n\
h1.block { color: #b91c1c; }\n\
.severity { display: inline-block; font-size: 12px; font-weight: 700; letter-spacing: .06em; \
text-transform: uppercase; border-radius: 4px; padding: 2px 8px; color: #fff; background: #6b7280; }\n\
.severity.high, .severity.critical { background: #b91c1c; }\n\
.severity.medium { background: #b45309; }\n\
pre.command { background: #11151c; color: #e5e7eb; border-radius: 6px; padding: 12px 14px; \
overflow-x: auto; font-size: 14px; }\n\
ul.rules { padding-left: 20px; }\n\
ul.rules li { margin-bottom: 6px; font-size: 14px; }\n\
ul.rules code { background: #eef0f3; border-radius: 3px; padding: 1px 5px; font-size: 12px; }\n\
.prompt { font-size: 15px; margin: 18px 0 8px; }\n\
input#answer { font-size: 16px; padding: 8px 10px; border: 1px solid #cbd2dc; border-radius: 6px; width: 160px; }\n\
.buttons { margin-top: 18px; display: flex; gap: 10px; }\n\
button { font-size: 14px; font-weight: 600; border: 0; border-radius: 6px; padding: 10px 18px; cursor: pointer; }\n\
button.approve { background: #15803d; color: #fff; }\n\
button.submit { background: #1d4ed8; color: #fff; }\n\
button.deny { background: #e5e7eb; color: #1f2430; }\n\
#feedback { color: #b91c1c; font-size: 14px; min-height: 18px; margin-top: 10px; }\n\
p.ok { color: #15803d; font-weight: 600; }\n\
p.bad { color: #b91c1c; font-weight: 600; }\n";

const SCRIPT: &str = "\
let attempts = 3;\n\
function post(path) { return fetch(path, { method: 'POST' }).catch(function () {}); }\n\
function finish(text, cls) {\n\
  document.getElementById('card').innerHTML = '<p class=\"' + cls + '\">' + text + '</p>';\n\
}\n\
function approve() { post('/approve').then(function () { finish('Command approved — you can close this tab.', 'ok'); }); }\n\
function deny() { post('/deny').then(function () { finish('Command denied — you can close this tab.', 'bad'); }); }\n\
function submitAnswer() {\n\
  const input = document.getElementById('answer');\n\
  const value = input.value.trim();\n\
  const correct = STATE.kind === 'math'\n\
    ? parseInt(value, 10) === STATE.answer\n\
    : value === STATE.target;\n\
  if (correct) { approve(); return; }\n\
  attempts -= 1;\n\
  if (attempts <= 0) { deny(); return; }\n\
  document.getElementById('feedback').textContent = 'Wrong answer — ' + attempts + ' attempt(s) left.';\n\
  input.value = '';\n\
  input.focus();\n\
}\n\
const answerInput = document.getElementById('answer');\n\
if (answerInput) {\n\
  answerInput.addEventListener('keydown', function (ev) { if (ev.key === 'Enter') { submitAnswer(); } });\n\
  answerInput.focus();\n\
}\n";

/// Render the full challenge page for one session.
#[must_use]
pub fn render(state: &ChallengeState, data: &ChallengeData) -> String {
    let client_state = match state {
        ChallengeState::Confirm => json!({ "kind": "confirm" }),
        ChallengeState::Math { answer, .. } => json!({ "kind": "math", "answer": answer }),
        ChallengeState::Word { target } => json!({ "kind": "word", "target": target }),
        ChallengeState::Block => json!({ "kind": "block" }),
    };

    let severity = data.highest_severity.to_string();
    let (title, title_class) = match state {
        ChallengeState::Block => ("Command blocked", "block"),
        _ => ("Risky command needs approval", "warn"),
    };

    let mut html = String::with_capacity(8192);
    html.push_str("<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str("<title>cmdgate</title>\n<style>\n");
    html.push_str(STYLE);
    html.push_str("</style>\n</head>\n<body>\n<div class=\"card\" id=\"card\">\n");

    html.push_str(&format!("<h1 class=\"{title_class}\">{title}</h1>\n"));
    html.push_str(&format!(
        "<p><span class=\"severity {severity}\">{severity}</span></p>\n"
    ));
    html.push_str(&format!(
        "<pre class=\"command\">{}</pre>\n",
        escape_html(&data.command)
    ));

    if !data.matches.is_empty() {
        html.push_str("<ul class=\"rules\">\n");
        for record in &data.matches {
            html.push_str(&format!(
                "<li><code>{}</code> <span class=\"severity {}\">{}</span> {}</li>\n",
                escape_html(&record.id),
                record.severity,
                record.severity,
                escape_html(&record.description)
            ));
        }
        html.push_str("</ul>\n");
    }

    match state {
        ChallengeState::Confirm => {
            html.push_str("<p class=\"prompt\">Approve this command?</p>\n");
            html.push_str(
                "<div class=\"buttons\">\
                 <button class=\"approve\" onclick=\"approve()\">Approve</button>\
                 <button class=\"deny\" onclick=\"deny()\">Deny</button></div>\n",
            );
        }
        ChallengeState::Math { a, b, .. } => {
            html.push_str(&format!(
                "<p class=\"prompt\">Solve the challenge: {a} + {b} = ?</p>\n"
            ));
            html.push_str("<input id=\"answer\" autocomplete=\"off\">\n");
            html.push_str(
                "<div class=\"buttons\">\
                 <button class=\"submit\" onclick=\"submitAnswer()\">Submit</button>\
                 <button class=\"deny\" onclick=\"deny()\">Deny</button></div>\n",
            );
        }
        ChallengeState::Word { target } => {
            html.push_str(&format!(
                "<p class=\"prompt\">Type <strong>{}</strong> to approve (case-sensitive):</p>\n",
                escape_html(target)
            ));
            html.push_str("<input id=\"answer\" autocomplete=\"off\">\n");
            html.push_str(
                "<div class=\"buttons\">\
                 <button class=\"submit\" onclick=\"submitAnswer()\">Submit</button>\
                 <button class=\"deny\" onclick=\"deny()\">Deny</button></div>\n",
            );
        }
        ChallengeState::Block => {
            html.push_str(
                "<p class=\"prompt\">This command is blocked by policy and cannot be approved.</p>\n",
            );
            html.push_str(
                "<div class=\"buttons\">\
                 <button class=\"deny\" onclick=\"deny()\">Acknowledge</button></div>\n",
            );
        }
    }

    html.push_str("<div id=\"feedback\"></div>\n");
    html.push_str("<script>\nconst STATE = ");
    html.push_str(&client_state.to_string());
    html.push_str(";\n");
    html.push_str(SCRIPT);
    html.push_str("</script>\n</body>\n</html>\n");
    html
}
