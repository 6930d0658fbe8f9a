//! Server-rendered HTML pages. Every user-supplied string goes through `html_escape`.

use std::fmt::Write as _;

use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};

use crate::chat::Sender;
use crate::chat_service::ChatSnapshot;
use crate::explain::Explanation;
use crate::history::Review;
use crate::sentiment::Sentiment;

const TITLE: &str = "Product Review Sentiment Analyzer";

fn layout(page_title: &str, active: &str, body: &str) -> String {
    let nav = [("/", "Analyzer"), ("/chatbot", "Support chat"), ("/lime-analysis", "Explain")]
        .iter()
        .map(|(href, label)| {
            let class = if *href == active { " class=\"active\"" } else { "" };
            format!("<a href=\"{href}\"{class}>{label}</a>")
        })
        .collect::<Vec<_>>()
        .join("\n        ");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{page_title} · {TITLE}</title>
    <link rel="stylesheet" href="/static/style.css">
</head>
<body>
    <nav>
        {nav}
    </nav>
    <main>
{body}
    </main>
</body>
</html>
"#
    )
}

fn sentiment_class(s: Sentiment) -> &'static str {
    match s {
        Sentiment::Negative => "negative",
        Sentiment::Neutral => "neutral",
        Sentiment::Positive => "positive",
    }
}

fn text_form(action: &str, placeholder: &str, button: &str, value: &str, hidden: &str) -> String {
    format!(
        r#"<form method="post" action="{action}">
    {hidden}<textarea name="text" rows="4" placeholder="{placeholder}" required>{value}</textarea>
    <button type="submit">{button}</button>
</form>"#,
        value = text(value),
    )
}

/// Home page: review form, latest prediction (if any) and the recent-review log.
pub fn home(reviews: &[Review], latest: Option<&Review>) -> String {
    let mut body = String::new();
    body.push_str("<h1>Product Review Sentiment Analyzer</h1>\n");
    body.push_str(&text_form(
        "/predict",
        "Paste a product review…",
        "Analyze",
        "",
        "",
    ));

    if let Some(r) = latest {
        let _ = write!(
            body,
            r#"
<section class="prediction {cls}">
    <h2>Prediction</h2>
    <p class="review-text">{txt}</p>
    <p><strong>{label}</strong> · confidence {conf}</p>
</section>"#,
            cls = sentiment_class(r.sentiment),
            txt = text(&r.text),
            label = r.sentiment,
            conf = r.confidence_pct(),
        );
    }

    body.push_str("\n<section class=\"recent\">\n    <h2>Recent reviews</h2>\n");
    if reviews.is_empty() {
        body.push_str("    <p class=\"empty\">No reviews analyzed yet.</p>\n");
    } else {
        body.push_str("    <ol>\n");
        for r in reviews {
            let _ = writeln!(
                body,
                r#"        <li class="{cls}"><span class="review-text">{txt}</span> <span class="badge">{label} ({conf})</span></li>"#,
                cls = sentiment_class(r.sentiment),
                txt = text(&r.text),
                label = r.sentiment,
                conf = r.confidence_pct(),
            );
        }
        body.push_str("    </ol>\n");
    }
    body.push_str("</section>");

    layout("Analyzer", "/", &body)
}

/// Chat page: full turn log, escalation banner, and the input form unless escalated.
pub fn chatbot(snapshot: &ChatSnapshot) -> String {
    let mut body = String::new();
    body.push_str("<h1>Support chat</h1>\n");

    if snapshot.state.escalated {
        body.push_str(
            "<div class=\"banner escalated\">This conversation has been handed to a human agent. Type <code>reset</code> to start a new chat.</div>\n",
        );
    }

    body.push_str("<ul class=\"chat-log\">\n");
    for turn in &snapshot.turns {
        let who = match turn.sender {
            Sender::User => "user",
            Sender::Bot => "bot",
        };
        let status = turn
            .status
            .as_deref()
            .map(|s| format!(" <span class=\"status\">{}</span>", text(s)))
            .unwrap_or_default();
        let _ = writeln!(
            body,
            r#"    <li class="turn {who}"><span class="message">{msg}</span>{status}</li>"#,
            msg = text(&turn.message),
        );
    }
    body.push_str("</ul>\n");

    let hidden = format!(
        r#"<input type="hidden" name="session" value="{}">
    "#,
        attr(&snapshot.session)
    );
    let placeholder = if snapshot.state.escalated {
        "Type reset to start over"
    } else {
        "Ask about shipping, returns, warranty…"
    };
    body.push_str(&text_form("/chatbot", placeholder, "Send", "", &hidden));

    layout("Support chat", "/chatbot", &body)
}

/// Explanation page. `result` is `None` on the initial GET.
pub fn lime(input: &str, result: Option<&Explanation>) -> String {
    let mut body = String::new();
    body.push_str("<h1>Why this sentiment?</h1>\n");
    body.push_str(&text_form(
        "/lime-analysis",
        "Text to explain…",
        "Explain",
        input,
        "",
    ));

    if let Some(e) = result {
        let p = &e.prediction;
        let _ = write!(
            body,
            r#"
<section class="prediction {cls}">
    <h2>{label} ({conf:.2}%)</h2>
    <table class="probabilities">
"#,
            cls = sentiment_class(p.sentiment),
            label = p.sentiment,
            conf = p.confidence * 100.0,
        );
        for s in Sentiment::ALL {
            let pct = p.probability_of(s) * 100.0;
            let _ = writeln!(
                body,
                r#"        <tr><th>{s}</th><td><div class="bar {cls}" style="width: {pct:.1}%"></div></td><td>{pct:.2}%</td></tr>"#,
                cls = sentiment_class(s),
            );
        }
        body.push_str("    </table>\n");

        if e.words.is_empty() {
            body.push_str("    <p class=\"empty\">No words to explain.</p>\n");
        } else {
            let _ = writeln!(
                body,
                "    <table class=\"weights\">\n        <tr><th>Word</th><th>Weight toward {}</th></tr>",
                p.sentiment
            );
            for w in &e.words {
                let dir = if w.weight >= 0.0 { "supports" } else { "opposes" };
                let _ = writeln!(
                    body,
                    r#"        <tr class="{dir}"><td>{word}</td><td>{weight:+.4}</td></tr>"#,
                    word = text(&w.word),
                    weight = w.weight,
                );
            }
            body.push_str("    </table>\n");
        }
        body.push_str("</section>");
    }

    layout("Explain", "/lime-analysis", &body)
}

pub fn error_page(status: u16, message: &str) -> String {
    let body = format!(
        "<h1>Something went wrong ({status})</h1>\n<p class=\"error\">{}</p>\n<p><a href=\"/\">Back</a></p>",
        text(message)
    );
    layout("Error", "", &body)
}
