use html_escape::encode_text;

/// What the form page shows below the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Transcript(String),
    Error(String),
}

const HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>YouTube Transcript Fetcher</title>
  <style>
    body { font-family: sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; }
    input[type=text] { width: 70%; padding: 0.4rem; }
    .error { color: #b00020; }
    .transcript { white-space: pre-wrap; line-height: 1.5; }
  </style>
</head>
<body>
  <h1>YouTube Transcript Fetcher</h1>
  <form method="post" action="/">
    <input type="text" name="youtube_url" placeholder="https://www.youtube.com/watch?v=..." required>
    <button type="submit">Get Transcript</button>
  </form>
"#;

const TAIL: &str = "</body>\n</html>\n";

/// Render the form page, with the result of a submission when there is one
pub fn render(outcome: Option<&Outcome>) -> String {
    let mut html = String::from(HEAD);

    match outcome {
        Some(Outcome::Error(message)) => {
            html.push_str(&format!("  <p class=\"error\">{}</p>\n", encode_text(message)));
        }
        Some(Outcome::Transcript(text)) => {
            html.push_str("  <h2>Transcript</h2>\n");
            html.push_str(&format!(
                "  <div class=\"transcript\">{}</div>\n",
                encode_text(text)
            ));
        }
        None => {}
    }

    html.push_str(TAIL);
    html
}
