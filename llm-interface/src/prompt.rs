use marketsnipe_core::{IdeaPost, ProductContext};
use regex::Regex;
use std::sync::OnceLock;

/// Instruction template for the Gemini keyword route.
pub fn scraper_instruction_prompt(context: &ProductContext) -> String {
    format!(
        r#"You write one single instruction for a Reddit scraping agent. Use the startup context below.

Hard requirements:
- Output exactly one sentence, 35-70 words.
- Must start with: Return exactly 10 items. Output each as {{post_link}}.
- Must contain the phrase: Only include posts where the author describes a problem with ...
- Must list at least 3 concrete pain cues and 3 relevant brands/workflows from the context (or obvious adjacent ones if missing).
- Do NOT include the words "search" or "reddit". No markdown, no JSON, no quotes around the line.
- If context is thin, infer common pain points and brands for the space.

Template to follow (adapt the pain cues and brands):
Return exactly 10 items. Output each as {{post_link}}. Only include posts where the author describes a problem with <brands/workflows> such as <cue1>, <cue2>, <cue3>, especially when <cue4> while doing <workflow/goal>.

Startup context to adapt:
{}
"#,
        context.context_line()
    )
}

/// Instruction template for the OpenRouter prompt mode.
pub fn openrouter_instruction_prompt(context: &ProductContext) -> String {
    format!(
        r#"Create a Reddit scraper instruction based on this product:
{}

Generate ONE sentence following this structure:
Return exactly 10 items. Output each as {{post_link}}. Only include posts where the author describes a problem with [BRANDS/TOOLS] such as [PAIN_POINT_1], [PAIN_POINT_2], [PAIN_POINT_3], especially [FRUSTRATION] while [USER_GOAL].

Example: Return exactly 10 items. Output each as {{post_link}}. Only include posts where the author describes a problem with Stripe/PayPal/Square such as frozen payouts, surprise reserves, or delayed settlements, especially when dealing with high-risk transactions while running an online store.

Output only the sentence, no explanation."#,
        context.context_line()
    )
}

pub fn ideas_system_prompt() -> &'static str {
    r#"You are a startup idea generator. Analyze the following Reddit posts describing user frustrations.
Generate 3 viable, specific product ideas that solve these problems.
Return valid JSON only. Format:
{
  "ideas": [
    {
      "title": "Product Name",
      "description": "One sentence description of what it does.",
      "why_it_works": "Why this solves the specific frustration found in the posts."
    }
  ]
}
Do not output markdown code blocks, just the raw JSON string."#
}

pub fn ideas_user_prompt(posts: &[IdeaPost]) -> String {
    let posts_text = posts
        .iter()
        .enumerate()
        .map(|(i, post)| format!("Post {}:\n{}\n---", i + 1, post.content()))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Here are the posts:\n{}", posts_text)
}

fn code_fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```[a-z]*\n?|\n?```").expect("valid regex"))
}

/// Removes markdown code fences the models wrap their answers in.
pub fn strip_code_fences(text: &str) -> String {
    code_fence_re().replace_all(text, "").trim().to_string()
}

pub fn snippet(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
