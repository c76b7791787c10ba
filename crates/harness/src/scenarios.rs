//! Built-in flows for the bundled sample applications
//!
//! Every flow uses the template values the runner binds: `base_url`,
//! `api_url`, `username`, `password`, `content` and `emojis`.

use serde_json::json;

use crate::content::{self, ContentKind};
use crate::credentials::CredentialMode;
use crate::error::{HarnessError, HarnessResult};
use crate::flow::{Condition, Flow, Stage};
use crate::scripts;

const SEEDED_EMAIL: &str = "test@example.com";

/// Names of the built-in flows, in listing order
pub fn names() -> &'static [&'static str] {
    &[
        "login-dashboard",
        "laravel-tour",
        "sns-tour",
        "sns-qa-rich",
        "sns-qa-only",
        "sns-trashy-all",
        "sns2-tour",
    ]
}

/// Look up a built-in flow by name
pub fn builtin(name: &str) -> HarnessResult<Flow> {
    match name {
        "login-dashboard" => login_dashboard(),
        "laravel-tour" => laravel_tour(),
        "sns-tour" => sns_tour(),
        "sns-qa-rich" => sns_qa_rich(),
        "sns-qa-only" => sns_qa_only(),
        "sns-trashy-all" => sns_trashy_all(),
        "sns2-tour" => sns2_tour(),
        other => Err(HarnessError::InvalidFlow {
            flow: other.to_string(),
            reason: format!("no built-in flow named '{}' (known: {})", other, names().join(", ")),
        }),
    }
}

/// Every built-in flow
pub fn all() -> HarnessResult<Vec<Flow>> {
    names().iter().map(|name| builtin(name)).collect()
}

fn seeded(password: &str) -> CredentialMode {
    CredentialMode::Fixed {
        username: SEEDED_EMAIL.to_string(),
        password: password.to_string(),
    }
}

/// Email/password login ending on the dashboard
fn login_dashboard() -> HarnessResult<Flow> {
    Flow::builder("login-dashboard")
        .description("Log in with the seeded account and capture the dashboard")
        .tag("auth")
        .tag("smoke")
        .identity(seeded(SEEDED_EMAIL))
        .stage(
            Stage::checkpoint("dashboard")
                .navigate("${base_url}/login")
                .wait_for(Condition::selector(r#"input[name="email"]"#))
                .fill(r#"input[name="email"]"#, "${username}")
                .fill(r#"input[name="password"]"#, "${password}")
                .click(r#"button[type="submit"]"#)
                .wait_for(Condition::url("**/dashboard"))
                .screenshot("dashboard"),
        )
        .build()
}

/// Login page, then the dashboard once its heading renders
fn laravel_tour() -> HarnessResult<Flow> {
    Flow::builder("laravel-tour")
        .description("Capture the login page and the dashboard after logging in")
        .tag("auth")
        .identity(seeded(SEEDED_EMAIL))
        .stage(
            Stage::checkpoint("login")
                .navigate("${base_url}/login")
                .wait_for(Condition::selector(r#"input[name="email"]"#))
                .screenshot("login"),
        )
        .stage(
            Stage::checkpoint("dashboard")
                .fill(r#"input[name="email"]"#, "${username}")
                .fill(r#"input[name="password"]"#, "${password}")
                .click(r#"button[type="submit"]"#)
                .wait_for(Condition::url("**/dashboard"))
                .wait_for_within(Condition::selector("h2"), 10_000)
                .screenshot("dashboard"),
        )
        .build()
}

fn register_stage() -> Stage {
    Stage::new()
        .fill(r#"input[placeholder="ユーザー名"]"#, "${username}")
        .fill(r#"input[placeholder="パスワード"]"#, "${password}")
        .click(r#"button[type="submit"]"#)
        .wait_for(Condition::url("**/login"))
}

fn login_stage() -> Stage {
    Stage::new()
        .fill(r#"input[placeholder="ユーザー名"]"#, "${username}")
        .fill(r#"input[placeholder="パスワード"]"#, "${password}")
        .click(r#"button:has-text("ログイン")"#)
        .wait_for(Condition::url("**/home"))
}

/// Register a fresh user, log in and wait for the feed
fn register_and_login() -> Stage {
    Stage::new()
        .navigate("${base_url}/register")
        .fill(r#"input[placeholder="ユーザー名"]"#, "${username}")
        .fill(r#"input[placeholder="パスワード"]"#, "${password}")
        .click(r#"button[type="submit"]"#)
        .wait_for_within(Condition::selector(r#"h2:has-text("ログイン")"#), 10_000)
        .fill(r#"input[placeholder="ユーザー名"]"#, "${username}")
        .fill(r#"input[placeholder="パスワード"]"#, "${password}")
        .click(r#"button:has-text("ログイン")"#)
        .wait_for_within(Condition::selector(".post-card"), 10_000)
}

/// Post `${content}` through the API, then open the Q&A list
fn qa_list_stage(react: bool, settle_ms: u64) -> Stage {
    Stage::checkpoint("qa_list")
        .evaluate(
            &scripts::reference("create_posts"),
            json!({
                "api_url": "${api_url}",
                "items": "${content}",
                "react": react,
                "emojis": "${emojis}",
            }),
        )
        .click(r#"a[href="/qa"]"#)
        .wait_for_within(Condition::selector(".qa-list"), 5_000)
        .sleep(settle_ms)
        .screenshot("qa_list")
}

/// Full tour of the SNS app, from the API docs to the Q&A list
fn sns_tour() -> HarnessResult<Flow> {
    let mut posts = Stage::new().wait_for(Condition::selector(".post-card")).sleep(2_000);
    for i in 1..=3 {
        posts = posts
            .fill("textarea", &format!("テスト投稿 {} by ${{username}}", i))
            .click(r#"button:has-text("投稿")"#)
            .sleep(1_000);
    }

    Flow::builder("sns-tour")
        .description("Register, log in, post, react and visit every list of the SNS app")
        .tag("sns")
        .content(content::placeholder_question())
        .stage(
            Stage::checkpoint("api_docs")
                .navigate("${api_url}/docs.html")
                .wait_for(Condition::NetworkIdle)
                .screenshot("api_docs"),
        )
        .stage(
            Stage::checkpoint("register")
                .navigate("${base_url}/register")
                .wait_for(Condition::selector(r#"input[placeholder="ユーザー名"]"#))
                .screenshot("register"),
        )
        .stage(register_stage())
        .stage(
            Stage::checkpoint("login")
                .navigate("${base_url}/login")
                .wait_for(Condition::selector(r#"input[placeholder="ユーザー名"]"#))
                .screenshot("login"),
        )
        .stage(login_stage())
        .stage(posts)
        // Best effort: the feed is captured whether or not a reaction lands
        .stage(
            Stage::new()
                .click(r#"button:has-text("リアクション") >> nth=0"#)
                .wait_for(Condition::selector(".EmojiPickerReact"))
                .click(".EmojiPickerReact button")
                .sleep(1_000),
        )
        .stage(
            Stage::checkpoint("feed_with_post")
                .wait_for(Condition::selector(".post-card"))
                .screenshot("feed_with_post"),
        )
        .stage(
            Stage::checkpoint("create_post")
                .wait_for(Condition::selector(".post-card"))
                .screenshot_of("create_post", ".post-card"),
        )
        .stage(
            Stage::checkpoint("blog_list")
                .click("text=ブログ")
                .wait_for(Condition::selector(r#"input[placeholder="タイトル"]"#))
                .fill(r#"input[placeholder="タイトル"]"#, "はじめてのブログ")
                .fill("textarea", "${username} によるブログ投稿です。")
                .click(r#"button:has-text("投稿")"#)
                .sleep(2_000)
                .screenshot("blog_list"),
        )
        .stage(
            Stage::checkpoint("qa_list")
                .evaluate(
                    &scripts::reference("create_posts"),
                    json!({
                        "api_url": "${api_url}",
                        "items": "${content}",
                        "react": false,
                        "emojis": "${emojis}",
                    }),
                )
                .click(r#"a[href="/qa"]"#)
                .wait_for(Condition::url("**/qa"))
                .sleep(2_000)
                .screenshot("qa_list"),
        )
        .build()
}

/// Q&A list filled with questions that each carry a reaction
fn sns_qa_rich() -> HarnessResult<Flow> {
    Flow::builder("sns-qa-rich")
        .description("Capture a Q&A list of several reacted questions")
        .tag("sns")
        .tag("qa")
        .content(content::rich_questions())
        .stage(register_and_login())
        .stage(qa_list_stage(true, 2_000))
        .build()
}

/// Q&A list with only the placeholder question
fn sns_qa_only() -> HarnessResult<Flow> {
    Flow::builder("sns-qa-only")
        .description("Capture the Q&A list with a single placeholder question")
        .tag("sns")
        .tag("qa")
        .content(content::placeholder_question())
        .stage(register_and_login())
        .stage(qa_list_stage(false, 1_000))
        .build()
}

/// Blog and Q&A lists filled with throwaway titles
fn sns_trashy_all() -> HarnessResult<Flow> {
    let blogs = serde_json::to_value(content::trashy(ContentKind::Blog))?;

    Flow::builder("sns-trashy-all")
        .description("Fill the blog and Q&A lists with throwaway content and capture both")
        .tag("sns")
        .content(content::trashy(ContentKind::Question))
        .var("blogs", blogs)
        .stage(register_and_login())
        .stage(
            Stage::checkpoint("blog_list")
                .evaluate(
                    &scripts::reference("create_posts"),
                    json!({
                        "api_url": "${api_url}",
                        "items": "${blogs}",
                        "react": false,
                        "emojis": "${emojis}",
                    }),
                )
                .click("text=ブログ")
                .sleep(2_000)
                .screenshot("blog_list"),
        )
        .stage(qa_list_stage(true, 2_000))
        .build()
}

/// Second-generation SNS app, seeded account, every top-level page
fn sns2_tour() -> HarnessResult<Flow> {
    Flow::builder("sns2-tour")
        .description("Capture every top-level page of the second SNS app")
        .tag("sns2")
        .identity(seeded("password123"))
        .stage(
            Stage::checkpoint("01_login")
                .navigate("${base_url}/login")
                .wait_for(Condition::NetworkIdle)
                .screenshot("01_login"),
        )
        .stage(
            Stage::checkpoint("02_feed")
                .fill(r#"input[type="email"]"#, "${username}")
                .fill(r#"input[type="password"]"#, "${password}")
                .click(r#"button[type="submit"]"#)
                .wait_for(Condition::url("${base_url}/"))
                .wait_for(Condition::NetworkIdle)
                .sleep(1_000)
                .screenshot("02_feed"),
        )
        // Both tabs live on the feed page
        .stage(
            Stage::checkpoint("03_qa")
                .click(r#"role=button[name="Q&A"]"#)
                .sleep(1_000)
                .screenshot("03_qa"),
        )
        .stage(
            Stage::checkpoint("04_blog")
                .click(r#"role=button[name="ブログ"]"#)
                .sleep(1_000)
                .screenshot("04_blog"),
        )
        .stage(
            Stage::checkpoint("05_new_qa")
                .navigate("${base_url}/qa/new")
                .wait_for(Condition::NetworkIdle)
                .screenshot("05_new_qa"),
        )
        .stage(
            Stage::checkpoint("06_new_blog")
                .navigate("${base_url}/blog/new")
                .wait_for(Condition::NetworkIdle)
                .screenshot("06_new_blog"),
        )
        .stage(
            Stage::checkpoint("07_search")
                .navigate("${base_url}/search")
                .wait_for(Condition::NetworkIdle)
                .fill(r#"input[placeholder="キーワードで検索..."]"#, "salndfjnas")
                .press(None, "Enter")
                .sleep(1_000)
                .screenshot("07_search"),
        )
        .build()
}
