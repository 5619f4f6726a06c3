use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

// ── CLI definition ─────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "mindmark", about = "mindmark: a small bookmarking brain", version)]
struct Cli {
    /// mindmark server URL
    #[arg(long, env = "MINDMARK_SERVER", default_value = "http://localhost:8080")]
    server: String,

    /// Session token from `mindmark signin` ($MINDMARK_TOKEN)
    #[arg(long, env = "MINDMARK_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(long, env = "MINDMARK_PORT", default_value = "8080")]
        port: u16,
        /// Host to bind
        #[arg(long, env = "MINDMARK_HOST", default_value = "0.0.0.0")]
        host: String,
        /// Directory holding the database file
        #[arg(long, env = "MINDMARK_DATA_DIR")]
        data_dir: Option<PathBuf>,
        /// Public base URL that share links are built on
        #[arg(long, env = "MINDMARK_BASE_URL")]
        base_url: Option<String>,
    },
    /// Create an account
    Signup { username: String, password: String },
    /// Sign in and print a session token
    Signin { username: String, password: String },
    /// Save a link
    Add {
        link: String,
        /// image, video, article or audio
        #[arg(long = "type", default_value = "article")]
        kind: String,
        #[arg(long)]
        title: String,
        /// Tag to attach; repeatable
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// List your saved content
    List,
    /// Delete a content item by ID
    Delete { content_id: String },
    /// Create a shareable link for a content item
    Share { content_id: String },
    /// Show the content behind a share link or hash
    Open { share: String },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_level = match cli.command {
        Commands::Serve { .. } => "info",
        _ => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("MINDMARK_LOG_LEVEL")
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let api = Api::new(&cli.server);

    match cli.command {
        Commands::Serve {
            port,
            host,
            data_dir,
            base_url,
        } => cmd_serve(host, port, data_dir, base_url).await,

        Commands::Signup { username, password } => {
            let name = api.signup(&username, &password).await?;
            println!("✓ created user {name}");
            Ok(())
        }

        Commands::Signin { username, password } => {
            println!("{}", api.signin(&username, &password).await?);
            Ok(())
        }

        Commands::Add {
            link,
            kind,
            title,
            tags,
        } => {
            let token = require_token(&cli.token)?;
            let content = api.add(&token, &link, &kind, &title, &tags).await?;
            println!("✓ saved {}", content["id"].as_str().unwrap_or_default());
            Ok(())
        }

        Commands::List => {
            let token = require_token(&cli.token)?;
            let items = api.list(&token).await?;
            if items.is_empty() {
                println!("(nothing saved yet)");
            }
            for item in &items {
                println!("{}", format_item(item));
            }
            Ok(())
        }

        Commands::Delete { content_id } => {
            let token = require_token(&cli.token)?;
            api.delete(&token, &content_id).await?;
            println!("✓ deleted {content_id}");
            Ok(())
        }

        Commands::Share { content_id } => {
            let token = require_token(&cli.token)?;
            println!("{}", api.share(&token, &content_id).await?);
            Ok(())
        }

        Commands::Open { share } => {
            let token = require_token(&cli.token)?;
            let item = api.open(&token, share_hash(&share)).await?;
            println!("{}", format_item(&item));
            Ok(())
        }
    }
}

// ── Command implementations ───────────────────────────────────────────────────

async fn cmd_serve(
    host: String,
    port: u16,
    data_dir: Option<PathBuf>,
    base_url: Option<String>,
) -> Result<()> {
    let cfg = mindmark_server::ServerConfig {
        host,
        port,
        data_dir,
        base_url,
        ..Default::default()
    };
    mindmark_server::run(cfg).await
}

/// Thin client for the mindmark HTTP API.
struct Api {
    client: Client,
    server: String,
}

impl Api {
    fn new(server: &str) -> Self {
        Self {
            client: Client::new(),
            server: server.trim_end_matches('/').to_owned(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.server)
    }

    async fn signup(&self, username: &str, password: &str) -> Result<String> {
        let body = json!({"username": username, "password": password});
        let json = send(self.client.post(self.url("/signup")).json(&body)).await?;
        Ok(json["user"]["username"]
            .as_str()
            .unwrap_or(username)
            .to_owned())
    }

    async fn signin(&self, username: &str, password: &str) -> Result<String> {
        let body = json!({"username": username, "password": password});
        let json = send(self.client.post(self.url("/signin")).json(&body)).await?;
        json["token"]
            .as_str()
            .map(str::to_owned)
            .context("server response has no token")
    }

    async fn add(
        &self,
        token: &str,
        link: &str,
        kind: &str,
        title: &str,
        tags: &[String],
    ) -> Result<Value> {
        let body = json!({"link": link, "type": kind, "title": title, "tags": tags});
        let json = send(
            self.client
                .post(self.url("/content"))
                .header("Authorization", token)
                .json(&body),
        )
        .await?;
        Ok(json["content"].clone())
    }

    async fn list(&self, token: &str) -> Result<Vec<Value>> {
        let json = send(
            self.client
                .get(self.url("/content"))
                .header("Authorization", token),
        )
        .await?;
        serde_json::from_value(json["data"].clone()).context("parse content list")
    }

    async fn delete(&self, token: &str, content_id: &str) -> Result<()> {
        send(
            self.client
                .delete(self.url("/content"))
                .header("Authorization", token)
                .json(&json!({"contentId": content_id})),
        )
        .await?;
        Ok(())
    }

    async fn share(&self, token: &str, content_id: &str) -> Result<String> {
        let json = send(
            self.client
                .post(self.url("/brain/share"))
                .header("Authorization", token)
                .json(&json!({"contentId": content_id})),
        )
        .await?;
        json["shareableUrl"]
            .as_str()
            .map(str::to_owned)
            .context("server response has no shareableUrl")
    }

    async fn open(&self, token: &str, hash: &str) -> Result<Value> {
        let json = send(
            self.client
                .get(self.url(&format!("/brain/{hash}")))
                .header("Authorization", token),
        )
        .await?;
        Ok(json["content"].clone())
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Send a request and return its JSON body, turning non-2xx into an error
/// carrying the server's message.
async fn send(request: RequestBuilder) -> Result<Value> {
    let resp = request.send().await.context("HTTP request failed")?;
    let status = resp.status();
    let json: Value = resp.json().await.unwrap_or_default();

    if !status.is_success() {
        anyhow::bail!("{}", error_message(status, &json));
    }
    Ok(json)
}

fn error_message(status: StatusCode, json: &Value) -> String {
    let message = json["message"].as_str().unwrap_or("request failed");
    let details: Vec<String> = json["errors"]
        .as_array()
        .map(|errs| {
            errs.iter()
                .map(|e| {
                    format!(
                        "{}: {}",
                        e["path"].as_str().unwrap_or("?"),
                        e["message"].as_str().unwrap_or("")
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    if details.is_empty() {
        format!("server returned {status}: {message}")
    } else {
        format!("server returned {status}: {message} ({})", details.join("; "))
    }
}

fn require_token(token: &Option<String>) -> Result<String> {
    token
        .clone()
        .context("--token / MINDMARK_TOKEN is required for this command")
}

/// Accept either a full shareable URL or a bare hash.
fn share_hash(share: &str) -> &str {
    share.trim_end_matches('/').rsplit('/').next().unwrap_or(share)
}

fn format_item(item: &Value) -> String {
    let tags: Vec<&str> = item["tags"]
        .as_array()
        .map(|t| t.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let mut line = format!(
        "  {}  [{}] {}  {}",
        item["id"].as_str().unwrap_or("?"),
        item["type"].as_str().unwrap_or("?"),
        item["title"].as_str().unwrap_or(""),
        item["link"].as_str().unwrap_or(""),
    );
    if !tags.is_empty() {
        line.push_str(&format!("  #{}", tags.join(" #")));
    }
    line
}
