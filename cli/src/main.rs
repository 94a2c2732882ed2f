use std::fs::File;
use std::io::{self, BufRead, BufReader};

use clap::{Args, Parser, Subcommand};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing session token; run `auth verify` and pass --session-token or set QUARRY_SESSION_TOKEN")]
    MissingSessionToken,
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    #[error("server returned {status}: {message}")]
    ServerError { status: String, message: String },
    #[error("invalid field `{0}`; expected name=value")]
    InvalidField(String),
    #[error("missing expected field `{0}`")]
    MissingField(&'static str),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "quarry-cli", about = "Quarry operations records API CLI")]
struct Cli {
    #[arg(long, env = "QUARRY_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[arg(long, env = "QUARRY_SESSION_TOKEN")]
    session_token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone)]
struct CliContext {
    base_url: String,
    session_token: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    Ping,
    Auth(AuthCommand),
    Records(RecordsCommand),
    Dashboard,
    Forms {
        /// Show one record type instead of every writable one.
        kind: Option<String>,
    },
    Approvals {
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        offset: Option<i64>,
    },
}

#[derive(Args, Debug)]
struct AuthCommand {
    #[command(subcommand)]
    command: AuthSubcommand,
}

#[derive(Subcommand, Debug)]
enum AuthSubcommand {
    RequestCode {
        #[arg(long)]
        email: String,
    },
    /// Exchange a code for a session token (printed on stdout).
    Verify {
        #[arg(long)]
        email: String,
        #[arg(long)]
        code: String,
    },
    Me,
    Logout,
}

#[derive(Args, Debug)]
struct RecordsCommand {
    #[command(subcommand)]
    command: RecordsSubcommand,
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    from: Option<String>,
    #[arg(long)]
    to: Option<String>,
    #[arg(long)]
    created_by: Option<Uuid>,
    #[arg(long)]
    q: Option<String>,
    #[arg(long)]
    limit: Option<i64>,
    #[arg(long)]
    offset: Option<i64>,
}

#[derive(Subcommand, Debug)]
enum RecordsSubcommand {
    List {
        kind: String,
        #[command(flatten)]
        filter: FilterArgs,
    },
    Create {
        kind: String,
        /// Whole submission as a JSON object.
        #[arg(long, conflicts_with = "field")]
        data: Option<String>,
        /// One `name=value` pair; repeatable.
        #[arg(long)]
        field: Vec<String>,
    },
    Get {
        kind: String,
        id: Uuid,
    },
    Delete {
        kind: String,
        id: Uuid,
    },
    Review {
        kind: String,
        id: Uuid,
        #[arg(long, value_parser = ["approve", "reject"])]
        decision: String,
        #[arg(long)]
        note: Option<String>,
    },
    Summary {
        kind: String,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Re-submit the records of a JSON-lines export.
    Import {
        kind: String,
        #[arg(long, default_value = "-", help = "Input file path, or - for stdin")]
        input: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let ctx = CliContext { base_url: cli.base_url, session_token: cli.session_token };

    match cli.command {
        Command::Ping => run_ping(&ctx).await,
        Command::Auth(auth) => run_auth(&ctx, auth).await,
        Command::Records(records) => run_records(&ctx, records).await,
        Command::Dashboard => {
            let json = api_request(&ctx, reqwest::Method::GET, "/api/dashboard", &[], None).await?;
            print_json(&json)
        }
        Command::Forms { kind } => {
            let path = match kind {
                Some(kind) => format!("/api/forms/{kind}"),
                None => "/api/forms".to_owned(),
            };
            let json = api_request(&ctx, reqwest::Method::GET, &path, &[], None).await?;
            print_json(&json)
        }
        Command::Approvals { limit, offset } => {
            let filter = FilterArgs { limit, offset, ..FilterArgs::default() };
            let query = filter_query(&filter);
            let json = api_request(&ctx, reqwest::Method::GET, "/api/approvals", &query, None).await?;
            print_json(&json)
        }
    }
}

async fn run_ping(cli: &CliContext) -> Result<(), CliError> {
    let client = reqwest::Client::new();
    let url = format!("{}/healthz", cli.base_url.trim_end_matches('/'));
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::ServerError {
            status: format!("HTTP {}", status.as_u16()),
            message: "health check failed".to_owned(),
        });
    }
    println!("ok");
    Ok(())
}

async fn run_auth(cli: &CliContext, auth: AuthCommand) -> Result<(), CliError> {
    match auth.command {
        AuthSubcommand::RequestCode { email } => {
            let json = public_request(
                cli,
                "/api/auth/email/request-code",
                serde_json::json!({ "email": email }),
            )
            .await?;
            if let Some(code) = json.get("code").and_then(Value::as_str) {
                eprintln!("access code (dev echo): {code}");
            } else {
                eprintln!("access code sent to {email}");
            }
            Ok(())
        }
        AuthSubcommand::Verify { email, code } => {
            let json = public_request(
                cli,
                "/api/auth/email/verify-code",
                serde_json::json!({ "email": email, "code": code }),
            )
            .await?;
            let token = json
                .get("token")
                .and_then(Value::as_str)
                .ok_or(CliError::MissingField("token"))?;
            println!("{token}");
            Ok(())
        }
        AuthSubcommand::Me => {
            let json = api_request(cli, reqwest::Method::GET, "/api/auth/me", &[], None).await?;
            print_json(&json)
        }
        AuthSubcommand::Logout => {
            api_request(cli, reqwest::Method::POST, "/api/auth/logout", &[], None).await?;
            eprintln!("signed out");
            Ok(())
        }
    }
}

async fn run_records(cli: &CliContext, records: RecordsCommand) -> Result<(), CliError> {
    match records.command {
        RecordsSubcommand::List { kind, filter } => {
            let path = format!("/api/records/{kind}");
            let json = api_request(cli, reqwest::Method::GET, &path, &filter_query(&filter), None).await?;
            print_json(&json)
        }
        RecordsSubcommand::Create { kind, data, field } => {
            let body = match data {
                Some(raw) => serde_json::from_str::<Value>(&raw)?,
                None => parse_field_pairs(&field)?,
            };
            let path = format!("/api/records/{kind}");
            let json = api_request(cli, reqwest::Method::POST, &path, &[], Some(body)).await?;
            print_json(&json)
        }
        RecordsSubcommand::Get { kind, id } => {
            let path = format!("/api/records/{kind}/{id}");
            let json = api_request(cli, reqwest::Method::GET, &path, &[], None).await?;
            print_json(&json)
        }
        RecordsSubcommand::Delete { kind, id } => {
            let path = format!("/api/records/{kind}/{id}");
            let json = api_request(cli, reqwest::Method::DELETE, &path, &[], None).await?;
            print_json(&json)
        }
        RecordsSubcommand::Review { kind, id, decision, note } => {
            let path = format!("/api/records/{kind}/{id}/review");
            let body = serde_json::json!({ "decision": decision, "note": note });
            let json = api_request(cli, reqwest::Method::POST, &path, &[], Some(body)).await?;
            print_json(&json)
        }
        RecordsSubcommand::Summary { kind, filter } => {
            let path = format!("/api/records/{kind}/summary");
            let json = api_request(cli, reqwest::Method::GET, &path, &filter_query(&filter), None).await?;
            print_json(&json)
        }
        RecordsSubcommand::Import { kind, input } => import_records(cli, &kind, &input).await,
    }
}

async fn import_records(cli: &CliContext, kind: &str, input: &str) -> Result<(), CliError> {
    let reader: Box<dyn BufRead> = if input == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(File::open(input)?))
    };

    let path = format!("/api/records/{kind}");
    let mut created = 0_usize;
    let mut skipped = 0_usize;
    for line in reader.lines() {
        let Some(data) = parse_export_line(&line?)? else {
            skipped = skipped.saturating_add(1);
            continue;
        };
        api_request(cli, reqwest::Method::POST, &path, &[], Some(data)).await?;
        created = created.saturating_add(1);
    }

    eprintln!("created {created} records, skipped {skipped} lines");
    Ok(())
}

async fn api_request(
    cli: &CliContext,
    method: reqwest::Method,
    path: &str,
    query: &[(&str, String)],
    body: Option<Value>,
) -> Result<Value, CliError> {
    let session_token = cli
        .session_token
        .as_deref()
        .ok_or(CliError::MissingSessionToken)?;

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {session_token}"))?);

    let client = reqwest::Client::builder()
        .default_headers(headers)
        .build()?;
    let url = format!("{}{}", cli.base_url.trim_end_matches('/'), path);

    let request = client.request(method, &url).query(query);
    let request = if let Some(json) = body {
        request.json(&json)
    } else {
        request
    };

    read_response(request.send().await?).await
}

async fn public_request(cli: &CliContext, path: &str, body: Value) -> Result<Value, CliError> {
    let url = format!("{}{}", cli.base_url.trim_end_matches('/'), path);
    let response = reqwest::Client::new().post(url).json(&body).send().await?;
    read_response(response).await
}

async fn read_response(response: reqwest::Response) -> Result<Value, CliError> {
    let status = response.status();
    let value = response
        .json::<Value>()
        .await
        .unwrap_or_else(|_| Value::Null);

    if !status.is_success() {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| value.to_string(), str::to_owned);
        return Err(CliError::ServerError { status: format!("HTTP {}", status.as_u16()), message });
    }

    Ok(value)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

fn filter_query(filter: &FilterArgs) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(status) = &filter.status {
        query.push(("status", status.clone()));
    }
    if let Some(from) = &filter.from {
        query.push(("from", from.clone()));
    }
    if let Some(to) = &filter.to {
        query.push(("to", to.clone()));
    }
    if let Some(created_by) = filter.created_by {
        query.push(("created_by", created_by.to_string()));
    }
    if let Some(q) = &filter.q {
        query.push(("q", q.clone()));
    }
    if let Some(limit) = filter.limit {
        query.push(("limit", limit.to_string()));
    }
    if let Some(offset) = filter.offset {
        query.push(("offset", offset.to_string()));
    }
    query
}

/// Build a submission from `name=value` pairs. Values stay strings; the
/// server parses them per field type.
fn parse_field_pairs(pairs: &[String]) -> Result<Value, CliError> {
    let mut map = Map::new();
    for pair in pairs {
        let Some((name, value)) = pair.split_once('=') else {
            return Err(CliError::InvalidField(pair.clone()));
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(CliError::InvalidField(pair.clone()));
        }
        map.insert(name.to_owned(), Value::String(value.to_owned()));
    }
    Ok(Value::Object(map))
}

/// Submission carried by one export line, or `None` for meta and blank lines.
///
/// Derived values are dropped because the server recomputes them and rejects
/// them as unknown fields.
fn parse_export_line(line: &str) -> Result<Option<Value>, CliError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value = serde_json::from_str::<Value>(trimmed)?;
    if value.get("type").and_then(Value::as_str) != Some("record") {
        return Ok(None);
    }
    let Some(Value::Object(mut data)) = value.get("data").cloned() else {
        return Ok(None);
    };
    if let Some(derived) = value.get("derived").and_then(Value::as_array) {
        for name in derived.iter().filter_map(Value::as_str) {
            data.remove(name);
        }
    }
    Ok(Some(Value::Object(data)))
}
