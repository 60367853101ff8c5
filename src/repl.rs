// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Line commands for the interactive client.

use std::str::FromStr;

use portal_client::auth::{check_access, Access, Role, Session};
use portal_client::client::{ApiRequest, Transport};
use portal_client::config::UNAUTHORIZED_PAGE;
use portal_client::error::ClientError;
use reqwest::Method;
use serde_json::Value;

pub const HELP: &str = "\
commands:
  login student <email>
  login fa <email>
  login admin <email> <password> [captcha-token]
  get <path>
  post|put|patch|delete <path> [json]
  whoami
  access admin|student|fa
  refresh
  logout
  help
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    LoginStudent(String),
    LoginFa(String),
    LoginAdmin {
        email: String,
        password: String,
        captcha: Option<String>,
    },
    Call {
        method: Method,
        path: String,
        body: Option<Value>,
    },
    WhoAmI,
    Access(Role),
    Refresh,
    Logout,
    Help,
    Quit,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}`, try `help`")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid JSON body: {0}")]
    InvalidJson(String),
    #[error("{0}")]
    InvalidRole(String),
}

/// Split off the first whitespace-delimited word.
fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim();
    match input.find(char::is_whitespace) {
        Some(at) => (&input[..at], input[at..].trim()),
        None => (input, ""),
    }
}

pub fn parse(line: &str) -> Result<Command, CommandError> {
    let (word, rest) = split_word(line);
    match word.to_ascii_lowercase().as_str() {
        "" => Err(CommandError::Empty),
        "login" => parse_login(rest),
        "get" => parse_call(Method::GET, rest),
        "post" => parse_call(Method::POST, rest),
        "put" => parse_call(Method::PUT, rest),
        "patch" => parse_call(Method::PATCH, rest),
        "delete" => parse_call(Method::DELETE, rest),
        "whoami" => Ok(Command::WhoAmI),
        "access" => Role::from_str(rest)
            .map(Command::Access)
            .map_err(CommandError::InvalidRole),
        "refresh" => Ok(Command::Refresh),
        "logout" => Ok(Command::Logout),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        _ => Err(CommandError::Unknown(word.to_string())),
    }
}

fn parse_login(rest: &str) -> Result<Command, CommandError> {
    let args: Vec<&str> = rest.split_whitespace().collect();
    match args.as_slice() {
        [role, email] if role.eq_ignore_ascii_case("student") => {
            Ok(Command::LoginStudent(email.to_string()))
        }
        [role, email] if role.eq_ignore_ascii_case("fa") => Ok(Command::LoginFa(email.to_string())),
        [role, email, password, captcha @ ..]
            if role.eq_ignore_ascii_case("admin") && captcha.len() <= 1 =>
        {
            Ok(Command::LoginAdmin {
                email: email.to_string(),
                password: password.to_string(),
                captcha: captcha.first().map(|c| c.to_string()),
            })
        }
        _ => Err(CommandError::Usage(
            "login student|fa <email> | login admin <email> <password> [captcha-token]",
        )),
    }
}

fn parse_call(method: Method, rest: &str) -> Result<Command, CommandError> {
    let (path, body) = split_word(rest);
    if path.is_empty() {
        return Err(CommandError::Usage("get|post|put|patch|delete <path> [json]"));
    }
    let body = if body.is_empty() {
        None
    } else {
        Some(serde_json::from_str(body).map_err(|e| CommandError::InvalidJson(e.to_string()))?)
    };
    Ok(Command::Call {
        method,
        path: path.to_string(),
        body,
    })
}

fn pretty(value: &impl serde::Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unprintable: {e}>"))
}

/// Run one command and return what to print.
pub async fn run<T: Transport>(session: &Session<T>, command: Command) -> Result<String, ClientError> {
    match command {
        Command::LoginStudent(email) => {
            session.login_student(&email).await.map(|identity| pretty(&identity))
        }
        Command::LoginFa(email) => session.login_fa(&email).await.map(|identity| pretty(&identity)),
        Command::LoginAdmin {
            email,
            password,
            captcha,
        } => session
            .login_admin(&email, &password, captcha.as_deref())
            .await
            .map(|identity| pretty(&identity)),
        Command::Call { method, path, body } => {
            let mut request = ApiRequest::new(method, path);
            if let Some(body) = &body {
                request = request.json(body)?;
            }
            let response = session.client().execute(request).await?;
            let rendered = match response.json::<Value>() {
                Ok(value) => pretty(&value),
                Err(_) => response.text(),
            };
            Ok(format!("{}\n{rendered}", response.status))
        }
        Command::WhoAmI => Ok(match session.current() {
            Some(identity) => pretty(&identity),
            None => "not signed in".to_string(),
        }),
        Command::Access(role) => {
            let current = session.current();
            let access = check_access(role, current.as_ref(), session.client().endpoints());
            Ok(match access {
                Access::Granted => format!("{role}: granted"),
                Access::Login(target) => format!("{role}: sign in at {target}"),
                Access::Unauthorized => format!("{role}: unauthorized, see {UNAUTHORIZED_PAGE}"),
            })
        }
        Command::Refresh => session
            .client()
            .refresh_session()
            .await
            .map(|()| "session refreshed".to_string()),
        Command::Logout => {
            session.logout().await;
            Ok("signed out".to_string())
        }
        Command::Help => Ok(HELP.to_string()),
        Command::Quit => Ok(String::new()),
    }
}
