use std::collections::BTreeMap;
use std::fmt::Write as _;
use regex::Regex;
use reqwest::{Client, Method, Url};
use serde::Deserialize;
use tracing::debug;
use crate::errors::EngineError;
use crate::http::read_body_limited;
use crate::utils::truncation::truncate_chars;

const EVIDENCE_MAX_CHARS: usize = 2_000;

/// Declarative HTTP check.
#[derive(Debug, Clone, Deserialize)]
pub struct Template {
    pub id: String,
    #[serde(default)]
    pub info: TemplateInfo,
    #[serde(default, alias = "requests")]
    pub http: Vec<HttpRequest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub severity: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpRequest {
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub path: Vec<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default, rename = "matchers-condition")]
    pub matchers_condition: Condition,
    #[serde(default)]
    pub matchers: Vec<Matcher>,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    #[default]
    Or,
    And,
}

impl Condition {
    fn combine(self, mut results: impl Iterator<Item = bool>) -> bool {
        match self {
            Condition::Or => results.any(|r| r),
            Condition::And => results.all(|r| r),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatcherKind {
    Status,
    Word,
    Regex,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Part {
    #[default]
    Body,
    Header,
    All,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Matcher {
    #[serde(rename = "type")]
    pub kind: MatcherKind,
    #[serde(default)]
    pub part: Part,
    #[serde(default)]
    pub status: Vec<u16>,
    #[serde(default)]
    pub words: Vec<String>,
    #[serde(default)]
    pub regex: Vec<String>,
    #[serde(default)]
    pub condition: Condition,
    #[serde(default)]
    pub negative: bool,
}

/// What a matcher sees of one response.
#[derive(Debug, Clone, Default)]
pub struct Captured {
    pub status: u16,
    pub headers: String,
    pub body: String,
}

impl Captured {
    fn part(&self, part: Part) -> String {
        match part {
            Part::Body => self.body.clone(),
            Part::Header => self.headers.clone(),
            Part::All => format!("{}\r\n\r\n{}", self.headers, self.body),
        }
    }
}

impl Matcher {
    pub fn matches(&self, response: &Captured) -> bool {
        let hit = match self.kind {
            MatcherKind::Status => self.status.contains(&response.status),
            MatcherKind::Word => {
                let haystack = response.part(self.part);
                self.condition.combine(self.words.iter().map(|w| haystack.contains(w.as_str())))
            }
            MatcherKind::Regex => {
                let haystack = response.part(self.part);
                self.condition.combine(
                    self.regex
                        .iter()
                        .map(|p| Regex::new(p).map(|re| re.is_match(&haystack)).unwrap_or(false)),
                )
            }
        };
        hit != self.negative
    }

    fn validate(&self) -> Result<(), EngineError> {
        let empty = match self.kind {
            MatcherKind::Status => self.status.is_empty(),
            MatcherKind::Word => self.words.is_empty(),
            MatcherKind::Regex => self.regex.is_empty(),
        };
        if empty {
            return Err(EngineError::Config(format!("{:?} matcher has no values", self.kind)));
        }
        for pattern in &self.regex {
            Regex::new(pattern)
                .map_err(|e| EngineError::Config(format!("Invalid matcher regex '{}': {}", pattern, e)))?;
        }
        Ok(())
    }
}

impl HttpRequest {
    pub fn matches(&self, response: &Captured) -> bool {
        if self.matchers.is_empty() {
            return false;
        }
        self.matchers_condition.combine(self.matchers.iter().map(|m| m.matches(response)))
    }
}

/// Template variables derived from the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variables {
    pub base_url: String,
    pub root_url: String,
    pub hostname: String,
}

impl Variables {
    pub fn for_target(base_url: &str) -> Result<Self, EngineError> {
        let url = Url::parse(base_url).map_err(|_| EngineError::parse(base_url))?;
        let host = url.host_str().ok_or_else(|| EngineError::parse(base_url))?;
        let hostname = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            root_url: format!("{}://{}", url.scheme(), hostname),
            hostname,
        })
    }

    pub fn substitute(&self, raw: &str) -> String {
        raw.replace("{{BaseURL}}", &self.base_url)
            .replace("{{RootURL}}", &self.root_url)
            .replace("{{Hostname}}", &self.hostname)
    }
}

/// Outcome of running every request of a template.
#[derive(Debug, Clone, Default)]
pub struct TemplateRun {
    pub matched: bool,
    pub transcript: String,
    /// Set when no request produced a response.
    pub error: Option<String>,
}

impl Template {
    pub fn parse(content: &str) -> Result<Self, EngineError> {
        if content.trim().is_empty() {
            return Err(EngineError::Config("Template is empty".into()));
        }
        let template: Template = serde_yaml::from_str(content)
            .map_err(|e| EngineError::Config(format!("Invalid template: {}", e)))?;
        if template.http.is_empty() {
            return Err(EngineError::Config(format!("Template '{}' has no http requests", template.id)));
        }
        for request in &template.http {
            if request.path.is_empty() {
                return Err(EngineError::Config(format!("Template '{}' has a request without paths", template.id)));
            }
            Method::from_bytes(request.method.to_uppercase().as_bytes())
                .map_err(|_| EngineError::Config(format!("Unknown HTTP method '{}'", request.method)))?;
            for matcher in &request.matchers {
                matcher.validate()?;
            }
        }
        Ok(template)
    }

    /// Send each request in order; stop at the first match.
    pub async fn execute(&self, client: &Client, vars: &Variables, max_body: usize) -> TemplateRun {
        let mut run = TemplateRun::default();
        let mut responses = 0usize;
        let mut last_error = None;

        let _ = writeln!(run.transcript, "# {} ({}) {}", self.id, self.info.severity, self.info.name);
        'requests: for request in &self.http {
            let method = Method::from_bytes(request.method.to_uppercase().as_bytes()).unwrap_or(Method::GET);
            for path in &request.path {
                let url = vars.substitute(path);
                let _ = writeln!(run.transcript, "> {} {}", method, url);

                let mut builder = client.request(method.clone(), &url);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), vars.substitute(value));
                }
                if let Some(body) = &request.body {
                    builder = builder.body(vars.substitute(body));
                }

                let captured = match capture(builder, max_body).await {
                    Ok(c) => c,
                    Err(e) => {
                        debug!(url = %url, error = %e, "Template request failed");
                        let _ = writeln!(run.transcript, "! {}", e);
                        last_error = Some(e.to_string());
                        continue;
                    }
                };
                responses += 1;
                let _ = writeln!(run.transcript, "< {}", captured.status);
                let _ = writeln!(run.transcript, "{}", truncate_chars(&captured.body, EVIDENCE_MAX_CHARS));

                if request.matches(&captured) {
                    run.matched = true;
                    let _ = writeln!(run.transcript, "[matched] {}", url);
                    break 'requests;
                }
            }
        }

        if responses == 0 {
            run.error = last_error;
        }
        run
    }
}

async fn capture(builder: reqwest::RequestBuilder, max_body: usize) -> Result<Captured, EngineError> {
    let response = builder.send().await?;
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(k, v)| format!("{}: {}", k, v.to_str().unwrap_or("")))
        .collect::<Vec<_>>()
        .join("\r\n");
    let body = read_body_limited(response, max_body).await?;
    Ok(Captured {
        status,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}
