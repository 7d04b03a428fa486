//! LM backend that shells out to a user-configured command.
//!
//! The prompt goes to the command's stdin and the response is read from its
//! stdout. Any tool that accepts text and produces text works (`claude -p`,
//! `llm`, `ollama run`, a wrapper script). Scoring calls run with
//! `DFORGE_LM_ROLE=score` and `DFORGE_LM_TEMPERATURE=0` in the environment so
//! wrappers can pin deterministic decoding.
use super::lm_log::{LmCallKind, LmLog};
use super::{
    GenerationRequest, RelevanceJudgment, RelevanceScorer, ScoringRequest, TextGenerator,
};
use crate::config::LM_COMMAND_ENV;
use crate::error::BackendError;
use crate::prompts::{GENERATE_SECTION_PROMPT_MD, RELEVANCE_SCORE_PROMPT_MD};
use crate::util::{fill_placeholders, preview};
use anyhow::{anyhow, Context, Result};
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use std::time::Instant;

/// Environment variable naming the role of a call (`generate` or `score`).
pub const LM_ROLE_ENV: &str = "DFORGE_LM_ROLE";
/// Environment variable carrying the requested sampling temperature.
pub const LM_TEMPERATURE_ENV: &str = "DFORGE_LM_TEMPERATURE";

const GENERATE_ENV: &[(&str, &str)] = &[(LM_ROLE_ENV, "generate")];
const SCORE_ENV: &[(&str, &str)] = &[(LM_ROLE_ENV, "score"), (LM_TEMPERATURE_ENV, "0")];

const STDERR_PREVIEW_BYTES: usize = 400;

pub struct LmCommandBackend {
    generate_args: Vec<String>,
    score_args: Vec<String>,
    log: Option<LmLog>,
}

impl LmCommandBackend {
    /// Parse the generation command and optional scoring command.
    pub fn new(command: &str, scoring_command: Option<&str>) -> Result<Self> {
        let generate_args = split_command(command)?;
        let score_args = match scoring_command {
            Some(scoring) => split_command(scoring)?,
            None => generate_args.clone(),
        };
        Ok(Self {
            generate_args,
            score_args,
            log: None,
        })
    }

    pub fn with_log(mut self, log: LmLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn log(&self) -> Option<&LmLog> {
        self.log.as_ref()
    }

    /// Check that the configured programs can be found before a run starts.
    pub fn ensure_available(&self) -> Result<()> {
        for program in [&self.generate_args[0], &self.score_args[0]] {
            which::which(program).with_context(|| {
                format!("LM command not found: {program} (set --lm or {LM_COMMAND_ENV})")
            })?;
        }
        Ok(())
    }

    fn call(
        &self,
        kind: LmCallKind,
        subject: &str,
        prompt: &str,
    ) -> Result<String, BackendError> {
        let builder = self
            .log
            .as_ref()
            .map(|log| log.begin(kind, subject).with_prompt_preview(prompt));
        let (args, env) = match kind {
            LmCallKind::Generate => (self.generate_args.as_slice(), GENERATE_ENV),
            LmCallKind::Score => (self.score_args.as_slice(), SCORE_ENV),
        };
        let result = invoke_lm_command(args, env, prompt);
        if let (Some(log), Some(builder)) = (self.log.as_ref(), builder) {
            let entry = match &result {
                Ok(_) => builder.success(),
                Err(err) => builder.failed(err.to_string()),
            };
            log.record(&entry);
        }
        result
    }
}

impl TextGenerator for LmCommandBackend {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, BackendError> {
        let prompt = render_generation_prompt(request);
        self.call(LmCallKind::Generate, request.heading, &prompt)
    }
}

impl RelevanceScorer for LmCommandBackend {
    fn score(&self, request: &ScoringRequest<'_>) -> Result<RelevanceJudgment, BackendError> {
        let prompt = render_scoring_prompt(request);
        let response = self.call(LmCallKind::Score, request.path, &prompt)?;
        parse_judgment(&response)
    }
}

fn split_command(command: &str) -> Result<Vec<String>> {
    let args =
        shell_words::split(command).with_context(|| format!("parse LM command: {command}"))?;
    if args.is_empty() {
        return Err(anyhow!("LM command is empty"));
    }
    Ok(args)
}

/// Run the LM command once with `prompt` on stdin.
fn invoke_lm_command(
    args: &[String],
    env: &[(&str, &str)],
    prompt: &str,
) -> Result<String, BackendError> {
    let start = Instant::now();
    let mut child = Command::new(&args[0])
        .args(&args[1..])
        .envs(env.iter().copied())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| match err.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                BackendError::Permanent(format!("spawn LM command {}: {err}", args[0]))
            }
            _ => BackendError::Transient(format!("spawn LM command {}: {err}", args[0])),
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        // A command that exits without reading its input is judged by its status.
        if let Err(err) = stdin.write_all(prompt.as_bytes()) {
            if err.kind() != ErrorKind::BrokenPipe {
                return Err(BackendError::Transient(format!(
                    "write prompt to LM stdin: {err}"
                )));
            }
        }
    }

    let output = child
        .wait_with_output()
        .map_err(|err| BackendError::Transient(format!("wait for LM command: {err}")))?;
    let elapsed_ms = start.elapsed().as_millis();

    tracing::info!(
        elapsed_ms,
        prompt_bytes = prompt.len(),
        response_bytes = output.stdout.len(),
        "lm invoke complete"
    );

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BackendError::Transient(format!(
            "LM command failed with {}: {}",
            output.status,
            preview(stderr.trim(), STDERR_PREVIEW_BYTES)
        )));
    }

    let text = String::from_utf8_lossy(&output.stdout).into_owned();
    if text.trim().is_empty() {
        return Err(BackendError::Transient("LM returned an empty response".to_string()));
    }
    Ok(text)
}

/// Fill the section prompt template.
pub(crate) fn render_generation_prompt(request: &GenerationRequest<'_>) -> String {
    let constraints = request
        .constraints
        .and_then(|constraints| serde_json::to_string_pretty(constraints).ok())
        .unwrap_or_else(|| "(none)".to_string());
    let context = request
        .context
        .filter(|context| !context.is_empty())
        .map(|context| context.render())
        .unwrap_or_else(|| "(none: this is the first section)".to_string());
    let sources = if request.sources.is_empty() {
        "(none)".to_string()
    } else {
        let mut rendered = String::new();
        for source in request.sources {
            rendered.push_str(&format!(
                "### File: {}\n```\n{}\n```\n\n",
                source.path,
                source.content.trim_end()
            ));
        }
        rendered.trim_end().to_string()
    };
    fill_placeholders(
        GENERATE_SECTION_PROMPT_MD,
        &[
            ("heading", request.heading),
            ("instructions", request.prompt.trim()),
            ("constraints", constraints.as_str()),
            ("context", context.as_str()),
            ("sources", sources.as_str()),
        ],
    )
}

pub(crate) fn render_scoring_prompt(request: &ScoringRequest<'_>) -> String {
    fill_placeholders(
        RELEVANCE_SCORE_PROMPT_MD,
        &[
            ("purpose", request.section_purpose.trim()),
            ("path", request.path),
            ("excerpt", request.excerpt.trim_end()),
        ],
    )
}


fn parse_judgment(text: &str) -> Result<RelevanceJudgment, BackendError> {
    let json = extract_json(text);
    let judgment: RelevanceJudgment = serde_json::from_str(json).map_err(|err| {
        BackendError::Transient(format!(
            "parse relevance judgment: {err}; response: {}",
            preview(text.trim(), 200)
        ))
    })?;
    if !judgment.score.is_finite() {
        return Err(BackendError::Transient(
            "relevance judgment score is not a number".to_string(),
        ));
    }
    Ok(judgment)
}

/// Extract JSON from text that might be wrapped in markdown code fences.
fn extract_json(text: &str) -> &str {
    let text = text.trim();

    if let Some(start) = text.find("```json") {
        let start = start + 7;
        if let Some(end) = text[start..].find("```") {
            return text[start..start + end].trim();
        }
    }

    if let Some(start) = text.find("```") {
        let start = start + 3;
        let start = text[start..]
            .find('\n')
            .map(|i| start + i + 1)
            .unwrap_or(start);
        if let Some(end) = text[start..].find("```") {
            return text[start..start + end].trim();
        }
    }

    // Fall back to the outermost braces when the model adds prose.
    match (text.find('{'), text.rfind('}')) {
        (Some(open), Some(close)) if open < close => &text[open..=close],
        _ => text,
    }
}
