//! Conversation summaries and suggestion generation.
//!
//! `HttpAiProvider` talks to the external AI service (local or AWS, picked by
//! config). `OfflineAiProvider` answers without any network and is used when
//! no endpoint is configured.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Suggestion, SuggestionKind};

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI service unreachable: {0}")]
    Unreachable(String),
    #[error("AI service returned {0}")]
    Upstream(u16),
    #[error("AI response parse error: {0}")]
    Decode(String),
    #[error("nothing to summarize")]
    EmptyTranscript,
}

/// One line of a conversation as handed to the summarizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptLine {
    pub speaker: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
}

#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn summarize(&self, transcript: &[TranscriptLine]) -> Result<String, AiError>;
    async fn suggest(&self, request: &SuggestionRequest) -> Result<Vec<Suggestion>, AiError>;
}

#[derive(Serialize)]
struct SummarizeBody<'a> {
    messages: &'a [TranscriptLine],
}

#[derive(Deserialize)]
struct SummarizeReply {
    summary: String,
}

#[derive(Deserialize)]
struct SuggestReply {
    suggestions: Vec<Suggestion>,
}

pub struct HttpAiProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAiProvider {
    pub fn new(base_url: &str) -> Result<Self, AiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AiError::Unreachable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<B: Serialize + ?Sized, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, AiError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("POST {}", url);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!("AI service unreachable at {}: {}", url, e);
                AiError::Unreachable(e.to_string())
            })?;
        if !resp.status().is_success() {
            error!("AI service error at {}: {}", url, resp.status());
            return Err(AiError::Upstream(resp.status().as_u16()));
        }
        resp.json::<R>()
            .await
            .map_err(|e| AiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AiProvider for HttpAiProvider {
    async fn summarize(&self, transcript: &[TranscriptLine]) -> Result<String, AiError> {
        if transcript.is_empty() {
            return Err(AiError::EmptyTranscript);
        }
        let reply: SummarizeReply = self
            .post("summarize", &SummarizeBody { messages: transcript })
            .await?;
        Ok(reply.summary)
    }

    async fn suggest(&self, request: &SuggestionRequest) -> Result<Vec<Suggestion>, AiError> {
        let reply: SuggestReply = self.post("suggestions", request).await?;
        Ok(reply.suggestions)
    }
}

const EXCERPT_CHARS: usize = 120;

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", cut.trim_end())
}

/// Extractive summaries and templated suggestions.
#[derive(Debug, Default, Clone)]
pub struct OfflineAiProvider;

#[async_trait]
impl AiProvider for OfflineAiProvider {
    async fn summarize(&self, transcript: &[TranscriptLine]) -> Result<String, AiError> {
        let (first, last) = match (transcript.first(), transcript.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => return Err(AiError::EmptyTranscript),
        };
        let mut speakers: Vec<&str> = Vec::new();
        for line in transcript {
            if !speakers.contains(&line.speaker.as_str()) {
                speakers.push(&line.speaker);
            }
        }
        let mut summary = format!(
            "{} message{} between {}. Started with {}: \"{}\"",
            transcript.len(),
            if transcript.len() == 1 { "" } else { "s" },
            speakers.join(", "),
            first.speaker,
            excerpt(&first.content),
        );
        if transcript.len() > 1 {
            summary.push_str(&format!(
                " Latest from {}: \"{}\"",
                last.speaker,
                excerpt(&last.content)
            ));
        }
        Ok(summary)
    }

    async fn suggest(&self, request: &SuggestionRequest) -> Result<Vec<Suggestion>, AiError> {
        let mut out = Vec::new();
        if let Some(prompt) = request.prompt.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            out.push(Suggestion {
                kind: SuggestionKind::Project,
                title: format!("Prototype: {}", excerpt(prompt)),
                description: "Scope a first milestone and invite one collaborator to review it."
                    .to_string(),
                user: None,
                score: None,
            });
        }
        for interest in request.interests.iter().take(3) {
            out.push(Suggestion {
                kind: SuggestionKind::Project,
                title: format!("Start a {} project", interest),
                description: format!(
                    "Find people who share your interest in {} and plan a small shared build.",
                    interest
                ),
                user: None,
                score: None,
            });
        }
        for skill in request.skills.iter().take(3) {
            out.push(Suggestion {
                kind: SuggestionKind::Skill,
                title: format!("Level up in {}", skill),
                description: format!("Pair with a more experienced {} collaborator.", skill),
                user: None,
                score: None,
            });
        }
        if out.is_empty() {
            out.push(Suggestion {
                kind: SuggestionKind::Skill,
                title: "Complete your profile".to_string(),
                description: "Add skills and interests to get tailored suggestions.".to_string(),
                user: None,
                score: None,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(speaker: &str, content: &str) -> TranscriptLine {
        TranscriptLine {
            speaker: speaker.into(),
            content: content.into(),
        }
    }

    #[actix_web::test]
    async fn offline_summary_names_speakers_and_latest_line() {
        let transcript = vec![
            line("Ada", "Can we ship Friday?"),
            line("Grace", "Only if tests pass."),
            line("Ada", "Deal."),
        ];
        let summary = OfflineAiProvider.summarize(&transcript).await.unwrap();
        assert!(summary.starts_with("3 messages between Ada, Grace."));
        assert!(summary.contains("Latest from Ada: \"Deal.\""));
    }

    #[actix_web::test]
    async fn empty_transcript_is_an_error() {
        let err = OfflineAiProvider.summarize(&[]).await.unwrap_err();
        assert!(matches!(err, AiError::EmptyTranscript));
    }

    #[actix_web::test]
    async fn offline_suggestions_follow_the_profile() {
        let req = SuggestionRequest {
            prompt: None,
            skills: vec!["Rust".into()],
            interests: vec!["robotics".into()],
        };
        let out = OfflineAiProvider.suggest(&req).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].title, "Start a robotics project");
        assert_eq!(out[1].kind, SuggestionKind::Skill);
    }

    #[test]
    fn long_text_is_cut() {
        let long = "x".repeat(500);
        assert!(excerpt(&long).ends_with("..."));
        assert_eq!(excerpt("  short "), "short");
    }
}
