use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};

use crate::ai::SuggestionRequest;
use crate::app_state::AppState;
use crate::error::ApiError;
use crate::middleware::current_user;
use crate::models::suggestion::SaveSuggestionRequest;
use crate::models::{new_id, SavedSuggestion, Suggestion, SuggestionKind, User, UserSummary};

const MATCH_LIMIT: usize = 10;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionsResponse {
    pub suggestions: Vec<Suggestion>,
    pub collaborators: Vec<Suggestion>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteSavedQuery {
    pub id: Option<String>,
}

/// Candidates ranked by how many skills and interests they share with `me`.
pub fn rank_collaborators(me: &User, candidates: &[User]) -> Vec<Suggestion> {
    let my_skills: Vec<String> = me.skills.iter().map(|s| s.name.to_lowercase()).collect();
    let my_interests: Vec<String> = me.interests.iter().map(|i| i.to_lowercase()).collect();

    let mut ranked: Vec<(u32, Suggestion)> = candidates
        .iter()
        .filter(|c| c.id != me.id)
        .filter_map(|c| {
            let shared_skills: Vec<&str> = c
                .skills
                .iter()
                .filter(|s| my_skills.contains(&s.name.to_lowercase()))
                .map(|s| s.name.as_str())
                .collect();
            let shared_interests: Vec<&str> = c
                .interests
                .iter()
                .filter(|i| my_interests.contains(&i.to_lowercase()))
                .map(String::as_str)
                .collect();
            let score = (shared_skills.len() + shared_interests.len()) as u32;
            if score == 0 {
                return None;
            }
            let shared: Vec<&str> = shared_skills.into_iter().chain(shared_interests).collect();
            Some((
                score,
                Suggestion {
                    kind: SuggestionKind::Collaborator,
                    title: c.name.clone(),
                    description: format!("Shares {}", shared.join(", ")),
                    user: Some(UserSummary::from(c)),
                    score: Some(score),
                },
            ))
        })
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.title.cmp(&b.1.title)));
    ranked.into_iter().map(|(_, s)| s).collect()
}

/// GET /api/suggestions/ai
pub async fn ai_suggestions(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let me = data
        .store
        .find_user(&caller.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    let skills: Vec<String> = me.skills.iter().map(|s| s.name.clone()).collect();
    let request = SuggestionRequest {
        prompt: None,
        skills: skills.clone(),
        interests: me.interests.clone(),
    };
    let suggestions = data.ai.suggest(&request).await?;

    let candidates = data
        .store
        .users_sharing(&me.interests, &skills, &me.id)
        .await?;
    let mut collaborators = rank_collaborators(&me, &candidates);
    collaborators.truncate(MATCH_LIMIT);

    Ok(HttpResponse::Ok().json(SuggestionsResponse {
        suggestions,
        collaborators,
    }))
}

/// GET /api/suggestions/saved
pub async fn list_saved(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let saved = data.store.saved_suggestions(&caller.id).await?;
    Ok(HttpResponse::Ok().json(saved))
}

/// POST /api/suggestions/save
pub async fn save_suggestion(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<SaveSuggestionRequest>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let payload = payload.into_inner();
    let title = payload.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::Validation("Suggestion title is required".into()));
    }

    let saved = SavedSuggestion {
        id: new_id(),
        user: caller.id.clone(),
        kind: payload.kind,
        title,
        description: payload.description,
        created_at: Utc::now(),
    };
    data.store.insert_suggestion(&saved).await?;
    info!("Suggestion {} saved by {}", saved.id, caller.id);
    Ok(HttpResponse::Created().json(saved))
}

/// DELETE /api/suggestions/saved?id=
/// Removes one saved suggestion, or all of them when `id` is absent.
pub async fn delete_saved(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<DeleteSavedQuery>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let deleted = match query.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => {
            if !data.store.delete_suggestion(&caller.id, id).await? {
                return Err(ApiError::not_found("Suggestion"));
            }
            1
        }
        None => data.store.clear_suggestions(&caller.id).await?,
    };
    info!("{} saved suggestions removed for {}", deleted, caller.id);
    Ok(HttpResponse::Ok().json(serde_json::json!({ "deleted": deleted })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, Skill, SkillLevel};

    fn user(id: &str, skills: &[&str], interests: &[&str]) -> User {
        let now = Utc::now();
        User {
            id: id.into(),
            name: id.to_uppercase(),
            email: format!("{}@x.io", id),
            password_hash: String::new(),
            role: Role::User,
            active: true,
            skills: skills
                .iter()
                .map(|s| Skill {
                    name: s.to_string(),
                    level: SkillLevel::Intermediate,
                    verified: false,
                })
                .collect(),
            interests: interests.iter().map(|s| s.to_string()).collect(),
            bio: None,
            avatar_url: None,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }

    #[test]
    fn more_overlap_ranks_higher() {
        let me = user("me", &["Rust", "SQL"], &["robotics"]);
        let candidates = vec![
            user("a", &["rust"], &[]),
            user("b", &["Rust", "SQL"], &["Robotics"]),
            user("c", &["Go"], &["music"]),
        ];
        let ranked = rank_collaborators(&me, &candidates);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].title, "B");
        assert_eq!(ranked[0].score, Some(3));
        assert_eq!(ranked[1].title, "A");
    }
}
