//! In-process store. Same semantics as the Mongo backend, no server needed.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::{Store, StoreError, StoreResult};
use crate::models::collaboration::RequestFilter;
use crate::models::event::EventFilter;
use crate::models::message::MessageFilter;
use crate::models::project::{ProjectFilter, ProjectUpdate};
use crate::models::task::{TaskFilter, UpdateTaskRequest};
use crate::models::user::{ProfileUpdate, UserFilter};
use crate::models::{
    CalendarEvent, CollaborationRequest, Collaborator, Conversation, Message, PageRequest,
    Project, Reaction, RequestStatus, SavedSuggestion, SortKey, Task, User,
};

#[derive(Default)]
struct Collections {
    users: HashMap<String, User>,
    projects: HashMap<String, Project>,
    tasks: HashMap<String, Task>,
    events: HashMap<String, CalendarEvent>,
    conversations: HashMap<String, Conversation>,
    messages: HashMap<String, Message>,
    requests: HashMap<String, CollaborationRequest>,
    suggestions: HashMap<String, SavedSuggestion>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn in_range(at: &DateTime<Utc>, after: &Option<DateTime<Utc>>, before: &Option<DateTime<Utc>>) -> bool {
    after.map_or(true, |a| *at >= a) && before.map_or(true, |b| *at < b)
}

fn paginate<T: Clone>(mut items: Vec<T>, page: &PageRequest, cmp: impl Fn(&T, &T) -> Ordering) -> (Vec<T>, u64) {
    items.sort_by(|a, b| {
        let ord = cmp(a, b);
        if page.sort.descending {
            ord.reverse()
        } else {
            ord
        }
    });
    let total = items.len() as u64;
    let page_items = items
        .into_iter()
        .skip(page.skip() as usize)
        .take(page.limit as usize)
        .collect();
    (page_items, total)
}

fn user_matches(u: &User, f: &UserFilter) -> bool {
    f.search
        .as_deref()
        .map_or(true, |t| contains_ci(&u.name, t) || contains_ci(&u.email, t))
        && f.role.map_or(true, |r| u.role == r)
        && f.active.map_or(true, |a| u.active == a)
        && in_range(&u.created_at, &f.created_after, &f.created_before)
}

fn project_matches(p: &Project, f: &ProjectFilter) -> bool {
    f.search
        .as_deref()
        .map_or(true, |t| contains_ci(&p.title, t) || contains_ci(&p.description, t))
        && f.status.map_or(true, |s| p.status == s)
        && f.category
            .as_deref()
            .map_or(true, |c| p.category.as_deref() == Some(c))
        && f.owner.as_deref().map_or(true, |o| p.owner == o)
        && in_range(&p.created_at, &f.created_after, &None)
}

fn message_matches(m: &Message, f: &MessageFilter) -> bool {
    f.search.as_deref().map_or(true, |t| {
        contains_ci(&m.content, t) || m.subject.as_deref().is_some_and(|s| contains_ci(s, t))
    }) && f.flagged.map_or(true, |fl| m.flagged == fl)
        && in_range(&m.created_at, &f.created_after, &f.created_before)
}

fn user_order(sort: &SortKey) -> impl Fn(&User, &User) -> Ordering {
    let field = sort.field;
    move |a, b| {
        let ord = match field {
            "name" => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            "email" => a.email.cmp(&b.email),
            "role" => a.role.as_str().cmp(b.role.as_str()),
            "lastLoginAt" => a.last_login_at.cmp(&b.last_login_at),
            _ => a.created_at.cmp(&b.created_at),
        };
        ord.then_with(|| a.id.cmp(&b.id))
    }
}

fn project_order(sort: &SortKey) -> impl Fn(&Project, &Project) -> Ordering {
    let field = sort.field;
    move |a, b| {
        let ord = match field {
            "title" => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            "status" => a.status.as_str().cmp(b.status.as_str()),
            "category" => a.category.cmp(&b.category),
            "updatedAt" => a.updated_at.cmp(&b.updated_at),
            _ => a.created_at.cmp(&b.created_at),
        };
        ord.then_with(|| a.id.cmp(&b.id))
    }
}

#[async_trait]
impl Store for MemoryStore {
    // ─── users ───────────────────────────────────────────────────────────────

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::AlreadyExists);
        }
        inner.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_user(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(self.inner.read().users.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.to_lowercase();
        Ok(self
            .inner
            .read()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_users(&self, ids: &[String]) -> StoreResult<Vec<User>> {
        let inner = self.inner.read();
        Ok(ids.iter().filter_map(|id| inner.users.get(id).cloned()).collect())
    }

    async fn update_profile(&self, id: &str, update: &ProfileUpdate) -> StoreResult<Option<User>> {
        let mut inner = self.inner.write();
        let Some(user) = inner.users.get_mut(id) else {
            return Ok(None);
        };
        if let Some(name) = &update.name {
            user.name = name.trim().to_string();
        }
        if let Some(bio) = &update.bio {
            user.bio = Some(bio.clone());
        }
        if let Some(skills) = &update.skills {
            user.skills = skills.clone();
        }
        if let Some(interests) = &update.interests {
            user.interests = interests.clone();
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn set_avatar(&self, id: &str, url: &str) -> StoreResult<Option<User>> {
        let mut inner = self.inner.write();
        Ok(inner.users.get_mut(id).map(|u| {
            u.avatar_url = Some(url.to_string());
            u.updated_at = Utc::now();
            u.clone()
        }))
    }

    async fn record_login(&self, id: &str, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some(u) = self.inner.write().users.get_mut(id) {
            u.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn search_users(&self, term: &str, exclude: &str, limit: u64) -> StoreResult<Vec<User>> {
        let inner = self.inner.read();
        let mut found: Vec<User> = inner
            .users
            .values()
            .filter(|u| u.id != exclude)
            .filter(|u| {
                contains_ci(&u.name, term)
                    || contains_ci(&u.email, term)
                    || u.skills.iter().any(|s| contains_ci(&s.name, term))
                    || u.interests.iter().any(|i| contains_ci(i, term))
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found.truncate(limit as usize);
        Ok(found)
    }

    async fn users_sharing(
        &self,
        interests: &[String],
        skills: &[String],
        exclude: &str,
    ) -> StoreResult<Vec<User>> {
        let interests: Vec<String> = interests.iter().map(|i| i.to_lowercase()).collect();
        let skills: Vec<String> = skills.iter().map(|s| s.to_lowercase()).collect();
        let inner = self.inner.read();
        Ok(inner
            .users
            .values()
            .filter(|u| u.id != exclude && u.active)
            .filter(|u| {
                u.interests.iter().any(|i| interests.contains(&i.to_lowercase()))
                    || u.skills.iter().any(|s| skills.contains(&s.name.to_lowercase()))
            })
            .cloned()
            .collect())
    }

    async fn list_users(&self, filter: &UserFilter, page: &PageRequest) -> StoreResult<(Vec<User>, u64)> {
        let items: Vec<User> = self
            .inner
            .read()
            .users
            .values()
            .filter(|u| user_matches(u, filter))
            .cloned()
            .collect();
        Ok(paginate(items, page, user_order(&page.sort)))
    }

    async fn count_users(&self, filter: &UserFilter) -> StoreResult<u64> {
        Ok(self
            .inner
            .read()
            .users
            .values()
            .filter(|u| user_matches(u, filter))
            .count() as u64)
    }

    async fn set_user_active(&self, id: &str, active: bool) -> StoreResult<bool> {
        let mut inner = self.inner.write();
        Ok(inner
            .users
            .get_mut(id)
            .map(|u| {
                u.active = active;
                u.updated_at = Utc::now();
            })
            .is_some())
    }

    async fn deactivate_user(&self, id: &str) -> StoreResult<bool> {
        let mut inner = self.inner.write();
        let target_is_admin = match inner.users.get(id) {
            Some(u) => u.is_active_admin(),
            None => return Ok(false),
        };
        if target_is_admin && inner.users.values().filter(|u| u.is_active_admin()).count() <= 1 {
            return Err(StoreError::Conflict);
        }
        if let Some(u) = inner.users.get_mut(id) {
            u.active = false;
            u.updated_at = Utc::now();
        }
        Ok(true)
    }

    async fn delete_user(&self, id: &str) -> StoreResult<bool> {
        Ok(self.inner.write().users.remove(id).is_some())
    }

    // ─── projects ────────────────────────────────────────────────────────────

    async fn insert_project(&self, project: &Project) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if inner.projects.contains_key(&project.id) {
            return Err(StoreError::AlreadyExists);
        }
        inner.projects.insert(project.id.clone(), project.clone());
        Ok(())
    }

    async fn find_project(&self, id: &str) -> StoreResult<Option<Project>> {
        Ok(self.inner.read().projects.get(id).cloned())
    }

    async fn find_projects(&self, ids: &[String]) -> StoreResult<Vec<Project>> {
        let inner = self.inner.read();
        Ok(ids
            .iter()
            .filter_map(|id| inner.projects.get(id).cloned())
            .collect())
    }

    async fn projects_for_member(&self, user_id: &str) -> StoreResult<Vec<Project>> {
        let mut found: Vec<Project> = self
            .inner
            .read()
            .projects
            .values()
            .filter(|p| p.is_member(user_id))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn update_project(&self, id: &str, update: &ProjectUpdate) -> StoreResult<Option<Project>> {
        let mut inner = self.inner.write();
        let Some(project) = inner.projects.get_mut(id) else {
            return Ok(None);
        };
        if let Some(title) = &update.title {
            project.title = title.trim().to_string();
        }
        if let Some(desc) = &update.description {
            project.description = desc.clone();
        }
        if let Some(category) = &update.category {
            project.category = Some(category.clone());
        }
        if let Some(status) = update.status {
            project.status = status;
        }
        project.updated_at = Utc::now();
        Ok(Some(project.clone()))
    }

    async fn upsert_collaborator(&self, project_id: &str, collaborator: &Collaborator) -> StoreResult<bool> {
        let mut inner = self.inner.write();
        let Some(project) = inner.projects.get_mut(project_id) else {
            return Ok(false);
        };
        match project
            .collaborators
            .iter_mut()
            .find(|c| c.user == collaborator.user)
        {
            Some(existing) => existing.role = collaborator.role,
            None => project.collaborators.push(collaborator.clone()),
        }
        project.updated_at = Utc::now();
        Ok(true)
    }

    async fn remove_user_from_projects(&self, user_id: &str) -> StoreResult<u64> {
        let mut inner = self.inner.write();
        let mut modified = 0;
        for project in inner.projects.values_mut() {
            let before = project.collaborators.len();
            project.collaborators.retain(|c| c.user != user_id);
            if project.collaborators.len() != before {
                modified += 1;
            }
        }
        Ok(modified)
    }

    async fn delete_project(&self, id: &str) -> StoreResult<bool> {
        Ok(self.inner.write().projects.remove(id).is_some())
    }

    async fn list_projects(&self, filter: &ProjectFilter, page: &PageRequest) -> StoreResult<(Vec<Project>, u64)> {
        let items: Vec<Project> = self
            .inner
            .read()
            .projects
            .values()
            .filter(|p| project_matches(p, filter))
            .cloned()
            .collect();
        Ok(paginate(items, page, project_order(&page.sort)))
    }

    async fn count_projects(&self, filter: &ProjectFilter) -> StoreResult<u64> {
        Ok(self
            .inner
            .read()
            .projects
            .values()
            .filter(|p| project_matches(p, filter))
            .count() as u64)
    }

    async fn project_categories(&self) -> StoreResult<Vec<String>> {
        let mut categories: Vec<String> = self
            .inner
            .read()
            .projects
            .values()
            .filter_map(|p| p.category.clone())
            .collect();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    // ─── tasks ───────────────────────────────────────────────────────────────

    async fn insert_task(&self, task: &Task) -> StoreResult<()> {
        self.inner.write().tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn find_task(&self, id: &str) -> StoreResult<Option<Task>> {
        Ok(self.inner.read().tasks.get(id).cloned())
    }

    async fn find_tasks(&self, filter: &TaskFilter) -> StoreResult<Vec<Task>> {
        let mut found: Vec<Task> = self
            .inner
            .read()
            .tasks
            .values()
            .filter(|t| {
                filter
                    .project
                    .as_deref()
                    .map_or(true, |p| t.project.as_deref() == Some(p))
                    && filter
                        .assigned_to
                        .as_deref()
                        .map_or(true, |a| t.assigned_to == a)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn update_task(&self, id: &str, update: &UpdateTaskRequest) -> StoreResult<Option<Task>> {
        let mut inner = self.inner.write();
        let Some(task) = inner.tasks.get_mut(id) else {
            return Ok(None);
        };
        if let Some(title) = &update.title {
            task.title = title.trim().to_string();
        }
        if let Some(desc) = &update.description {
            task.description = desc.clone();
        }
        if let Some(due) = update.due_date {
            task.due_date = Some(due);
        }
        if let Some(project) = &update.project {
            task.project = Some(project.clone());
        }
        if let Some(assignee) = &update.assigned_to {
            task.assigned_to = assignee.clone();
        }
        if let Some(completed) = update.completed {
            task.completed = completed;
        }
        task.updated_at = Utc::now();
        Ok(Some(task.clone()))
    }

    async fn delete_task(&self, id: &str) -> StoreResult<bool> {
        Ok(self.inner.write().tasks.remove(id).is_some())
    }

    async fn delete_project_tasks(&self, project_id: &str) -> StoreResult<u64> {
        let mut inner = self.inner.write();
        let before = inner.tasks.len();
        inner
            .tasks
            .retain(|_, t| t.project.as_deref() != Some(project_id));
        Ok((before - inner.tasks.len()) as u64)
    }

    // ─── calendar events ─────────────────────────────────────────────────────

    async fn insert_event(&self, event: &CalendarEvent) -> StoreResult<()> {
        self.inner.write().events.insert(event.id.clone(), event.clone());
        Ok(())
    }

    async fn find_event(&self, id: &str) -> StoreResult<Option<CalendarEvent>> {
        Ok(self.inner.read().events.get(id).cloned())
    }

    async fn find_events(&self, filter: &EventFilter) -> StoreResult<Vec<CalendarEvent>> {
        let mut found: Vec<CalendarEvent> = self
            .inner
            .read()
            .events
            .values()
            .filter(|e| {
                filter
                    .project
                    .as_deref()
                    .map_or(true, |p| e.project.as_deref() == Some(p))
                    && filter
                        .created_by
                        .as_deref()
                        .map_or(true, |c| e.created_by == c)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn delete_event(&self, id: &str) -> StoreResult<bool> {
        Ok(self.inner.write().events.remove(id).is_some())
    }

    async fn delete_project_events(&self, project_id: &str) -> StoreResult<u64> {
        let mut inner = self.inner.write();
        let before = inner.events.len();
        inner
            .events
            .retain(|_, e| e.project.as_deref() != Some(project_id));
        Ok((before - inner.events.len()) as u64)
    }

    // ─── conversations ───────────────────────────────────────────────────────

    async fn insert_conversation(&self, conversation: &Conversation) -> StoreResult<()> {
        self.inner
            .write()
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    async fn find_conversation(&self, id: &str) -> StoreResult<Option<Conversation>> {
        Ok(self.inner.read().conversations.get(id).cloned())
    }

    async fn find_conversation_with(&self, participants: &[String]) -> StoreResult<Option<Conversation>> {
        Ok(self
            .inner
            .read()
            .conversations
            .values()
            .find(|c| c.participants == participants)
            .cloned())
    }

    async fn conversations_for_user(&self, user_id: &str) -> StoreResult<Vec<Conversation>> {
        let mut found: Vec<Conversation> = self
            .inner
            .read()
            .conversations
            .values()
            .filter(|c| c.has_participant(user_id))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn touch_conversation(&self, id: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut inner = self.inner.write();
        Ok(inner
            .conversations
            .get_mut(id)
            .map(|c| {
                c.updated_at = at;
                c.last_message_at = Some(at);
                c.ai_summary_needs_update = true;
            })
            .is_some())
    }

    async fn set_conversation_summary(
        &self,
        id: &str,
        summary: &str,
        at: DateTime<Utc>,
        seen_last_message: Option<DateTime<Utc>>,
    ) -> StoreResult<Option<Conversation>> {
        let mut inner = self.inner.write();
        Ok(inner
            .conversations
            .get_mut(id)
            .filter(|c| c.last_message_at == seen_last_message)
            .map(|c| {
                c.ai_summary = Some(summary.to_string());
                c.ai_summary_generated_at = Some(at);
                c.ai_summary_needs_update = false;
                c.clone()
            }))
    }

    async fn delete_conversation(&self, id: &str) -> StoreResult<bool> {
        Ok(self.inner.write().conversations.remove(id).is_some())
    }

    async fn count_conversations(&self) -> StoreResult<u64> {
        Ok(self.inner.read().conversations.len() as u64)
    }

    // ─── messages ────────────────────────────────────────────────────────────

    async fn insert_message(&self, message: &Message) -> StoreResult<()> {
        self.inner
            .write()
            .messages
            .insert(message.id.clone(), message.clone());
        Ok(())
    }

    async fn find_message(&self, id: &str) -> StoreResult<Option<Message>> {
        Ok(self.inner.read().messages.get(id).cloned())
    }

    async fn conversation_messages(&self, conversation_id: &str) -> StoreResult<Vec<Message>> {
        let mut found: Vec<Message> = self
            .inner
            .read()
            .messages
            .values()
            .filter(|m| m.conversation == conversation_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn messages_for_user(&self, user_id: &str) -> StoreResult<Vec<Message>> {
        let mut found: Vec<Message> = self
            .inner
            .read()
            .messages
            .values()
            .filter(|m| m.sender == user_id || m.recipient.as_deref() == Some(user_id))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn mark_read(&self, ids: &[String], user_id: &str) -> StoreResult<u64> {
        let mut inner = self.inner.write();
        let mut modified = 0;
        for id in ids {
            if let Some(m) = inner.messages.get_mut(id) {
                if m.sender != user_id && !m.read_by.iter().any(|u| u == user_id) {
                    m.read_by.push(user_id.to_string());
                    modified += 1;
                }
            }
        }
        Ok(modified)
    }

    async fn count_unread(&self, conversation_ids: &[String], user_id: &str) -> StoreResult<u64> {
        Ok(self
            .inner
            .read()
            .messages
            .values()
            .filter(|m| conversation_ids.contains(&m.conversation) && !m.is_read_by(user_id))
            .count() as u64)
    }

    async fn add_reaction(&self, id: &str, reaction: &Reaction) -> StoreResult<Option<Message>> {
        let mut inner = self.inner.write();
        Ok(inner.messages.get_mut(id).map(|m| {
            if !m.has_reaction(&reaction.user, &reaction.emoji) {
                m.reactions.push(reaction.clone());
            }
            m.clone()
        }))
    }

    async fn delete_conversation_messages(&self, conversation_id: &str) -> StoreResult<u64> {
        let mut inner = self.inner.write();
        let before = inner.messages.len();
        inner.messages.retain(|_, m| m.conversation != conversation_id);
        Ok((before - inner.messages.len()) as u64)
    }

    async fn list_messages(&self, filter: &MessageFilter, page: &PageRequest) -> StoreResult<(Vec<Message>, u64)> {
        let items: Vec<Message> = self
            .inner
            .read()
            .messages
            .values()
            .filter(|m| message_matches(m, filter))
            .cloned()
            .collect();
        Ok(paginate(items, page, |a: &Message, b: &Message| {
            a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
        }))
    }

    async fn count_messages(&self, filter: &MessageFilter) -> StoreResult<u64> {
        Ok(self
            .inner
            .read()
            .messages
            .values()
            .filter(|m| message_matches(m, filter))
            .count() as u64)
    }

    async fn set_message_flag(&self, id: &str, flagged: bool) -> StoreResult<bool> {
        let mut inner = self.inner.write();
        Ok(inner
            .messages
            .get_mut(id)
            .map(|m| m.flagged = flagged)
            .is_some())
    }

    async fn delete_message(&self, id: &str) -> StoreResult<bool> {
        Ok(self.inner.write().messages.remove(id).is_some())
    }

    // ─── collaboration requests ──────────────────────────────────────────────

    async fn insert_request(&self, request: &CollaborationRequest) -> StoreResult<()> {
        self.inner
            .write()
            .requests
            .insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn find_request(&self, id: &str) -> StoreResult<Option<CollaborationRequest>> {
        Ok(self.inner.read().requests.get(id).cloned())
    }

    async fn find_pending_request(
        &self,
        sender: &str,
        receiver: &str,
        project: &str,
    ) -> StoreResult<Option<CollaborationRequest>> {
        Ok(self
            .inner
            .read()
            .requests
            .values()
            .find(|r| {
                r.sender == sender
                    && r.receiver == receiver
                    && r.project == project
                    && r.status == RequestStatus::Pending
            })
            .cloned())
    }

    async fn requests_for_user(&self, user_id: &str) -> StoreResult<Vec<CollaborationRequest>> {
        let mut found: Vec<CollaborationRequest> = self
            .inner
            .read()
            .requests
            .values()
            .filter(|r| r.sender == user_id || r.receiver == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn transition_request(
        &self,
        id: &str,
        from: RequestStatus,
        to: RequestStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<CollaborationRequest>> {
        let mut inner = self.inner.write();
        match inner.requests.get_mut(id) {
            Some(r) if r.status == from => {
                r.status = to;
                r.updated_at = at;
                r.responded_at = if to == RequestStatus::Pending { None } else { Some(at) };
                Ok(Some(r.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_requests(
        &self,
        filter: &RequestFilter,
        page: &PageRequest,
    ) -> StoreResult<(Vec<CollaborationRequest>, u64)> {
        let items: Vec<CollaborationRequest> = self
            .inner
            .read()
            .requests
            .values()
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        Ok(paginate(items, page, |a: &CollaborationRequest, b: &CollaborationRequest| {
            a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
        }))
    }

    async fn count_requests(&self, filter: &RequestFilter) -> StoreResult<u64> {
        Ok(self
            .inner
            .read()
            .requests
            .values()
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .count() as u64)
    }

    async fn delete_project_requests(&self, project_id: &str) -> StoreResult<u64> {
        let mut inner = self.inner.write();
        let before = inner.requests.len();
        inner.requests.retain(|_, r| r.project != project_id);
        Ok((before - inner.requests.len()) as u64)
    }

    async fn delete_user_requests(&self, user_id: &str) -> StoreResult<u64> {
        let mut inner = self.inner.write();
        let before = inner.requests.len();
        inner
            .requests
            .retain(|_, r| r.sender != user_id && r.receiver != user_id);
        Ok((before - inner.requests.len()) as u64)
    }

    // ─── saved suggestions ───────────────────────────────────────────────────

    async fn insert_suggestion(&self, suggestion: &SavedSuggestion) -> StoreResult<()> {
        self.inner
            .write()
            .suggestions
            .insert(suggestion.id.clone(), suggestion.clone());
        Ok(())
    }

    async fn saved_suggestions(&self, user_id: &str) -> StoreResult<Vec<SavedSuggestion>> {
        let mut found: Vec<SavedSuggestion> = self
            .inner
            .read()
            .suggestions
            .values()
            .filter(|s| s.user == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn delete_suggestion(&self, user_id: &str, id: &str) -> StoreResult<bool> {
        let mut inner = self.inner.write();
        match inner.suggestions.get(id) {
            Some(s) if s.user == user_id => {
                inner.suggestions.remove(id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn clear_suggestions(&self, user_id: &str) -> StoreResult<u64> {
        let mut inner = self.inner.write();
        let before = inner.suggestions.len();
        inner.suggestions.retain(|_, s| s.user != user_id);
        Ok((before - inner.suggestions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProjectStatus, Role, Skill};

    fn user(id: &str, email: &str, role: Role) -> User {
        let now = Utc::now();
        User {
            id: id.into(),
            name: id.into(),
            email: email.into(),
            password_hash: String::new(),
            role,
            active: true,
            skills: vec![],
            interests: vec![],
            bio: None,
            avatar_url: None,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }

    fn request(id: &str) -> CollaborationRequest {
        let now = Utc::now();
        CollaborationRequest {
            id: id.into(),
            sender: "a".into(),
            receiver: "b".into(),
            project: "p".into(),
            role: Default::default(),
            message: None,
            status: RequestStatus::Pending,
            created_at: now,
            updated_at: now,
            responded_at: None,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryStore::new();
        store.insert_user(&user("u1", "a@x.io", Role::User)).await.unwrap();
        let err = store
            .insert_user(&user("u2", "a@x.io", Role::User))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists));
    }

    #[tokio::test]
    async fn transition_only_applies_from_the_expected_state() {
        let store = MemoryStore::new();
        store.insert_request(&request("r1")).await.unwrap();
        let now = Utc::now();
        let accepted = store
            .transition_request("r1", RequestStatus::Pending, RequestStatus::Accepted, now)
            .await
            .unwrap();
        assert_eq!(accepted.unwrap().status, RequestStatus::Accepted);
        let again = store
            .transition_request("r1", RequestStatus::Pending, RequestStatus::Rejected, now)
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn list_users_paginates_and_counts_the_full_match() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .insert_user(&user(&format!("u{}", i), &format!("u{}@x.io", i), Role::User))
                .await
                .unwrap();
        }
        let page = PageRequest {
            page: 2,
            limit: 2,
            sort: SortKey {
                field: "email",
                descending: false,
            },
        };
        let (items, total) = store.list_users(&UserFilter::default(), &page).await.unwrap();
        assert_eq!(total, 5);
        let emails: Vec<_> = items.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, vec!["u2@x.io", "u3@x.io"]);
    }

    #[tokio::test]
    async fn shared_interests_and_skills_ignore_case() {
        let store = MemoryStore::new();
        let mut bob = user("bob", "bob@x.io", Role::User);
        bob.interests = vec!["robotics".into()];
        let mut eve = user("eve", "eve@x.io", Role::User);
        eve.skills = vec![Skill {
            name: "RUST".into(),
            level: Default::default(),
            verified: false,
        }];
        let mut idle = user("idle", "idle@x.io", Role::User);
        idle.interests = vec!["Robotics".into()];
        idle.active = false;
        for u in [&bob, &eve, &idle] {
            store.insert_user(u).await.unwrap();
        }

        let mut found: Vec<String> = store
            .users_sharing(&["Robotics".into()], &["rust".into()], "ada")
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        found.sort();
        assert_eq!(found, vec!["bob", "eve"]);
    }

    #[tokio::test]
    async fn summary_is_only_stored_against_the_last_seen_message() {
        let store = MemoryStore::new();
        let start = Utc::now();
        store
            .insert_conversation(&Conversation {
                id: "c".into(),
                participants: vec!["a".into(), "b".into()],
                subject: None,
                ai_summary: None,
                ai_summary_generated_at: None,
                ai_summary_needs_update: false,
                last_message_at: None,
                created_at: start,
                updated_at: start,
            })
            .await
            .unwrap();
        store.touch_conversation("c", start).await.unwrap();
        let seen = store.find_conversation("c").await.unwrap().unwrap().last_message_at;

        let later = start + chrono::Duration::seconds(1);
        store.touch_conversation("c", later).await.unwrap();
        let stored = store
            .set_conversation_summary("c", "old news", later, seen)
            .await
            .unwrap();
        assert!(stored.is_none());
        assert!(store.find_conversation("c").await.unwrap().unwrap().ai_summary_needs_update);

        let stored = store
            .set_conversation_summary("c", "up to date", later, Some(later))
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.ai_summary_needs_update);
        assert_eq!(stored.ai_summary.as_deref(), Some("up to date"));
    }

    #[tokio::test]
    async fn two_admins_cannot_deactivate_each_other() {
        let store = MemoryStore::new();
        store.insert_user(&user("a", "a@x.io", Role::Admin)).await.unwrap();
        store.insert_user(&user("b", "b@x.io", Role::Admin)).await.unwrap();

        let (first, second) = futures::join!(store.deactivate_user("a"), store.deactivate_user("b"));
        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| matches!(r, Ok(true))).count(), 1);
        assert_eq!(
            outcomes.iter().filter(|r| matches!(r, Err(StoreError::Conflict))).count(),
            1
        );
        let admins = UserFilter {
            role: Some(Role::Admin),
            active: Some(true),
            ..Default::default()
        };
        assert_eq!(store.count_users(&admins).await.unwrap(), 1);
        assert!(!store.deactivate_user("ghost").await.unwrap());
    }

    #[tokio::test]
    async fn collaborator_upsert_updates_existing_role() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .insert_project(&Project {
                id: "p".into(),
                title: "P".into(),
                description: String::new(),
                category: None,
                status: ProjectStatus::Active,
                owner: "o".into(),
                collaborators: vec![],
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        let mut c = Collaborator {
            user: "u".into(),
            role: crate::models::ProjectRole::Viewer,
            added_at: now,
        };
        assert!(store.upsert_collaborator("p", &c).await.unwrap());
        c.role = crate::models::ProjectRole::Editor;
        assert!(store.upsert_collaborator("p", &c).await.unwrap());
        let p = store.find_project("p").await.unwrap().unwrap();
        assert_eq!(p.collaborators.len(), 1);
        assert_eq!(p.collaborators[0].role, crate::models::ProjectRole::Editor);
    }
}
