use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::stream::TryStreamExt;
use log::info;
use mongodb::bson::{doc, to_bson, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Cursor, Database, IndexModel};
use serde::de::DeserializeOwned;

use super::{Store, StoreError, StoreResult};
use crate::models::collaboration::RequestFilter;
use crate::models::event::EventFilter;
use crate::models::message::MessageFilter;
use crate::models::project::{ProjectFilter, ProjectUpdate};
use crate::models::task::{TaskFilter, UpdateTaskRequest};
use crate::models::user::{ProfileUpdate, UserFilter};
use crate::models::{
    CalendarEvent, CollaborationRequest, Collaborator, Conversation, Message, PageRequest,
    Project, Reaction, RequestStatus, Role, SavedSuggestion, SortKey, Task, User,
};

const DUPLICATE_KEY: i32 = 11000;

impl From<mongodb::error::Error> for StoreError {
    fn from(e: mongodb::error::Error) -> Self {
        if let ErrorKind::Write(WriteFailure::WriteError(ref we)) = *e.kind {
            if we.code == DUPLICATE_KEY {
                return StoreError::AlreadyExists;
            }
        }
        StoreError::Backend(e.to_string())
    }
}

impl From<mongodb::bson::ser::Error> for StoreError {
    fn from(e: mongodb::bson::ser::Error) -> Self {
        StoreError::Backend(format!("serialization: {}", e))
    }
}

pub struct MongoStore {
    pub client: Client,
    pub db: Database,
}

impl MongoStore {
    pub async fn init(uri: &str, db_name: &str) -> StoreResult<Self> {
        let client_options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(client_options)?;
        let db = client.database(db_name);
        let store = MongoStore { client, db };
        store.ensure_indexes().await?;
        info!("Connected to MongoDB database {}", db_name);
        Ok(store)
    }

    async fn ensure_indexes(&self) -> StoreResult<()> {
        let unique = IndexOptions::builder().unique(true).build();
        self.users()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique)
                    .build(),
            )
            .await?;
        self.messages()
            .create_index(IndexModel::builder().keys(doc! { "conversation": 1, "createdAt": 1 }).build())
            .await?;
        self.conversations()
            .create_index(IndexModel::builder().keys(doc! { "participants": 1 }).build())
            .await?;
        Ok(())
    }

    fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }
    fn projects(&self) -> Collection<Project> {
        self.db.collection("projects")
    }
    fn tasks(&self) -> Collection<Task> {
        self.db.collection("tasks")
    }
    fn events(&self) -> Collection<CalendarEvent> {
        self.db.collection("events")
    }
    fn conversations(&self) -> Collection<Conversation> {
        self.db.collection("conversations")
    }
    fn messages(&self) -> Collection<Message> {
        self.db.collection("messages")
    }
    fn requests(&self) -> Collection<CollaborationRequest> {
        self.db.collection("collaboration_requests")
    }
    fn suggestions(&self) -> Collection<SavedSuggestion> {
        self.db.collection("saved_suggestions")
    }
}

async fn collect<T>(cursor: Cursor<T>) -> StoreResult<Vec<T>>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    Ok(cursor.try_collect().await?)
}

fn ci_regex(term: &str) -> Document {
    doc! { "$regex": regex::escape(term), "$options": "i" }
}

fn exact_ci_regex(term: &str) -> Document {
    doc! { "$regex": format!("^{}$", regex::escape(term)), "$options": "i" }
}

fn sort_doc(sort: &SortKey) -> Document {
    let direction = if sort.descending { -1 } else { 1 };
    let mut d = Document::new();
    d.insert(sort.field, direction);
    d.insert("_id", direction);
    d
}

/// Timestamps are stored as RFC 3339 strings whose fraction is 0, 3, 6 or 9
/// digits long. Writing a bound with all nine digits keeps string order in
/// line with time order against any of those widths.
fn range_bound(at: &DateTime<Utc>) -> Bson {
    Bson::String(at.to_rfc3339_opts(SecondsFormat::Nanos, true))
}

fn date_range(
    target: &mut Document,
    after: &Option<DateTime<Utc>>,
    before: &Option<DateTime<Utc>>,
) -> StoreResult<()> {
    let mut range = Document::new();
    if let Some(after) = after {
        range.insert("$gte", range_bound(after));
    }
    if let Some(before) = before {
        range.insert("$lt", range_bound(before));
    }
    if !range.is_empty() {
        target.insert("createdAt", range);
    }
    Ok(())
}

fn user_filter_doc(f: &UserFilter) -> StoreResult<Document> {
    let mut filter = doc! {};
    if let Some(term) = &f.search {
        filter.insert(
            "$or",
            vec![doc! { "name": ci_regex(term) }, doc! { "email": ci_regex(term) }],
        );
    }
    if let Some(role) = f.role {
        filter.insert("role", role.as_str());
    }
    if let Some(active) = f.active {
        filter.insert("active", active);
    }
    date_range(&mut filter, &f.created_after, &f.created_before)?;
    Ok(filter)
}

fn project_filter_doc(f: &ProjectFilter) -> StoreResult<Document> {
    let mut filter = doc! {};
    if let Some(term) = &f.search {
        filter.insert(
            "$or",
            vec![doc! { "title": ci_regex(term) }, doc! { "description": ci_regex(term) }],
        );
    }
    if let Some(status) = f.status {
        filter.insert("status", status.as_str());
    }
    if let Some(category) = &f.category {
        filter.insert("category", category);
    }
    if let Some(owner) = &f.owner {
        filter.insert("owner", owner);
    }
    date_range(&mut filter, &f.created_after, &None)?;
    Ok(filter)
}

fn message_filter_doc(f: &MessageFilter) -> StoreResult<Document> {
    let mut filter = doc! {};
    if let Some(term) = &f.search {
        filter.insert(
            "$or",
            vec![doc! { "content": ci_regex(term) }, doc! { "subject": ci_regex(term) }],
        );
    }
    if let Some(flagged) = f.flagged {
        filter.insert("flagged", flagged);
    }
    date_range(&mut filter, &f.created_after, &f.created_before)?;
    Ok(filter)
}

fn request_filter_doc(f: &RequestFilter) -> Document {
    let mut filter = doc! {};
    if let Some(status) = f.status {
        filter.insert("status", status.as_str());
    }
    filter
}

#[async_trait]
impl Store for MongoStore {
    // ─── users ───────────────────────────────────────────────────────────────

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.users().insert_one(user).await?;
        Ok(())
    }

    async fn find_user(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(self.users().find_one(doc! { "_id": id }).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users()
            .find_one(doc! { "email": email.to_lowercase() })
            .await?)
    }

    async fn find_users(&self, ids: &[String]) -> StoreResult<Vec<User>> {
        let cursor = self.users().find(doc! { "_id": { "$in": ids.to_vec() } }).await?;
        collect(cursor).await
    }

    async fn update_profile(&self, id: &str, update: &ProfileUpdate) -> StoreResult<Option<User>> {
        let mut set_doc = doc! { "updatedAt": to_bson(&Utc::now())? };
        if let Some(name) = &update.name {
            set_doc.insert("name", name.trim());
        }
        if let Some(bio) = &update.bio {
            set_doc.insert("bio", bio);
        }
        if let Some(skills) = &update.skills {
            set_doc.insert("skills", to_bson(skills)?);
        }
        if let Some(interests) = &update.interests {
            set_doc.insert("interests", interests.clone());
        }
        Ok(self
            .users()
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set_doc })
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn set_avatar(&self, id: &str, url: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users()
            .find_one_and_update(
                doc! { "_id": id },
                doc! { "$set": { "avatarUrl": url, "updatedAt": to_bson(&Utc::now())? } },
            )
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn record_login(&self, id: &str, at: DateTime<Utc>) -> StoreResult<()> {
        self.users()
            .update_one(doc! { "_id": id }, doc! { "$set": { "lastLoginAt": to_bson(&at)? } })
            .await?;
        Ok(())
    }

    async fn search_users(&self, term: &str, exclude: &str, limit: u64) -> StoreResult<Vec<User>> {
        let filter = doc! {
            "_id": { "$ne": exclude },
            "$or": [
                { "name": ci_regex(term) },
                { "email": ci_regex(term) },
                { "skills.name": ci_regex(term) },
                { "interests": ci_regex(term) },
            ]
        };
        let cursor = self
            .users()
            .find(filter)
            .sort(doc! { "name": 1 })
            .limit(limit as i64)
            .await?;
        collect(cursor).await
    }

    async fn users_sharing(
        &self,
        interests: &[String],
        skills: &[String],
        exclude: &str,
    ) -> StoreResult<Vec<User>> {
        let any_of: Vec<Document> = interests
            .iter()
            .map(|i| doc! { "interests": exact_ci_regex(i) })
            .chain(skills.iter().map(|s| doc! { "skills.name": exact_ci_regex(s) }))
            .collect();
        if any_of.is_empty() {
            return Ok(Vec::new());
        }
        let filter = doc! {
            "_id": { "$ne": exclude },
            "active": true,
            "$or": any_of,
        };
        let cursor = self.users().find(filter).await?;
        collect(cursor).await
    }

    async fn list_users(&self, filter: &UserFilter, page: &PageRequest) -> StoreResult<(Vec<User>, u64)> {
        let filter = user_filter_doc(filter)?;
        let total = self.users().count_documents(filter.clone()).await?;
        let cursor = self
            .users()
            .find(filter)
            .sort(sort_doc(&page.sort))
            .skip(page.skip())
            .limit(page.limit as i64)
            .await?;
        Ok((collect(cursor).await?, total))
    }

    async fn count_users(&self, filter: &UserFilter) -> StoreResult<u64> {
        Ok(self.users().count_documents(user_filter_doc(filter)?).await?)
    }

    async fn set_user_active(&self, id: &str, active: bool) -> StoreResult<bool> {
        let res = self
            .users()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "active": active, "updatedAt": to_bson(&Utc::now())? } },
            )
            .await?;
        Ok(res.matched_count == 1)
    }

    async fn deactivate_user(&self, id: &str) -> StoreResult<bool> {
        let before = self
            .users()
            .find_one_and_update(
                doc! { "_id": id },
                doc! { "$set": { "active": false, "updatedAt": to_bson(&Utc::now())? } },
            )
            .return_document(ReturnDocument::Before)
            .await?;
        let Some(before) = before else {
            return Ok(false);
        };
        if before.is_active_admin() {
            // Concurrent deactivations can both land; whoever then sees no
            // active admin left puts their target back.
            let remaining = self
                .users()
                .count_documents(user_filter_doc(&UserFilter {
                    role: Some(Role::Admin),
                    active: Some(true),
                    ..Default::default()
                })?)
                .await?;
            if remaining == 0 {
                self.users()
                    .update_one(doc! { "_id": id }, doc! { "$set": { "active": true } })
                    .await?;
                return Err(StoreError::Conflict);
            }
        }
        Ok(true)
    }

    async fn delete_user(&self, id: &str) -> StoreResult<bool> {
        let res = self.users().delete_one(doc! { "_id": id }).await?;
        Ok(res.deleted_count == 1)
    }

    // ─── projects ────────────────────────────────────────────────────────────

    async fn insert_project(&self, project: &Project) -> StoreResult<()> {
        self.projects().insert_one(project).await?;
        Ok(())
    }

    async fn find_project(&self, id: &str) -> StoreResult<Option<Project>> {
        Ok(self.projects().find_one(doc! { "_id": id }).await?)
    }

    async fn find_projects(&self, ids: &[String]) -> StoreResult<Vec<Project>> {
        let cursor = self.projects().find(doc! { "_id": { "$in": ids.to_vec() } }).await?;
        collect(cursor).await
    }

    async fn projects_for_member(&self, user_id: &str) -> StoreResult<Vec<Project>> {
        let filter = doc! {
            "$or": [ { "owner": user_id }, { "collaborators.user": user_id } ]
        };
        let cursor = self
            .projects()
            .find(filter)
            .sort(doc! { "updatedAt": -1 })
            .await?;
        collect(cursor).await
    }

    async fn update_project(&self, id: &str, update: &ProjectUpdate) -> StoreResult<Option<Project>> {
        let mut set_doc = doc! { "updatedAt": to_bson(&Utc::now())? };
        if let Some(title) = &update.title {
            set_doc.insert("title", title.trim());
        }
        if let Some(desc) = &update.description {
            set_doc.insert("description", desc);
        }
        if let Some(category) = &update.category {
            set_doc.insert("category", category);
        }
        if let Some(status) = update.status {
            set_doc.insert("status", status.as_str());
        }
        Ok(self
            .projects()
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set_doc })
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn upsert_collaborator(&self, project_id: &str, collaborator: &Collaborator) -> StoreResult<bool> {
        let now = to_bson(&Utc::now())?;
        let res = self
            .projects()
            .update_one(
                doc! { "_id": project_id, "collaborators.user": &collaborator.user },
                doc! { "$set": { "collaborators.$.role": collaborator.role.as_str(), "updatedAt": now.clone() } },
            )
            .await?;
        if res.matched_count == 1 {
            return Ok(true);
        }
        let res = self
            .projects()
            .update_one(
                doc! { "_id": project_id },
                doc! {
                    "$push": { "collaborators": to_bson(collaborator)? },
                    "$set": { "updatedAt": now },
                },
            )
            .await?;
        Ok(res.matched_count == 1)
    }

    async fn remove_user_from_projects(&self, user_id: &str) -> StoreResult<u64> {
        let res = self
            .projects()
            .update_many(
                doc! { "collaborators.user": user_id },
                doc! { "$pull": { "collaborators": { "user": user_id } } },
            )
            .await?;
        Ok(res.modified_count)
    }

    async fn delete_project(&self, id: &str) -> StoreResult<bool> {
        let res = self.projects().delete_one(doc! { "_id": id }).await?;
        Ok(res.deleted_count == 1)
    }

    async fn list_projects(&self, filter: &ProjectFilter, page: &PageRequest) -> StoreResult<(Vec<Project>, u64)> {
        let filter = project_filter_doc(filter)?;
        let total = self.projects().count_documents(filter.clone()).await?;
        let cursor = self
            .projects()
            .find(filter)
            .sort(sort_doc(&page.sort))
            .skip(page.skip())
            .limit(page.limit as i64)
            .await?;
        Ok((collect(cursor).await?, total))
    }

    async fn count_projects(&self, filter: &ProjectFilter) -> StoreResult<u64> {
        Ok(self
            .projects()
            .count_documents(project_filter_doc(filter)?)
            .await?)
    }

    async fn project_categories(&self) -> StoreResult<Vec<String>> {
        let values = self
            .projects()
            .distinct("category", doc! { "category": { "$ne": Bson::Null } })
            .await?;
        let mut categories: Vec<String> = values
            .into_iter()
            .filter_map(|b| b.as_str().map(str::to_string))
            .collect();
        categories.sort();
        Ok(categories)
    }

    // ─── tasks ───────────────────────────────────────────────────────────────

    async fn insert_task(&self, task: &Task) -> StoreResult<()> {
        self.tasks().insert_one(task).await?;
        Ok(())
    }

    async fn find_task(&self, id: &str) -> StoreResult<Option<Task>> {
        Ok(self.tasks().find_one(doc! { "_id": id }).await?)
    }

    async fn find_tasks(&self, filter: &TaskFilter) -> StoreResult<Vec<Task>> {
        let mut query = doc! {};
        if let Some(project) = &filter.project {
            query.insert("project", project);
        }
        if let Some(assignee) = &filter.assigned_to {
            query.insert("assignedTo", assignee);
        }
        let cursor = self
            .tasks()
            .find(query)
            .sort(doc! { "createdAt": -1 })
            .await?;
        collect(cursor).await
    }

    async fn update_task(&self, id: &str, update: &UpdateTaskRequest) -> StoreResult<Option<Task>> {
        let mut set_doc = doc! {};
        if let Some(title) = &update.title {
            set_doc.insert("title", title.trim());
        }
        if let Some(desc) = &update.description {
            set_doc.insert("description", desc);
        }
        if let Some(due) = &update.due_date {
            set_doc.insert("dueDate", to_bson(due)?);
        }
        if let Some(project) = &update.project {
            set_doc.insert("project", project);
        }
        if let Some(assignee) = &update.assigned_to {
            set_doc.insert("assignedTo", assignee);
        }
        if let Some(completed) = update.completed {
            set_doc.insert("completed", completed);
        }
        set_doc.insert("updatedAt", to_bson(&Utc::now())?);
        Ok(self
            .tasks()
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set_doc })
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn delete_task(&self, id: &str) -> StoreResult<bool> {
        let res = self.tasks().delete_one(doc! { "_id": id }).await?;
        Ok(res.deleted_count == 1)
    }

    async fn delete_project_tasks(&self, project_id: &str) -> StoreResult<u64> {
        let res = self.tasks().delete_many(doc! { "project": project_id }).await?;
        Ok(res.deleted_count)
    }

    // ─── calendar events ─────────────────────────────────────────────────────

    async fn insert_event(&self, event: &CalendarEvent) -> StoreResult<()> {
        self.events().insert_one(event).await?;
        Ok(())
    }

    async fn find_event(&self, id: &str) -> StoreResult<Option<CalendarEvent>> {
        Ok(self.events().find_one(doc! { "_id": id }).await?)
    }

    async fn find_events(&self, filter: &EventFilter) -> StoreResult<Vec<CalendarEvent>> {
        let mut query = doc! {};
        if let Some(project) = &filter.project {
            query.insert("project", project);
        }
        if let Some(creator) = &filter.created_by {
            query.insert("createdBy", creator);
        }
        let cursor = self.events().find(query).sort(doc! { "start": 1 }).await?;
        collect(cursor).await
    }

    async fn delete_event(&self, id: &str) -> StoreResult<bool> {
        let res = self.events().delete_one(doc! { "_id": id }).await?;
        Ok(res.deleted_count == 1)
    }

    async fn delete_project_events(&self, project_id: &str) -> StoreResult<u64> {
        let res = self.events().delete_many(doc! { "project": project_id }).await?;
        Ok(res.deleted_count)
    }

    // ─── conversations ───────────────────────────────────────────────────────

    async fn insert_conversation(&self, conversation: &Conversation) -> StoreResult<()> {
        self.conversations().insert_one(conversation).await?;
        Ok(())
    }

    async fn find_conversation(&self, id: &str) -> StoreResult<Option<Conversation>> {
        Ok(self.conversations().find_one(doc! { "_id": id }).await?)
    }

    async fn find_conversation_with(&self, participants: &[String]) -> StoreResult<Option<Conversation>> {
        Ok(self
            .conversations()
            .find_one(doc! { "participants": participants.to_vec() })
            .await?)
    }

    async fn conversations_for_user(&self, user_id: &str) -> StoreResult<Vec<Conversation>> {
        let cursor = self
            .conversations()
            .find(doc! { "participants": user_id })
            .sort(doc! { "updatedAt": -1 })
            .await?;
        collect(cursor).await
    }

    async fn touch_conversation(&self, id: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        let at = to_bson(&at)?;
        let res = self
            .conversations()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": {
                    "updatedAt": at.clone(),
                    "lastMessageAt": at,
                    "aiSummaryNeedsUpdate": true,
                } },
            )
            .await?;
        Ok(res.matched_count == 1)
    }

    async fn set_conversation_summary(
        &self,
        id: &str,
        summary: &str,
        at: DateTime<Utc>,
        seen_last_message: Option<DateTime<Utc>>,
    ) -> StoreResult<Option<Conversation>> {
        Ok(self
            .conversations()
            .find_one_and_update(
                doc! { "_id": id, "lastMessageAt": to_bson(&seen_last_message)? },
                doc! { "$set": {
                    "aiSummary": summary,
                    "aiSummaryGeneratedAt": to_bson(&at)?,
                    "aiSummaryNeedsUpdate": false,
                } },
            )
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn delete_conversation(&self, id: &str) -> StoreResult<bool> {
        let res = self.conversations().delete_one(doc! { "_id": id }).await?;
        Ok(res.deleted_count == 1)
    }

    async fn count_conversations(&self) -> StoreResult<u64> {
        Ok(self.conversations().count_documents(doc! {}).await?)
    }

    // ─── messages ────────────────────────────────────────────────────────────

    async fn insert_message(&self, message: &Message) -> StoreResult<()> {
        self.messages().insert_one(message).await?;
        Ok(())
    }

    async fn find_message(&self, id: &str) -> StoreResult<Option<Message>> {
        Ok(self.messages().find_one(doc! { "_id": id }).await?)
    }

    async fn conversation_messages(&self, conversation_id: &str) -> StoreResult<Vec<Message>> {
        let cursor = self
            .messages()
            .find(doc! { "conversation": conversation_id })
            .sort(doc! { "createdAt": 1 })
            .await?;
        collect(cursor).await
    }

    async fn messages_for_user(&self, user_id: &str) -> StoreResult<Vec<Message>> {
        let cursor = self
            .messages()
            .find(doc! { "$or": [ { "sender": user_id }, { "recipient": user_id } ] })
            .sort(doc! { "createdAt": -1 })
            .await?;
        collect(cursor).await
    }

    async fn mark_read(&self, ids: &[String], user_id: &str) -> StoreResult<u64> {
        let res = self
            .messages()
            .update_many(
                doc! { "_id": { "$in": ids.to_vec() }, "sender": { "$ne": user_id } },
                doc! { "$addToSet": { "readBy": user_id } },
            )
            .await?;
        Ok(res.modified_count)
    }

    async fn count_unread(&self, conversation_ids: &[String], user_id: &str) -> StoreResult<u64> {
        if conversation_ids.is_empty() {
            return Ok(0);
        }
        Ok(self
            .messages()
            .count_documents(doc! {
                "conversation": { "$in": conversation_ids.to_vec() },
                "sender": { "$ne": user_id },
                "readBy": { "$ne": user_id },
            })
            .await?)
    }

    async fn add_reaction(&self, id: &str, reaction: &Reaction) -> StoreResult<Option<Message>> {
        let updated = self
            .messages()
            .find_one_and_update(
                doc! {
                    "_id": id,
                    "reactions": { "$not": { "$elemMatch": {
                        "user": &reaction.user,
                        "emoji": &reaction.emoji,
                    } } },
                },
                doc! { "$push": { "reactions": to_bson(reaction)? } },
            )
            .return_document(ReturnDocument::After)
            .await?;
        match updated {
            Some(message) => Ok(Some(message)),
            // Either gone or the reaction is already there.
            None => self.find_message(id).await,
        }
    }

    async fn delete_conversation_messages(&self, conversation_id: &str) -> StoreResult<u64> {
        let res = self
            .messages()
            .delete_many(doc! { "conversation": conversation_id })
            .await?;
        Ok(res.deleted_count)
    }

    async fn list_messages(&self, filter: &MessageFilter, page: &PageRequest) -> StoreResult<(Vec<Message>, u64)> {
        let filter = message_filter_doc(filter)?;
        let total = self.messages().count_documents(filter.clone()).await?;
        let cursor = self
            .messages()
            .find(filter)
            .sort(sort_doc(&page.sort))
            .skip(page.skip())
            .limit(page.limit as i64)
            .await?;
        Ok((collect(cursor).await?, total))
    }

    async fn count_messages(&self, filter: &MessageFilter) -> StoreResult<u64> {
        Ok(self
            .messages()
            .count_documents(message_filter_doc(filter)?)
            .await?)
    }

    async fn set_message_flag(&self, id: &str, flagged: bool) -> StoreResult<bool> {
        let res = self
            .messages()
            .update_one(doc! { "_id": id }, doc! { "$set": { "flagged": flagged } })
            .await?;
        Ok(res.matched_count == 1)
    }

    async fn delete_message(&self, id: &str) -> StoreResult<bool> {
        let res = self.messages().delete_one(doc! { "_id": id }).await?;
        Ok(res.deleted_count == 1)
    }

    // ─── collaboration requests ──────────────────────────────────────────────

    async fn insert_request(&self, request: &CollaborationRequest) -> StoreResult<()> {
        self.requests().insert_one(request).await?;
        Ok(())
    }

    async fn find_request(&self, id: &str) -> StoreResult<Option<CollaborationRequest>> {
        Ok(self.requests().find_one(doc! { "_id": id }).await?)
    }

    async fn find_pending_request(
        &self,
        sender: &str,
        receiver: &str,
        project: &str,
    ) -> StoreResult<Option<CollaborationRequest>> {
        Ok(self
            .requests()
            .find_one(doc! {
                "sender": sender,
                "receiver": receiver,
                "project": project,
                "status": RequestStatus::Pending.as_str(),
            })
            .await?)
    }

    async fn requests_for_user(&self, user_id: &str) -> StoreResult<Vec<CollaborationRequest>> {
        let cursor = self
            .requests()
            .find(doc! { "$or": [ { "sender": user_id }, { "receiver": user_id } ] })
            .sort(doc! { "createdAt": -1 })
            .await?;
        collect(cursor).await
    }

    async fn transition_request(
        &self,
        id: &str,
        from: RequestStatus,
        to: RequestStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<CollaborationRequest>> {
        let responded_at = if to == RequestStatus::Pending {
            Bson::Null
        } else {
            to_bson(&at)?
        };
        Ok(self
            .requests()
            .find_one_and_update(
                doc! { "_id": id, "status": from.as_str() },
                doc! { "$set": {
                    "status": to.as_str(),
                    "updatedAt": to_bson(&at)?,
                    "respondedAt": responded_at,
                } },
            )
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn list_requests(
        &self,
        filter: &RequestFilter,
        page: &PageRequest,
    ) -> StoreResult<(Vec<CollaborationRequest>, u64)> {
        let filter = request_filter_doc(filter);
        let total = self.requests().count_documents(filter.clone()).await?;
        let cursor = self
            .requests()
            .find(filter)
            .sort(sort_doc(&page.sort))
            .skip(page.skip())
            .limit(page.limit as i64)
            .await?;
        Ok((collect(cursor).await?, total))
    }

    async fn count_requests(&self, filter: &RequestFilter) -> StoreResult<u64> {
        Ok(self
            .requests()
            .count_documents(request_filter_doc(filter))
            .await?)
    }

    async fn delete_project_requests(&self, project_id: &str) -> StoreResult<u64> {
        let res = self
            .requests()
            .delete_many(doc! { "project": project_id })
            .await?;
        Ok(res.deleted_count)
    }

    async fn delete_user_requests(&self, user_id: &str) -> StoreResult<u64> {
        let res = self
            .requests()
            .delete_many(doc! { "$or": [ { "sender": user_id }, { "receiver": user_id } ] })
            .await?;
        Ok(res.deleted_count)
    }

    // ─── saved suggestions ───────────────────────────────────────────────────

    async fn insert_suggestion(&self, suggestion: &SavedSuggestion) -> StoreResult<()> {
        self.suggestions().insert_one(suggestion).await?;
        Ok(())
    }

    async fn saved_suggestions(&self, user_id: &str) -> StoreResult<Vec<SavedSuggestion>> {
        let cursor = self
            .suggestions()
            .find(doc! { "user": user_id })
            .sort(doc! { "createdAt": -1 })
            .await?;
        collect(cursor).await
    }

    async fn delete_suggestion(&self, user_id: &str, id: &str) -> StoreResult<bool> {
        let res = self
            .suggestions()
            .delete_one(doc! { "_id": id, "user": user_id })
            .await?;
        Ok(res.deleted_count == 1)
    }

    async fn clear_suggestions(&self, user_id: &str) -> StoreResult<u64> {
        let res = self.suggestions().delete_many(doc! { "user": user_id }).await?;
        Ok(res.deleted_count)
    }
}
