//! Bug operations, including the field-level audit trail.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use validator::Validate;

use crate::domain::{
    AppError, Bug, BugListQuery, BugRepository, BugWithRefs, CreateBugRequest, DatabaseError,
    EntityId, HistoryRepository, HistoryWithActor, NewBug, NewHistoryEntry, Page,
    ProjectRepository, Reference, Resource, UpdateBugRequest, UserRepository,
};

/// Orchestrates bug validation, reference checks, and history writes.
#[derive(Clone)]
pub struct BugService {
    bugs: Arc<dyn BugRepository>,
    projects: Arc<dyn ProjectRepository>,
    users: Arc<dyn UserRepository>,
    history: Arc<dyn HistoryRepository>,
}

impl BugService {
    #[must_use]
    pub fn new(
        bugs: Arc<dyn BugRepository>,
        projects: Arc<dyn ProjectRepository>,
        users: Arc<dyn UserRepository>,
        history: Arc<dyn HistoryRepository>,
    ) -> Self {
        Self {
            bugs,
            projects,
            users,
            history,
        }
    }

    /// Files a bug. Project, reporter, and assignee (when given) must all
    /// exist; a dangling reference reports the entity-specific code.
    ///
    /// # Errors
    ///
    /// `AppError::Validation` for malformed fields, `MissingReference` for
    /// an unknown project/reporter/assignee.
    #[instrument(skip(self, payload), fields(project_id = payload.project_id))]
    pub async fn create(&self, mut payload: CreateBugRequest) -> Result<Bug, AppError> {
        payload.normalize();
        payload.validate().map_err(|err| {
            warn!(error = %err, "invalid create bug request");
            AppError::from(err)
        })?;

        if !self.projects.exists(payload.project_id).await? {
            return Err(AppError::MissingReference(Reference::Project));
        }
        if !self.users.exists(payload.reporter_id).await? {
            return Err(AppError::MissingReference(Reference::Reporter));
        }
        if let Some(assignee_id) = payload.assignee_id {
            if !self.users.exists(assignee_id).await? {
                return Err(AppError::MissingReference(Reference::Assignee));
            }
        }

        let new_bug = NewBug {
            project_id: payload.project_id,
            title: payload.title,
            description: payload.description,
            priority: payload.priority.unwrap_or_default(),
            status: payload.status.unwrap_or_default(),
            reporter_id: payload.reporter_id,
            assignee_id: payload.assignee_id,
        };
        let bug = self
            .bugs
            .create(&new_bug)
            .await
            .map_err(map_constraint_violation)?;
        info!(bug_id = bug.id, project_id = bug.project_id, "bug created");
        Ok(bug)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: EntityId) -> Result<BugWithRefs, AppError> {
        self.bugs
            .get_with_refs(id)
            .await?
            .ok_or(AppError::NotFound(Resource::Bug))
    }

    /// Lists bugs with their joined project and reporter, newest first.
    #[instrument(skip(self, query))]
    pub async fn list(&self, query: BugListQuery) -> Result<Page<BugWithRefs>, AppError> {
        let window = query.window();
        let filter = query.filter();
        let (bugs, total) = self.bugs.list(&filter, window.limit(), window.offset()).await?;
        Ok(Page::new(bugs, window.pagination(total)))
    }

    /// Applies a partial update and appends one audit-trail row per changed
    /// field. A failed history write is logged but does not fail the update,
    /// which has already been persisted.
    #[instrument(skip(self, payload))]
    pub async fn update(
        &self,
        id: EntityId,
        mut payload: UpdateBugRequest,
    ) -> Result<Bug, AppError> {
        payload.normalize();
        payload.validate().map_err(|err| {
            warn!(error = %err, "invalid update bug request");
            AppError::from(err)
        })?;
        if payload.is_empty() {
            return Err(AppError::invalid_field("body", "No fields to update"));
        }

        let before = self
            .bugs
            .get(id)
            .await?
            .ok_or(AppError::NotFound(Resource::Bug))?;

        if let Some(project_id) = payload.project_id {
            if !self.projects.exists(project_id).await? {
                return Err(AppError::MissingReference(Reference::Project));
            }
        }
        if let Some(reporter_id) = payload.reporter_id {
            if !self.users.exists(reporter_id).await? {
                return Err(AppError::MissingReference(Reference::Reporter));
            }
        }
        if let Some(Some(assignee_id)) = payload.assignee_id {
            if !self.users.exists(assignee_id).await? {
                return Err(AppError::MissingReference(Reference::Assignee));
            }
        }

        let bug = self
            .bugs
            .update(id, &payload)
            .await
            .map_err(map_constraint_violation)?
            .ok_or(AppError::NotFound(Resource::Bug))?;

        let changes = diff_changes(&before, &bug);
        if !changes.is_empty() {
            if let Err(err) = self.history.record(&changes).await {
                warn!(bug_id = id, error = %err, "failed to record bug history");
            }
        }
        info!(bug_id = bug.id, changed_fields = changes.len(), "bug updated");
        Ok(bug)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: EntityId) -> Result<Bug, AppError> {
        let bug = self
            .bugs
            .delete(id)
            .await?
            .ok_or(AppError::NotFound(Resource::Bug))?;
        info!(bug_id = bug.id, "bug deleted");
        Ok(bug)
    }

    /// The bug's audit trail with joined actors, newest first.
    #[instrument(skip(self))]
    pub async fn history(&self, bug_id: EntityId) -> Result<Vec<HistoryWithActor>, AppError> {
        if !self.bugs.exists(bug_id).await? {
            return Err(AppError::NotFound(Resource::Bug));
        }
        self.history.list_for_bug(bug_id).await
    }
}

/// One audit-trail row per field whose value differs between the two
/// snapshots. Field names use the wire-format spelling.
fn diff_changes(before: &Bug, after: &Bug) -> Vec<NewHistoryEntry> {
    let mut changes = Vec::new();
    if before.title != after.title {
        changes.push(change(
            before.id,
            "title",
            Some(before.title.clone()),
            Some(after.title.clone()),
        ));
    }
    if before.description != after.description {
        changes.push(change(
            before.id,
            "description",
            Some(before.description.clone()),
            Some(after.description.clone()),
        ));
    }
    if before.priority != after.priority {
        changes.push(change(
            before.id,
            "priority",
            Some(before.priority.as_str().to_string()),
            Some(after.priority.as_str().to_string()),
        ));
    }
    if before.status != after.status {
        changes.push(change(
            before.id,
            "status",
            Some(before.status.as_str().to_string()),
            Some(after.status.as_str().to_string()),
        ));
    }
    if before.project_id != after.project_id {
        changes.push(change(
            before.id,
            "projectId",
            Some(before.project_id.to_string()),
            Some(after.project_id.to_string()),
        ));
    }
    if before.reporter_id != after.reporter_id {
        changes.push(change(
            before.id,
            "reporterId",
            Some(before.reporter_id.to_string()),
            Some(after.reporter_id.to_string()),
        ));
    }
    if before.assignee_id != after.assignee_id {
        changes.push(change(
            before.id,
            "assigneeId",
            before.assignee_id.map(|id| id.to_string()),
            after.assignee_id.map(|id| id.to_string()),
        ));
    }
    changes
}

fn change(
    bug_id: EntityId,
    field: &str,
    old_value: Option<String>,
    new_value: Option<String>,
) -> NewHistoryEntry {
    NewHistoryEntry {
        bug_id,
        user_id: None,
        field: field.to_string(),
        old_value,
        new_value,
    }
}

/// Maps store FK rejections back to the entity-specific reference codes.
fn map_constraint_violation(err: AppError) -> AppError {
    match err {
        AppError::Database(DatabaseError::ForeignKey(constraint)) => {
            if constraint.contains("assignee") {
                AppError::MissingReference(Reference::Assignee)
            } else if constraint.contains("reporter") {
                AppError::MissingReference(Reference::Reporter)
            } else {
                AppError::MissingReference(Reference::Project)
            }
        }
        other => other,
    }
}
