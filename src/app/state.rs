//! Shared application state wired at startup.

use std::sync::Arc;
use std::time::Instant;

use crate::domain::{
    AttachmentRepository, BugRepository, CommentRepository, FileStore, HistoryRepository,
    MemberRepository, ProjectRepository, UserRepository,
};

use super::attachments::AttachmentService;
use super::bugs::BugService;
use super::comments::CommentService;
use super::members::MemberService;
use super::projects::ProjectService;
use super::users::UserService;

/// The repository bundle the state is wired from. Production wiring fills
/// this with the Postgres implementations, tests with in-memory mocks.
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub projects: Arc<dyn ProjectRepository>,
    pub members: Arc<dyn MemberRepository>,
    pub bugs: Arc<dyn BugRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub history: Arc<dyn HistoryRepository>,
    pub attachments: Arc<dyn AttachmentRepository>,
}

/// Shared application state holding the per-entity services.
///
/// Cloning is cheap: the services are behind `Arc` and share their
/// repositories.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserService>,
    pub projects: Arc<ProjectService>,
    pub members: Arc<MemberService>,
    pub bugs: Arc<BugService>,
    pub comments: Arc<CommentService>,
    pub attachments: Arc<AttachmentService>,
    started_at: Instant,
}

impl AppState {
    /// Wires every service from the repository bundle and file store.
    #[must_use]
    pub fn new(repos: Repositories, files: Arc<dyn FileStore>) -> Self {
        let users = Arc::new(UserService::new(Arc::clone(&repos.users)));
        let projects = Arc::new(ProjectService::new(
            Arc::clone(&repos.projects),
            Arc::clone(&repos.users),
        ));
        let members = Arc::new(MemberService::new(
            Arc::clone(&repos.members),
            Arc::clone(&repos.projects),
            Arc::clone(&repos.users),
        ));
        let bugs = Arc::new(BugService::new(
            Arc::clone(&repos.bugs),
            Arc::clone(&repos.projects),
            Arc::clone(&repos.users),
            Arc::clone(&repos.history),
        ));
        let comments = Arc::new(CommentService::new(
            Arc::clone(&repos.comments),
            Arc::clone(&repos.bugs),
            Arc::clone(&repos.users),
        ));
        let attachments = Arc::new(AttachmentService::new(
            Arc::clone(&repos.attachments),
            Arc::clone(&repos.bugs),
            Arc::clone(&repos.projects),
            files,
        ));

        Self {
            users,
            projects,
            members,
            bugs,
            comments,
            attachments,
            started_at: Instant::now(),
        }
    }

    /// Seconds since the state was constructed, reported by the health
    /// endpoint.
    pub fn uptime_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockRepos;

    #[tokio::test]
    async fn test_state_wires_all_services() {
        let repos = MockRepos::new();
        let state = repos.state();

        assert!(state.users.get(1).await.is_err());
        assert!(state.uptime_secs() >= 0.0);
    }

    #[test]
    fn test_clone_shares_services() {
        let state = MockRepos::new().state();
        let cloned = state.clone();

        assert!(Arc::ptr_eq(&state.users, &cloned.users));
        assert!(Arc::ptr_eq(&state.bugs, &cloned.bugs));
        assert!(Arc::ptr_eq(&state.attachments, &cloned.attachments));
    }
}
