//! Attachment operations: multipart upload, listings, and cleanup.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::{
    AppError, Attachment, AttachmentDetail, AttachmentListQuery, AttachmentRepository,
    AttachmentWithUploader, BugRepository, EntityId, FileStore, NewAttachment, Page,
    ProjectRepository, Resource, ScopedAttachmentQuery,
};

/// Upload size cap in bytes.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const MAX_UPLOAD_MB: u64 = 10;

/// MIME types accepted for upload.
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "text/plain",
    "application/zip",
    "application/x-zip-compressed",
];

/// An uploaded file part, decoded from the multipart body.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Orchestrates upload validation, blob storage, and metadata persistence.
#[derive(Clone)]
pub struct AttachmentService {
    attachments: Arc<dyn AttachmentRepository>,
    bugs: Arc<dyn BugRepository>,
    projects: Arc<dyn ProjectRepository>,
    files: Arc<dyn FileStore>,
}

impl AttachmentService {
    #[must_use]
    pub fn new(
        attachments: Arc<dyn AttachmentRepository>,
        bugs: Arc<dyn BugRepository>,
        projects: Arc<dyn ProjectRepository>,
        files: Arc<dyn FileStore>,
    ) -> Self {
        Self {
            attachments,
            bugs,
            projects,
            files,
        }
    }

    /// Stores an uploaded file and its metadata row.
    ///
    /// Validation order matches the upload form: file presence, size cap,
    /// MIME allow-list, then existence of the optional bug/project links.
    /// If the metadata insert fails after the file hit disk, the file is
    /// reclaimed before the error surfaces.
    ///
    /// # Errors
    ///
    /// `MissingFile`, `FileTooLarge`, `InvalidFileType`, or `NotFound` for
    /// a dangling `issueId`/`projectId` link.
    #[instrument(skip(self, file), fields(issue_id, project_id))]
    pub async fn upload(
        &self,
        file: Option<FileUpload>,
        issue_id: Option<EntityId>,
        project_id: Option<EntityId>,
    ) -> Result<Attachment, AppError> {
        let file = file.ok_or(AppError::MissingFile)?;
        if file.bytes.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::FileTooLarge {
                limit_mb: MAX_UPLOAD_MB,
            });
        }
        if !ALLOWED_MIME_TYPES.contains(&file.content_type.as_str()) {
            return Err(AppError::InvalidFileType(file.content_type));
        }

        if let Some(bug_id) = issue_id {
            if !self.bugs.exists(bug_id).await? {
                return Err(AppError::NotFound(Resource::Bug));
            }
        }
        if let Some(linked_project) = project_id {
            if !self.projects.exists(linked_project).await? {
                return Err(AppError::NotFound(Resource::Project));
            }
        }

        let stored_name = stored_name_for(&file.filename);
        self.files.save(&stored_name, &file.bytes).await?;

        let size = file.bytes.len() as i64;
        let new_attachment = NewAttachment {
            filename: file.filename,
            stored_name: stored_name.clone(),
            path: format!("/uploads/{stored_name}"),
            mime: file.content_type,
            size,
            issue_id,
            project_id,
            uploader_id: None,
        };
        match self.attachments.create(&new_attachment).await {
            Ok(attachment) => {
                info!(
                    attachment_id = attachment.id,
                    size = attachment.size,
                    "attachment stored"
                );
                Ok(attachment)
            }
            Err(err) => {
                // The file already hit disk; reclaim it before surfacing
                // the insert error.
                if let Err(cleanup) = self.files.remove(&stored_name).await {
                    warn!(stored_name = %stored_name, error = %cleanup, "failed to remove orphaned upload");
                }
                Err(err)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: EntityId) -> Result<AttachmentDetail, AppError> {
        self.attachments
            .get_detail(id)
            .await?
            .ok_or(AppError::NotFound(Resource::Attachment))
    }

    /// Offset-style listing across all attachments.
    #[instrument(skip(self, query))]
    pub async fn list(&self, query: AttachmentListQuery) -> Result<Page<Attachment>, AppError> {
        let window = query.window();
        let filter = query.filter();
        let (sort, order) = query.sort();
        let (rows, total) = self
            .attachments
            .list(&filter, sort, order, window.limit(), window.offset())
            .await?;
        Ok(Page::new(rows, window.pagination(total)))
    }

    /// Attachments on a bug, paged with navigation flags.
    #[instrument(skip(self, query))]
    pub async fn list_for_bug(
        &self,
        bug_id: EntityId,
        query: ScopedAttachmentQuery,
    ) -> Result<Page<AttachmentWithUploader>, AppError> {
        if !self.bugs.exists(bug_id).await? {
            return Err(AppError::NotFound(Resource::Bug));
        }
        let window = query.window();
        let (sort, order) = query.bug_sort();
        let (rows, total) = self
            .attachments
            .list_for_bug(bug_id, sort, order, window.limit(), window.offset())
            .await?;
        Ok(Page::new(rows, window.pagination(total).with_nav()))
    }

    /// Attachments on a project, paged with navigation flags. The size
    /// column is not sortable here.
    #[instrument(skip(self, query))]
    pub async fn list_for_project(
        &self,
        project_id: EntityId,
        query: ScopedAttachmentQuery,
    ) -> Result<Page<AttachmentWithUploader>, AppError> {
        if !self.projects.exists(project_id).await? {
            return Err(AppError::NotFound(Resource::Project));
        }
        let window = query.window();
        let (sort, order) = query.project_sort();
        let (rows, total) = self
            .attachments
            .list_for_project(project_id, sort, order, window.limit(), window.offset())
            .await?;
        Ok(Page::new(rows, window.pagination(total).with_nav()))
    }

    /// Deletes the metadata row, then removes the stored file in the
    /// background. File removal is best-effort and never fails the request.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: EntityId) -> Result<Attachment, AppError> {
        let attachment = self
            .attachments
            .delete(id)
            .await?
            .ok_or(AppError::NotFound(Resource::Attachment))?;
        info!(attachment_id = attachment.id, "attachment deleted");

        let files = Arc::clone(&self.files);
        let stored_name = attachment.stored_name.clone();
        tokio::spawn(async move {
            if let Err(err) = files.remove(&stored_name).await {
                counter!("attachment_cleanup_failures_total").increment(1);
                warn!(stored_name = %stored_name, error = %err, "failed to remove attachment file");
            }
        });

        Ok(attachment)
    }
}

/// Collision-resistant on-disk name: epoch millis, a random hex nonce, and
/// the sanitized client filename.
fn stored_name_for(filename: &str) -> String {
    let stamp = Utc::now().timestamp_millis();
    let nonce = Uuid::new_v4().simple();
    format!("{stamp}-{nonce}-{}", sanitize_filename(filename))
}

/// Replaces everything outside `[a-zA-Z0-9.-]` with underscores.
fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::test_utils::{
        sample_attachment, sample_bug, sample_project, MockAttachmentRepository,
        MockBugRepository, MockFileStore, MockProjectRepository,
    };

    struct Fixture {
        attachments: Arc<MockAttachmentRepository>,
        files: Arc<MockFileStore>,
        service: AttachmentService,
    }

    fn fixture(
        attachments: MockAttachmentRepository,
        bugs: MockBugRepository,
        projects: MockProjectRepository,
    ) -> Fixture {
        let attachments = Arc::new(attachments);
        let files = Arc::new(MockFileStore::new());
        let service = AttachmentService::new(
            Arc::clone(&attachments) as Arc<dyn AttachmentRepository>,
            Arc::new(bugs),
            Arc::new(projects),
            Arc::clone(&files) as Arc<dyn FileStore>,
        );
        Fixture {
            attachments,
            files,
            service,
        }
    }

    fn png_upload(filename: &str) -> Option<FileUpload> {
        Some(FileUpload {
            filename: filename.to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![0u8; 128],
        })
    }

    #[tokio::test]
    async fn test_upload_requires_file_part() {
        let f = fixture(
            MockAttachmentRepository::new(),
            MockBugRepository::new(),
            MockProjectRepository::new(),
        );
        let err = f.service.upload(None, None, None).await.unwrap_err();
        assert!(matches!(err, AppError::MissingFile));
    }

    #[tokio::test]
    async fn test_upload_rejects_oversized_file() {
        let f = fixture(
            MockAttachmentRepository::new(),
            MockBugRepository::new(),
            MockProjectRepository::new(),
        );
        let file = FileUpload {
            filename: "big.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![0u8; MAX_UPLOAD_BYTES + 1],
        };
        let err = f.service.upload(Some(file), None, None).await.unwrap_err();
        assert!(matches!(err, AppError::FileTooLarge { limit_mb: 10 }));
    }

    #[tokio::test]
    async fn test_upload_rejects_disallowed_mime() {
        let f = fixture(
            MockAttachmentRepository::new(),
            MockBugRepository::new(),
            MockProjectRepository::new(),
        );
        let file = FileUpload {
            filename: "tool.exe".to_string(),
            content_type: "application/x-msdownload".to_string(),
            bytes: vec![0u8; 16],
        };
        let err = f.service.upload(Some(file), None, None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidFileType(_)));
    }

    #[tokio::test]
    async fn test_upload_requires_existing_bug_link() {
        let f = fixture(
            MockAttachmentRepository::new(),
            MockBugRepository::new(),
            MockProjectRepository::new(),
        );
        let err = f
            .service
            .upload(png_upload("shot.png"), Some(9), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(Resource::Bug)));
    }

    #[tokio::test]
    async fn test_upload_requires_existing_project_link() {
        let f = fixture(
            MockAttachmentRepository::new(),
            MockBugRepository::new(),
            MockProjectRepository::new(),
        );
        let err = f
            .service
            .upload(png_upload("shot.png"), None, Some(9))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(Resource::Project)));
    }

    #[tokio::test]
    async fn test_upload_stores_file_and_metadata() {
        let f = fixture(
            MockAttachmentRepository::new(),
            MockBugRepository::with_rows(vec![sample_bug(1, 1, 1)]),
            MockProjectRepository::with_rows(vec![sample_project(2, 1)]),
        );
        let attachment = f
            .service
            .upload(png_upload("screen shot.png"), Some(1), Some(2))
            .await
            .unwrap();

        assert_eq!(attachment.filename, "screen shot.png");
        assert!(attachment.stored_name.ends_with("screen_shot.png"));
        assert_eq!(attachment.path, format!("/uploads/{}", attachment.stored_name));
        assert_eq!(attachment.mime, "image/png");
        assert_eq!(attachment.size, 128);
        assert_eq!(attachment.issue_id, Some(1));
        assert_eq!(attachment.project_id, Some(2));

        let saved = f.files.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, attachment.stored_name);
        assert_eq!(saved[0].1, 128);
    }

    #[tokio::test]
    async fn test_upload_write_failure_leaves_no_row() {
        let f = fixture(
            MockAttachmentRepository::new(),
            MockBugRepository::new(),
            MockProjectRepository::new(),
        );
        f.files.set_fail_save(true);
        let err = f
            .service
            .upload(png_upload("shot.png"), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert!(f.attachments.rows().is_empty());
    }

    #[tokio::test]
    async fn test_upload_insert_failure_reclaims_file() {
        let f = fixture(
            MockAttachmentRepository::failing("insert failed"),
            MockBugRepository::new(),
            MockProjectRepository::new(),
        );
        let err = f
            .service
            .upload(png_upload("shot.png"), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Database(_)));

        let saved = f.files.saved();
        let removed = f.files.removed();
        assert_eq!(saved.len(), 1);
        assert_eq!(removed, vec![saved[0].0.clone()]);
    }

    #[tokio::test]
    async fn test_delete_removes_row_then_file() {
        let f = fixture(
            MockAttachmentRepository::with_rows(vec![sample_attachment(1)]),
            MockBugRepository::new(),
            MockProjectRepository::new(),
        );
        let deleted = f.service.delete(1).await.unwrap();
        assert_eq!(deleted.id, 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(f.files.removed(), vec![deleted.stored_name]);
    }

    #[tokio::test]
    async fn test_delete_survives_file_removal_failure() {
        let f = fixture(
            MockAttachmentRepository::with_rows(vec![sample_attachment(1)]),
            MockBugRepository::new(),
            MockProjectRepository::new(),
        );
        f.files.set_fail_remove(true);
        assert!(f.service.delete(1).await.is_ok());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(f.attachments.rows().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_attachment_is_not_found() {
        let f = fixture(
            MockAttachmentRepository::new(),
            MockBugRepository::new(),
            MockProjectRepository::new(),
        );
        let err = f.service.delete(9).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(Resource::Attachment)));
    }

    #[tokio::test]
    async fn test_flat_list_echoes_offset_and_derives_page() {
        let rows = (1..=5).map(sample_attachment).collect();
        let f = fixture(
            MockAttachmentRepository::with_rows(rows),
            MockBugRepository::new(),
            MockProjectRepository::new(),
        );
        let query = AttachmentListQuery {
            limit: Some("2".to_string()),
            offset: Some("2".to_string()),
            ..Default::default()
        };
        let page = f.service.list(query).await.unwrap();
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.pagination.page, 2);
        assert_eq!(page.pagination.offset, Some(2));
        assert_eq!(page.pagination.total, 5);
    }

    #[tokio::test]
    async fn test_bug_scoped_list_requires_existing_bug() {
        let f = fixture(
            MockAttachmentRepository::new(),
            MockBugRepository::new(),
            MockProjectRepository::new(),
        );
        let err = f
            .service
            .list_for_bug(1, ScopedAttachmentQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(Resource::Bug)));
    }

    #[tokio::test]
    async fn test_project_scoped_list_sorts_by_filename() {
        let mut first = sample_attachment(1);
        first.filename = "zebra.png".to_string();
        first.project_id = Some(1);
        let mut second = sample_attachment(2);
        second.filename = "alpha.png".to_string();
        second.project_id = Some(1);
        let f = fixture(
            MockAttachmentRepository::with_rows(vec![first, second]),
            MockBugRepository::new(),
            MockProjectRepository::with_rows(vec![sample_project(1, 1)]),
        );

        let query = ScopedAttachmentQuery {
            sort: Some("filename".to_string()),
            ..Default::default()
        };
        let page = f.service.list_for_project(1, query).await.unwrap();
        let names: Vec<&str> = page
            .data
            .iter()
            .map(|r| r.attachment.filename.as_str())
            .collect();
        assert_eq!(names, vec!["alpha.png", "zebra.png"]);
        assert_eq!(page.pagination.has_next, Some(false));
        assert_eq!(page.pagination.has_previous, Some(false));
    }

    #[test]
    fn test_sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_filename("weird name (1).png"), "weird_name__1_.png");
        assert_eq!(sanitize_filename("clean-file.txt"), "clean-file.txt");
    }

    #[test]
    fn test_stored_name_embeds_sanitized_filename() {
        let name = stored_name_for("a b.png");
        assert!(name.ends_with("-a_b.png"));
        let millis: String = name.chars().take_while(|c| c.is_ascii_digit()).collect();
        assert!(millis.len() >= 13);
    }
}
