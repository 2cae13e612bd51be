// service.rs - Store-backed compilation.
//
// Loads the three active documents and the active exceptions for a
// project, compiles at the next revision and persists the result. Prior
// packages are never touched. If a concurrent compilation claims the same
// revision first, the store reports a conflict and the compile is retried
// at the new next revision.

use std::sync::Arc;

use chrono::Utc;
use keel_audit::{AuditAction, AuditEvent, Auditor};
use keel_model::{
    CompiledContextPackage, DocumentStore, ExceptionStore, PackageStore, StoreError,
};

use crate::compiler::{CompileInput, CompilerOptions, ContextCompiler};
use crate::error::CompileError;

const MAX_REVISION_ATTEMPTS: usize = 3;

pub struct CompileService {
    documents: Arc<dyn DocumentStore>,
    exceptions: Arc<dyn ExceptionStore>,
    packages: Arc<dyn PackageStore>,
    options: CompilerOptions,
    auditor: Auditor,
}

impl CompileService {
    /// Build a service over one backend that serves documents, exceptions
    /// and packages.
    pub fn new<S>(store: Arc<S>) -> Self
    where
        S: DocumentStore + ExceptionStore + PackageStore + 'static,
    {
        Self {
            documents: store.clone(),
            exceptions: store.clone(),
            packages: store,
            options: CompilerOptions::default(),
            auditor: Auditor::disabled(),
        }
    }

    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_auditor(mut self, auditor: Auditor) -> Self {
        self.auditor = auditor;
        self
    }

    /// Compile the project's active documents into a new package revision.
    pub fn compile_project(&self, project_id: &str) -> Result<CompiledContextPackage, CompileError> {
        tracing::info!(project_id = %project_id, "compiling context package");

        let org_baseline = self.documents.get_org_baseline(project_id)?;
        let app_spec = self.documents.get_app_spec(project_id)?;
        let environment_profile = self.documents.get_environment_profile(project_id)?;

        let now = self.options.evaluated_at.unwrap_or_else(Utc::now);
        let exceptions = if self.options.include_exceptions {
            self.exceptions.active_exceptions(project_id, now)?
        } else {
            Vec::new()
        };
        let options = CompilerOptions {
            evaluated_at: Some(now),
            ..self.options.clone()
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            let revision = self.packages.latest_revision(project_id)? + 1;
            let package = ContextCompiler::compile(
                &CompileInput {
                    project_id,
                    org_baseline: org_baseline.as_ref(),
                    app_spec: app_spec.as_ref(),
                    environment_profile: environment_profile.as_ref(),
                    exceptions: &exceptions,
                    revision,
                },
                &options,
            )?;

            match self.packages.upsert_package(&package) {
                Ok(()) => {
                    self.record(&package);
                    return Ok(package);
                }
                Err(StoreError::Conflict(reason)) if attempt < MAX_REVISION_ATTEMPTS => {
                    tracing::debug!(
                        project_id = %project_id,
                        revision,
                        reason = %reason,
                        "revision taken by a concurrent compile; retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn record(&self, package: &CompiledContextPackage) {
        let hash = &package.integrity().hash;
        tracing::info!(
            project_id = %package.project_id(),
            revision = package.revision(),
            hash = %hash.get(..12).unwrap_or(hash),
            exceptions = package.exceptions.len(),
            "context package compiled"
        );
        let event = AuditEvent::new("compiler", AuditAction::PackageCompiled)
            .with_project(package.project_id())
            .with_subject(package.package_id().to_string())
            .with_outcome("compiled", format!("revision {}", package.revision()))
            .with_metadata(serde_json::json!({
                "revision": package.revision(),
                "hash": hash,
                "environment": package.project_identity.environment,
            }));
        let _ignored = self.auditor.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::tests::{app_spec, baseline, profile};
    use keel_audit::MemoryAuditSink;
    use keel_model::{ApprovalLevel, MemoryStore};

    fn store() -> Arc<MemoryStore> {
        Arc::new(
            MemoryStore::new()
                .with_org_baseline("payments-api", baseline())
                .with_app_spec(app_spec("payments-api"))
                .with_environment_profile(profile("payments-api", ApprovalLevel::Standard)),
        )
    }

    #[test]
    fn recompiling_adds_a_revision() {
        let store = store();
        let service = CompileService::new(store.clone());

        let first = service.compile_project("payments-api").unwrap();
        let second = service.compile_project("payments-api").unwrap();
        assert_eq!(first.revision(), 1);
        assert_eq!(second.revision(), 2);
        assert_ne!(first.package_id(), second.package_id());

        let latest = store.latest_package("payments-api").unwrap().unwrap();
        assert_eq!(latest.package_id(), second.package_id());
    }

    #[test]
    fn missing_profile_fails_without_persisting() {
        let store = Arc::new(
            MemoryStore::new()
                .with_org_baseline("payments-api", baseline())
                .with_app_spec(app_spec("payments-api")),
        );
        let service = CompileService::new(store.clone());
        match service.compile_project("payments-api") {
            Err(CompileError::MissingDocument { document, .. }) => {
                assert_eq!(document, "environment_profile")
            }
            other => panic!("expected MissingDocument, got {:?}", other),
        }
        assert_eq!(store.latest_revision("payments-api").unwrap(), 0);
    }

    #[test]
    fn compile_is_audited() {
        let sink = Arc::new(MemoryAuditSink::new());
        let service = CompileService::new(store()).with_auditor(Auditor::new(sink.clone()));
        let package = service.compile_project("payments-api").unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, AuditAction::PackageCompiled);
        assert_eq!(events[0].subject.as_deref(), Some(package.package_id().to_string().as_str()));
    }

    #[test]
    fn audit_failure_does_not_fail_compile() {
        let auditor = Auditor::new(Arc::new(MemoryAuditSink::rejecting()));
        let service = CompileService::new(store()).with_auditor(auditor.clone());
        service.compile_project("payments-api").unwrap();
        assert_eq!(auditor.failures(), 1);
    }
}
