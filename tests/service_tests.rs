use faq_portal::{
    ApiError, HierarchyError, InMemoryRepository, ModuleService,
    auth::AuthUser,
    models::{CreateModuleRequest, Module, UpdateGrantsRequest, UpdateModuleRequest, User},
    repository::Repository,
};
use std::sync::Arc;

// --- Test Utilities ---

const ADMIN_ID: i64 = 1;
const EDITOR_ID: i64 = 7;
const VIEWER_ID: i64 = 8;

fn module(id: i64, name: &str, parent_id: Option<i64>) -> Module {
    Module {
        id,
        name: name.to_string(),
        parent_id,
        ..Module::default()
    }
}

/// 1 Misional
/// └── 2 Pagos
///     └── 3 Informe de Pago
/// 4 Soporte
///
/// The editor holds a direct grant on Pagos; the viewer holds nothing.
fn seeded() -> (InMemoryRepository, ModuleService) {
    let repo = InMemoryRepository::with_modules([
        module(1, "Misional", None),
        module(2, "Pagos", Some(1)),
        module(3, "Informe de Pago", Some(2)),
        module(4, "Soporte", None),
    ]);
    repo.insert_user(User {
        id: ADMIN_ID,
        email: "admin@example.com".to_string(),
        is_admin: true,
    });
    repo.insert_user(User {
        id: EDITOR_ID,
        email: "editor@example.com".to_string(),
        is_admin: false,
    });
    repo.insert_user(User {
        id: VIEWER_ID,
        email: "viewer@example.com".to_string(),
        is_admin: false,
    });
    repo.grant(EDITOR_ID, 2);

    let service = ModuleService::new(Arc::new(repo.clone()));
    (repo, service)
}

fn admin() -> AuthUser {
    AuthUser {
        id: ADMIN_ID,
        is_admin: true,
    }
}

fn editor() -> AuthUser {
    AuthUser {
        id: EDITOR_ID,
        is_admin: false,
    }
}

fn viewer() -> AuthUser {
    AuthUser {
        id: VIEWER_ID,
        is_admin: false,
    }
}

fn create(name: &str, parent_id: Option<i64>) -> CreateModuleRequest {
    CreateModuleRequest {
        name: name.to_string(),
        parent_id,
        ..CreateModuleRequest::default()
    }
}

fn reparent(parent_id: Option<i64>) -> UpdateModuleRequest {
    UpdateModuleRequest {
        parent_id: Some(parent_id),
        ..UpdateModuleRequest::default()
    }
}

// --- Read Projections ---

#[tokio::test]
async fn test_list_modules_sorted() {
    let (_, service) = seeded();
    let ids: Vec<i64> = service
        .list_modules()
        .await
        .unwrap()
        .iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_corrupt_store_surfaces_as_server_error() {
    let (repo, service) = seeded();
    // The in-memory store does not enforce the foreign key.
    repo.insert_module(module(9, "Orphan", Some(99)));

    let err = service.list_modules().await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::Hierarchy(HierarchyError::MissingParent { id: 9, parent_id: 99 })
    ));
    assert_eq!(err.status_and_code().0.as_u16(), 500);
}

#[tokio::test]
async fn test_subtree_of() {
    let (_, service) = seeded();
    let ids: Vec<i64> = service
        .subtree_of(1)
        .await
        .unwrap()
        .iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);

    assert!(matches!(
        service.subtree_of(42).await.unwrap_err(),
        ApiError::Hierarchy(HierarchyError::NotFound(42))
    ));
}

#[tokio::test]
async fn test_breadcrumb() {
    let (_, service) = seeded();
    let crumb = service.breadcrumb(3).await.unwrap();

    assert_eq!(crumb.module_id, 3);
    assert_eq!(crumb.depth, 2);
    assert_eq!(
        crumb.ancestors.iter().map(|m| m.id).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert_eq!(crumb.labels, vec!["Misional", "Pagos", "Informe de Pago"]);
}

#[tokio::test]
async fn test_options_are_filtered_for_non_admins() {
    let (_, service) = seeded();

    let everything = service.options_at(&[1], None).await.unwrap();
    assert_eq!(everything.len(), 1);

    let editor_roots = service.options_at(&[], Some(&editor())).await.unwrap();
    assert!(editor_roots.is_empty());

    let editor_level = service.options_at(&[1], Some(&editor())).await.unwrap();
    assert_eq!(editor_level.iter().map(|m| m.id).collect::<Vec<_>>(), vec![2]);

    let admin_roots = service.options_at(&[], Some(&admin())).await.unwrap();
    assert_eq!(admin_roots.iter().map(|m| m.id).collect::<Vec<_>>(), vec![1, 4]);
}

#[tokio::test]
async fn test_my_permissions() {
    let (_, service) = seeded();

    let summary = service.my_permissions(&editor()).await.unwrap();
    assert_eq!(summary.permitted_modules, vec![2, 3]);
    assert!(!summary.is_admin);

    let summary = service.my_permissions(&admin()).await.unwrap();
    assert_eq!(summary.permitted_modules, vec![1, 2, 3, 4]);
}

// --- Create ---

#[tokio::test]
async fn test_editor_creates_under_permitted_parent() {
    let (_, service) = seeded();
    let created = service
        .create_module(&editor(), create("  Recibos  ", Some(3)))
        .await
        .unwrap();

    assert_eq!(created.id, 5);
    assert_eq!(created.name, "Recibos");
    assert_eq!(created.parent_id, Some(3));

    // Grants expand over the new descendant immediately.
    let summary = service.my_permissions(&editor()).await.unwrap();
    assert_eq!(summary.permitted_modules, vec![2, 3, 5]);
}

#[tokio::test]
async fn test_editor_cannot_create_root_or_outside_grant() {
    let (_, service) = seeded();

    let err = service
        .create_module(&editor(), create("Root", None))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let err = service
        .create_module(&editor(), create("Elsewhere", Some(4)))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
}

#[tokio::test]
async fn test_admin_create_checks_parent_exists() {
    let (_, service) = seeded();

    assert!(service.create_module(&admin(), create("Root", None)).await.is_ok());

    let err = service
        .create_module(&admin(), create("Child", Some(99)))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Hierarchy(HierarchyError::NotFound(99))));
}

#[tokio::test]
async fn test_create_rejects_blank_and_long_names() {
    let (_, service) = seeded();

    let err = service
        .create_module(&admin(), create("   ", None))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));

    let err = service
        .create_module(&admin(), create(&"x".repeat(256), None))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
}

// --- Update ---

#[tokio::test]
async fn test_update_rejects_cycle() {
    let (repo, service) = seeded();

    let err = service
        .update_module(&admin(), 1, reparent(Some(3)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::Hierarchy(HierarchyError::CycleWouldForm { id: 1, parent_id: 3 })
    ));
    assert_eq!(err.status_and_code().0.as_u16(), 409);

    // Nothing was written.
    assert_eq!(repo.get_module(1).await.unwrap().unwrap().parent_id, None);
}

#[tokio::test]
async fn test_update_partial_fields() {
    let (_, service) = seeded();
    let req = UpdateModuleRequest {
        description: Some(Some("Pagos y cobros".to_string())),
        ..UpdateModuleRequest::default()
    };

    let updated = service.update_module(&editor(), 2, req).await.unwrap();
    assert_eq!(updated.name, "Pagos");
    assert_eq!(updated.description.as_deref(), Some("Pagos y cobros"));
    assert_eq!(updated.parent_id, Some(1));
}

#[tokio::test]
async fn test_editor_resending_current_parent_is_not_a_move() {
    let (repo, service) = seeded();
    // Edit forms send the parent back unchanged; Misional is outside the editor's set.
    let req = UpdateModuleRequest {
        name: Some("Pagos renamed".to_string()),
        parent_id: Some(Some(1)),
        ..UpdateModuleRequest::default()
    };

    let updated = service.update_module(&editor(), 2, req).await.unwrap();
    assert_eq!(updated.name, "Pagos renamed");
    assert_eq!(updated.parent_id, Some(1));
    assert_eq!(repo.get_module(2).await.unwrap().unwrap().parent_id, Some(1));
}

#[tokio::test]
async fn test_editor_resending_null_parent_of_root_is_not_a_move() {
    let (repo, service) = seeded();
    repo.grant(EDITOR_ID, 4);

    let req = UpdateModuleRequest {
        name: Some("Soporte tecnico".to_string()),
        parent_id: Some(None),
        ..UpdateModuleRequest::default()
    };
    let updated = service.update_module(&editor(), 4, req).await.unwrap();
    assert_eq!(updated.name, "Soporte tecnico");
    assert_eq!(updated.parent_id, None);
}

#[tokio::test]
async fn test_update_clears_description_and_icon() {
    let (repo, service) = seeded();
    let filled = UpdateModuleRequest {
        description: Some(Some("Pagos y cobros".to_string())),
        icon: Some(Some("icons/pagos.png".to_string())),
        ..UpdateModuleRequest::default()
    };
    service.update_module(&editor(), 2, filled).await.unwrap();

    // An absent field leaves the column alone.
    let renamed = UpdateModuleRequest {
        name: Some("Pagos".to_string()),
        ..UpdateModuleRequest::default()
    };
    let kept = service.update_module(&editor(), 2, renamed).await.unwrap();
    assert_eq!(kept.description.as_deref(), Some("Pagos y cobros"));
    assert_eq!(kept.icon.as_deref(), Some("icons/pagos.png"));

    let cleared = UpdateModuleRequest {
        description: Some(None),
        icon: Some(None),
        ..UpdateModuleRequest::default()
    };
    let updated = service.update_module(&editor(), 2, cleared).await.unwrap();
    assert_eq!(updated.description, None);
    assert_eq!(updated.icon, None);
    assert_eq!(repo.get_module(2).await.unwrap().unwrap().description, None);
}

#[tokio::test]
async fn test_admin_moves_module_to_root() {
    let (_, service) = seeded();
    let updated = service.update_module(&admin(), 3, reparent(None)).await.unwrap();
    assert_eq!(updated.parent_id, None);
}

#[tokio::test]
async fn test_editor_update_authorization() {
    let (_, service) = seeded();

    // Outside the permission set.
    let err = service
        .update_module(&editor(), 4, UpdateModuleRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    // Moving to the root level is admin-only.
    let err = service
        .update_module(&editor(), 3, reparent(None))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    // New parent outside the permission set.
    let err = service
        .update_module(&editor(), 3, reparent(Some(4)))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let err = service
        .update_module(&viewer(), 3, UpdateModuleRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
}

#[tokio::test]
async fn test_update_unknown_module() {
    let (_, service) = seeded();
    let err = service
        .update_module(&admin(), 42, UpdateModuleRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Hierarchy(HierarchyError::NotFound(42))));
}

// --- Delete ---

#[tokio::test]
async fn test_delete_leaf_after_children_move() {
    let (repo, service) = seeded();

    let err = service.delete_module(&admin(), 2).await.unwrap_err();
    assert!(matches!(err, ApiError::Hierarchy(HierarchyError::HasChildren(2))));

    service.update_module(&admin(), 3, reparent(Some(4))).await.unwrap();
    service.delete_module(&admin(), 2).await.unwrap();

    assert!(repo.get_module(2).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_blocked_by_dependent_content() {
    let (repo, service) = seeded();
    repo.add_content(3);

    let err = service.delete_module(&admin(), 3).await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::Hierarchy(HierarchyError::HasDependentContent(3))
    ));

    repo.remove_content(3);
    assert!(service.delete_module(&admin(), 3).await.is_ok());
}

#[tokio::test]
async fn test_delete_is_admin_only() {
    let (_, service) = seeded();
    let err = service.delete_module(&editor(), 3).await.unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
}

#[tokio::test]
async fn test_deleted_module_drops_out_of_permissions() {
    let (repo, service) = seeded();
    repo.grant(EDITOR_ID, 3);

    service.delete_module(&admin(), 3).await.unwrap();

    let summary = service.my_permissions(&editor()).await.unwrap();
    assert_eq!(summary.permitted_modules, vec![2]);
}

#[tokio::test]
async fn test_permissions_follow_stored_admin_flag() {
    let (repo, service) = seeded();
    // Promoted after the request was authenticated as a plain user.
    repo.insert_user(User {
        id: VIEWER_ID,
        email: "viewer@example.com".to_string(),
        is_admin: true,
    });

    let summary = service.my_permissions(&viewer()).await.unwrap();
    assert_eq!(summary.permitted_modules, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_stale_grant_is_ignored() {
    let (repo, service) = seeded();
    repo.grant(VIEWER_ID, 404);

    let summary = service.my_permissions(&viewer()).await.unwrap();
    assert!(summary.permitted_modules.is_empty());
}

// --- Grant Administration ---

#[tokio::test]
async fn test_replace_user_grants() {
    let (repo, service) = seeded();

    let access = service
        .replace_user_grants(
            &admin(),
            VIEWER_ID,
            UpdateGrantsRequest {
                module_ids: vec![4, 1, 4],
            },
        )
        .await
        .unwrap();

    assert_eq!(access.modules.iter().map(|m| m.id).collect::<Vec<_>>(), vec![1, 4]);
    assert_eq!(access.permitted_modules, vec![1, 2, 3, 4]);
    assert_eq!(repo.direct_grants_for(VIEWER_ID).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_replace_user_grants_validation() {
    let (repo, service) = seeded();

    let err = service
        .replace_user_grants(&admin(), EDITOR_ID, UpdateGrantsRequest { module_ids: vec![3, 99] })
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Hierarchy(HierarchyError::NotFound(99))));
    // The previous grants survive a rejected replacement.
    assert!(repo.direct_grants_for(EDITOR_ID).await.unwrap().contains(&2));

    let err = service
        .replace_user_grants(&admin(), 404, UpdateGrantsRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::UserNotFound(404)));

    let err = service
        .replace_user_grants(&editor(), VIEWER_ID, UpdateGrantsRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
}

#[tokio::test]
async fn test_list_user_access() {
    let (repo, service) = seeded();
    assert!(repo.is_admin(ADMIN_ID).await.unwrap());
    assert!(!repo.is_admin(EDITOR_ID).await.unwrap());

    let users = service.list_user_access(&admin()).await.unwrap();
    assert_eq!(users.len(), 3);

    let editor_access = users.iter().find(|u| u.id == EDITOR_ID).unwrap();
    assert_eq!(editor_access.modules.len(), 1);
    assert_eq!(editor_access.permitted_modules, vec![2, 3]);

    let admin_access = service.user_access(&admin(), ADMIN_ID).await.unwrap();
    assert!(admin_access.modules.is_empty());
    assert_eq!(admin_access.permitted_modules, vec![1, 2, 3, 4]);

    assert!(matches!(
        service.list_user_access(&editor()).await.unwrap_err(),
        ApiError::Forbidden(_)
    ));
}
